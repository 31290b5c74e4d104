use sqlx::Row;
use sqlx::sqlite::SqlitePoolOptions;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let key_filter = args.get(1);

    let database_url = "sqlite://kstui.db";
    let pool = SqlitePoolOptions::new()
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    let rows = match key_filter {
        Some(key) => {
            sqlx::query("SELECT key, value FROM preferences WHERE key = ?")
                .bind(key)
                .fetch_all(&pool)
                .await?
        }
        None => {
            sqlx::query("SELECT key, value FROM preferences ORDER BY key")
                .fetch_all(&pool)
                .await?
        }
    };

    if rows.is_empty() {
        println!("No preferences stored.");
        return Ok(());
    }

    for row in rows {
        let key: String = row.get("key");
        let value: String = row.get("value");

        println!("=== {} ===", key);
        match serde_json::from_str::<serde_json::Value>(&value) {
            Ok(parsed) => println!("{}", serde_json::to_string_pretty(&parsed)?),
            Err(_) => println!("{}", value),
        }
        println!();
    }

    Ok(())
}
