use crate::models::{ScheduleSettings, User};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, sqlite::SqlitePool};
use tracing::warn;

pub const USER_KEY: &str = "user";
pub const SETTINGS_KEY: &str = "filterSettings";

/// Flat get/set/clear over the preference store. Everything above the
/// storage layer goes through this trait, so tests can swap in a map.
#[async_trait]
pub trait KeyValue: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn clear(&self, key: &str) -> Result<()>;
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        use sqlx::sqlite::SqliteConnectOptions;
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        sqlx::query(schema).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValue for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO preferences (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Loads schedule preferences, filling defaults for any missing field.
/// A corrupted value degrades to the defaults rather than failing the
/// launch.
pub async fn load_settings<S: KeyValue + ?Sized>(store: &S) -> Result<ScheduleSettings> {
    let raw = store
        .get(SETTINGS_KEY)
        .await?
        .unwrap_or_else(|| "{}".to_string());

    match serde_json::from_str(&raw) {
        Ok(settings) => Ok(settings),
        Err(err) => {
            warn!("stored schedule settings unreadable, using defaults: {}", err);
            Ok(ScheduleSettings::default())
        }
    }
}

pub async fn save_settings<S: KeyValue + ?Sized>(
    store: &S,
    settings: &ScheduleSettings,
) -> Result<()> {
    store
        .set(SETTINGS_KEY, &serde_json::to_string(settings)?)
        .await
}

/// Restores the saved profile, if any. A corrupted value is treated as
/// signed out.
pub async fn load_user<S: KeyValue + ?Sized>(store: &S) -> Result<Option<User>> {
    let Some(raw) = store.get(USER_KEY).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(user) => Ok(Some(user)),
        Err(err) => {
            warn!("stored user profile unreadable, ignoring: {}", err);
            Ok(None)
        }
    }
}

pub async fn save_user<S: KeyValue + ?Sized>(store: &S, user: &User) -> Result<()> {
    store.set(USER_KEY, &serde_json::to_string(user)?).await
}

pub async fn clear_user<S: KeyValue + ?Sized>(store: &S) -> Result<()> {
    store.clear(USER_KEY).await
}
