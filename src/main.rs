mod auth;
mod config;
mod db;
mod gmail;
mod models;
mod state;
mod ui;

use crate::config::{Config, matches_key};
use crate::gmail::GmailClient;
use crate::state::{AppState, FilterEvent};
use crate::ui::{FocusedPanel, InputTarget, UIMode};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use tokio::sync::mpsc;

enum AuthMessage {
    Token {
        access: String,
        id_token: Option<String>,
    },
    Failed(String),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let debug_logging = std::env::args().any(|arg| arg == "--debug");

    if debug_logging {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("kstui.log")?;
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "kstui=debug".into()),
            )
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    }

    let db_url = "sqlite:kstui.db?mode=rwc".to_string();
    let db = db::Database::new(&db_url).await?;
    db.run_migrations().await?;

    // Handle token reset
    if std::env::args().any(|arg| arg == "--reset-token") {
        auth::RingStorage.clear_token().await?;
        println!("Token cleared. Please restart without --reset-token to re-authenticate.");
        return Ok(());
    }

    // Setup terminal early
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = AppState::new(db::load_user(&db).await?, db::load_settings(&db).await?);
    let mut ui_state = ui::UIState::default();

    let (url_tx, mut url_rx) = mpsc::channel::<String>(1);
    let (auth_tx, mut auth_rx) = mpsc::channel::<AuthMessage>(1);
    let (event_tx, mut event_rx) = mpsc::channel::<(u64, FilterEvent)>(16);

    let secret = auth::Authenticator::load_secret("credentials.json").await?;
    let authenticator =
        auth::Authenticator::authenticate(secret, auth::TuiDelegate { tx: url_tx }).await?;

    tokio::spawn(async move {
        let message = match authenticator.token(auth::SCOPES).await {
            Ok(token) => match token.token() {
                Some(access) => {
                    let id_token = authenticator.id_token(auth::SCOPES).await.ok().flatten();
                    AuthMessage::Token {
                        access: access.to_string(),
                        id_token,
                    }
                }
                None => AuthMessage::Failed("Token response carried no access token".to_string()),
            },
            Err(err) => AuthMessage::Failed(format!("Sign-in failed: {}", err)),
        };
        let _ = auth_tx.send(message).await;
    });

    let client = GmailClient::new();
    let mut access_token: Option<String> = None;
    let mut signed_out = false;

    loop {
        // Check for auth messages
        while let Ok(url) = url_rx.try_recv() {
            ui_state.auth_url = Some(url);
            ui_state.mode = UIMode::Authentication;
        }

        if access_token.is_none() {
            if let Ok(message) = auth_rx.try_recv() {
                match message {
                    AuthMessage::Token { access, id_token } => {
                        ui_state.mode = UIMode::Control;
                        ui_state.auth_url = None;

                        // Prefer the profile baked into the ID token; fall
                        // back to the userinfo endpoint.
                        if app.user.is_none() {
                            let user = match id_token.as_deref().map(auth::decode_id_token) {
                                Some(Ok(user)) => Some(user),
                                _ => client.fetch_userinfo(&access).await.ok(),
                            };
                            if let Some(user) = user {
                                db::save_user(&db, &user).await?;
                                app.user = Some(user);
                            }
                        }

                        // Fetch ground truth instead of trusting any
                        // previously cached enabled flag.
                        let generation = app.begin_verify();
                        spawn_verify(client.clone(), access.clone(), generation, event_tx.clone());
                        access_token = Some(access);
                    }
                    AuthMessage::Failed(message) => {
                        ui_state.status_message = Some(message);
                    }
                }
            }
        }

        // Drain background results; stale generations are dropped inside
        while let Ok((generation, filter_event)) = event_rx.try_recv() {
            app.apply(generation, filter_event);
        }

        terminal.draw(|f| ui::render(f, &app, &mut ui_state))?;

        if !event::poll(std::time::Duration::from_millis(100))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };

        // A popup input swallows every key until closed
        if ui_state.input.is_some() {
            match key.code {
                KeyCode::Esc => {
                    ui_state.input = None;
                }
                KeyCode::Enter => {
                    if let Some((target, text)) = ui_state.take_input() {
                        apply_input(&mut app, &mut ui_state, target, text);
                    }
                }
                _ => {
                    if let Some(input) = &mut ui_state.input {
                        input.textarea.input(key);
                    }
                }
            }
            continue;
        }

        match ui_state.mode {
            UIMode::Authentication => {
                if matches_key(key, &config.keybindings.quit) {
                    break;
                }
                if matches_key(key, &config.keybindings.open_browser) {
                    if let Some(url) = &ui_state.auth_url {
                        let _ = open::that(url);
                    }
                }
            }
            UIMode::Control => {
                ui_state.status_message = None;

                if matches_key(key, &config.keybindings.quit) {
                    break;
                }

                if matches_key(key, &config.keybindings.logout) {
                    auth::RingStorage.clear_token().await?;
                    db::clear_user(&db).await?;
                    signed_out = true;
                    break;
                } else if matches_key(key, &config.keybindings.settings) {
                    ui_state.settings_draft = app.settings.clone();
                    ui_state.settings_field = 0;
                    ui_state.mode = UIMode::Settings;
                } else if matches_key(key, &config.keybindings.refresh) {
                    if let Some(token) = &access_token {
                        let generation = app.begin_verify();
                        spawn_verify(client.clone(), token.clone(), generation, event_tx.clone());
                    }
                } else if matches_key(key, &config.keybindings.next_panel) {
                    ui_state.focused_panel = match ui_state.focused_panel {
                        FocusedPanel::Toggle => FocusedPanel::Exceptions,
                        FocusedPanel::Exceptions => FocusedPanel::Toggle,
                    };
                } else if matches_key(key, &config.keybindings.toggle)
                    && ui_state.focused_panel == FocusedPanel::Toggle
                {
                    // Inert while verifying or while another request is
                    // already in flight
                    if let Some(token) = &access_token {
                        if let Some((generation, was_active)) = app.begin_toggle() {
                            spawn_toggle(
                                client.clone(),
                                token.clone(),
                                was_active,
                                generation,
                                event_tx.clone(),
                            );
                        }
                    }
                } else if matches_key(key, &config.keybindings.edit_reply) {
                    let initial = app.filter.auto_reply_message.clone();
                    ui_state.open_input(InputTarget::Reply, &initial);
                } else if matches_key(key, &config.keybindings.add_exception) {
                    ui_state.open_input(InputTarget::Exception, "");
                } else if matches_key(key, &config.keybindings.remove_exception)
                    && ui_state.focused_panel == FocusedPanel::Exceptions
                {
                    if let Some(email) = app
                        .filter
                        .exceptions
                        .get(ui_state.selected_exception)
                        .cloned()
                    {
                        app.filter.remove_exception(&email);
                        if ui_state.selected_exception >= app.filter.exceptions.len()
                            && !app.filter.exceptions.is_empty()
                        {
                            ui_state.selected_exception = app.filter.exceptions.len() - 1;
                        }
                    }
                } else if matches_key(key, &config.keybindings.move_down) {
                    if ui_state.focused_panel == FocusedPanel::Exceptions
                        && ui_state.selected_exception + 1 < app.filter.exceptions.len()
                    {
                        ui_state.selected_exception += 1;
                    }
                } else if matches_key(key, &config.keybindings.move_up) {
                    if ui_state.focused_panel == FocusedPanel::Exceptions
                        && ui_state.selected_exception > 0
                    {
                        ui_state.selected_exception -= 1;
                    }
                }
            }
            UIMode::Settings => {
                if matches_key(key, &config.keybindings.back) {
                    // Unsaved draft edits are dropped
                    ui_state.mode = UIMode::Control;
                } else if matches_key(key, &config.keybindings.save) {
                    app.settings = ui_state.settings_draft.clone();
                    db::save_settings(&db, &app.settings).await?;
                    ui_state.status_message = Some("Settings saved".to_string());
                    ui_state.mode = UIMode::Control;
                } else if matches_key(key, &config.keybindings.move_down) {
                    if ui_state.settings_field + 1 < ui::SETTINGS_FIELDS.len() {
                        ui_state.settings_field += 1;
                    }
                } else if matches_key(key, &config.keybindings.move_up) {
                    ui_state.settings_field = ui_state.settings_field.saturating_sub(1);
                } else if ui_state.settings_field == 3 {
                    // The day row is edited in place
                    match key.code {
                        KeyCode::Char('h') | KeyCode::Left => {
                            ui_state.day_cursor = ui_state.day_cursor.saturating_sub(1);
                        }
                        KeyCode::Char('l') | KeyCode::Right => {
                            if ui_state.day_cursor < ui::DAY_LABELS.len() - 1 {
                                ui_state.day_cursor += 1;
                            }
                        }
                        KeyCode::Char(' ') => {
                            ui_state
                                .settings_draft
                                .toggle_day(ui_state.day_cursor as u8);
                        }
                        _ => {}
                    }
                } else if key.code == KeyCode::Enter {
                    match ui_state.settings_field {
                        0 => {
                            ui_state.settings_draft.filter_mode =
                                ui_state.settings_draft.filter_mode.toggled();
                        }
                        i @ (1 | 2 | 4 | 5) => {
                            let initial = ui::settings_field_value(&ui_state.settings_draft, i);
                            ui_state.open_input(InputTarget::SettingsField(i), &initial);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if signed_out {
        println!("Signed out. Run again to re-authenticate.");
    }

    Ok(())
}

fn apply_input(
    app: &mut AppState,
    ui_state: &mut ui::UIState<'_>,
    target: InputTarget,
    text: String,
) {
    match target {
        InputTarget::Reply => {
            // Edited in memory only; this message is never sent anywhere
            app.filter.auto_reply_message = text;
        }
        InputTarget::Exception => {
            let email = text.lines().next().unwrap_or("");
            app.filter.add_exception(email);
        }
        InputTarget::SettingsField(index) => {
            let value = text.lines().next().unwrap_or("").trim().to_string();
            let draft = &mut ui_state.settings_draft;
            match index {
                1 => draft.filter_start_time = value,
                2 => draft.filter_end_time = value,
                4 => draft.vacation_start = value,
                5 => draft.vacation_end = value,
                _ => {}
            }
        }
    }
}

fn spawn_verify(
    client: GmailClient,
    token: String,
    generation: u64,
    tx: mpsc::Sender<(u64, FilterEvent)>,
) {
    tokio::spawn(async move {
        let filter_event = match client.check_filter(&token).await {
            Ok(enabled) => FilterEvent::Verified(enabled),
            Err(err) => FilterEvent::Failed(err.to_string()),
        };
        let _ = tx.send((generation, filter_event)).await;
    });
}

fn spawn_toggle(
    client: GmailClient,
    token: String,
    was_active: bool,
    generation: u64,
    tx: mpsc::Sender<(u64, FilterEvent)>,
) {
    tokio::spawn(async move {
        let filter_event = if was_active {
            match client.remove_filter(&token).await {
                Ok(()) => FilterEvent::Disabled,
                Err(err) => FilterEvent::Failed(err.to_string()),
            }
        } else {
            match client.create_filter(&token).await {
                Ok(()) => FilterEvent::Enabled,
                Err(err) => FilterEvent::Failed(err.to_string()),
            }
        };
        let _ = tx.send((generation, filter_event)).await;
    });
}
