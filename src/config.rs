use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub keybindings: Keybindings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keybindings {
    pub quit: Vec<String>,
    pub toggle: Vec<String>,
    pub refresh: Vec<String>,
    pub settings: Vec<String>,
    pub back: Vec<String>,
    pub move_up: Vec<String>,
    pub move_down: Vec<String>,
    pub next_panel: Vec<String>,
    pub edit_reply: Vec<String>,
    pub add_exception: Vec<String>,
    pub remove_exception: Vec<String>,
    pub save: Vec<String>,
    pub logout: Vec<String>,
    pub open_browser: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keybindings: Keybindings {
                quit: vec!["q".to_string()],
                toggle: vec!["Enter".to_string(), " ".to_string()],
                refresh: vec!["r".to_string()],
                settings: vec!["s".to_string()],
                back: vec!["Esc".to_string()],
                move_up: vec!["k".to_string(), "Up".to_string()],
                move_down: vec!["j".to_string(), "Down".to_string()],
                next_panel: vec!["Tab".to_string()],
                edit_reply: vec!["m".to_string()],
                add_exception: vec!["a".to_string()],
                remove_exception: vec!["d".to_string(), "Backspace".to_string()],
                save: vec!["ctrl-s".to_string()],
                logout: vec!["ctrl-l".to_string()],
                open_browser: vec!["o".to_string()],
            },
        }
    }
}

pub fn parse_key_string(key_str: &str) -> (KeyCode, KeyModifiers) {
    let mut parts: Vec<&str> = key_str.split('-').collect();
    let mut modifiers = KeyModifiers::empty();

    // We process from the end to find the base key, then consume prefixes
    let base_key_str = parts.pop().unwrap_or("");

    for part in parts {
        match part.to_lowercase().as_str() {
            "ctrl" => modifiers.insert(KeyModifiers::CONTROL),
            "alt" => modifiers.insert(KeyModifiers::ALT),
            "shift" => modifiers.insert(KeyModifiers::SHIFT),
            "cmd" | "command" | "super" => modifiers.insert(KeyModifiers::SUPER),
            "meta" => modifiers.insert(KeyModifiers::META),
            _ => {}
        }
    }

    let code = match base_key_str {
        "Backspace" => KeyCode::Backspace,
        "Enter" => KeyCode::Enter,
        "Left" => KeyCode::Left,
        "Right" => KeyCode::Right,
        "Up" => KeyCode::Up,
        "Down" => KeyCode::Down,
        "Tab" => KeyCode::Tab,
        "BackTab" => KeyCode::BackTab,
        "Esc" => KeyCode::Esc,
        " " | "Space" => KeyCode::Char(' '),
        s if s.len() == 1 => KeyCode::Char(s.chars().next().unwrap()),
        _ => KeyCode::Null,
    };

    (code, modifiers)
}

pub fn matches_key(event: KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| {
        let (code, modifiers) = parse_key_string(b);
        event.code == code && event.modifiers.contains(modifiers)
    })
}

impl Config {
    pub fn load() -> Self {
        use std::fs;
        if let Ok(content) = fs::read_to_string("config.toml") {
            if let Ok(config) = toml::from_str(&content) {
                return config;
            }
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    #[test]
    fn parses_plain_and_modified_keys() {
        assert_eq!(parse_key_string("q"), (KeyCode::Char('q'), KeyModifiers::empty()));
        assert_eq!(parse_key_string("Esc"), (KeyCode::Esc, KeyModifiers::empty()));
        assert_eq!(
            parse_key_string("ctrl-s"),
            (KeyCode::Char('s'), KeyModifiers::CONTROL)
        );
        assert_eq!(
            parse_key_string("ctrl-alt-Enter"),
            (KeyCode::Enter, KeyModifiers::CONTROL | KeyModifiers::ALT)
        );
    }

    #[test]
    fn space_spellings_both_work() {
        assert_eq!(parse_key_string(" ").0, KeyCode::Char(' '));
        assert_eq!(parse_key_string("Space").0, KeyCode::Char(' '));
    }

    #[test]
    fn matches_any_binding_in_the_list() {
        let bindings = vec!["j".to_string(), "Down".to_string()];
        assert!(matches_key(
            key(KeyCode::Char('j'), KeyModifiers::empty()),
            &bindings
        ));
        assert!(matches_key(key(KeyCode::Down, KeyModifiers::empty()), &bindings));
        assert!(!matches_key(
            key(KeyCode::Char('x'), KeyModifiers::empty()),
            &bindings
        ));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(back.keybindings.quit, config.keybindings.quit);
        assert_eq!(back.keybindings.save, config.keybindings.save);
    }
}
