use serde::{Deserialize, Serialize};

/// Signed-in Google account profile. Persisted verbatim as JSON and
/// restored on the next launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

/// Local mirror of the kill-switch filter. `enabled` follows whatever
/// Gmail reports; the remote listing is authoritative, not this flag.
///
/// The auto-reply message and the exceptions list are edited locally and
/// never sent to Gmail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub enabled: bool,
    pub auto_reply_message: String,
    pub exceptions: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_reply_message: "I'm currently running an email filter. For urgent matters, \
                                 please reach me through another channel."
                .to_string(),
            exceptions: Vec::new(),
        }
    }
}

impl FilterConfig {
    /// Adds a sender to the allow-list. Empty strings and duplicates are
    /// dropped silently. Returns whether anything was added.
    pub fn add_exception(&mut self, email: &str) -> bool {
        let email = email.trim();
        if email.is_empty() || self.exceptions.iter().any(|e| e == email) {
            return false;
        }
        self.exceptions.push(email.to_string());
        true
    }

    pub fn remove_exception(&mut self, email: &str) {
        self.exceptions.retain(|e| e != email);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Normal,
    Aggressive,
}

impl FilterMode {
    pub fn label(&self) -> &'static str {
        match self {
            FilterMode::Normal => "normal",
            FilterMode::Aggressive => "aggressive",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            FilterMode::Normal => FilterMode::Aggressive,
            FilterMode::Aggressive => FilterMode::Normal,
        }
    }
}

fn default_start_time() -> String {
    "18:00".to_string()
}

fn default_end_time() -> String {
    "09:00".to_string()
}

fn default_active_days() -> Vec<u8> {
    vec![1, 2, 3, 4, 5]
}

/// Schedule preferences. Entirely local: nothing here is transmitted to
/// Gmail or checked against the remote filter state. Each field falls
/// back to its own default when missing from the stored JSON.
///
/// Days use 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSettings {
    #[serde(default)]
    pub filter_mode: FilterMode,
    #[serde(default = "default_start_time")]
    pub filter_start_time: String,
    #[serde(default = "default_end_time")]
    pub filter_end_time: String,
    #[serde(default = "default_active_days")]
    pub active_days: Vec<u8>,
    #[serde(default)]
    pub vacation_start: String,
    #[serde(default)]
    pub vacation_end: String,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            filter_mode: FilterMode::default(),
            filter_start_time: default_start_time(),
            filter_end_time: default_end_time(),
            active_days: default_active_days(),
            vacation_start: String::new(),
            vacation_end: String::new(),
        }
    }
}

impl ScheduleSettings {
    pub fn toggle_day(&mut self, day: u8) {
        if let Some(pos) = self.active_days.iter().position(|d| *d == day) {
            self.active_days.remove(pos);
        } else {
            self.active_days.push(day);
            self.active_days.sort_unstable();
        }
    }

    pub fn is_day_active(&self, day: u8) -> bool {
        self.active_days.contains(&day)
    }
}

// Wire shapes for the Gmail settings/filters endpoints.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterList {
    #[serde(default)]
    pub filter: Vec<RemoteFilter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub criteria: FilterCriteria,
    #[serde(default)]
    pub action: FilterAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterAction {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_label_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_label_ids: Vec<String>,
}
