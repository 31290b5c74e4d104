use crate::models::{FilterConfig, ScheduleSettings, User};
use chrono::{DateTime, Local};

/// Where the kill switch currently stands, as shown on the toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleStatus {
    /// Ground truth is being fetched from Gmail; the toggle is inert.
    Verifying,
    Inactive,
    Active,
    /// A create or remove is in flight. Remembers which stable state to
    /// fall back to if the request fails.
    Loading { was_active: bool },
}

/// Outcome of a background Gmail call, delivered together with the
/// generation that started it.
#[derive(Debug)]
pub enum FilterEvent {
    Verified(bool),
    Enabled,
    Disabled,
    Failed(String),
}

/// Everything the views read. One container, passed around explicitly;
/// mutations funnel through the methods below.
pub struct AppState {
    pub user: Option<User>,
    pub filter: FilterConfig,
    pub settings: ScheduleSettings,
    pub toggle: ToggleStatus,
    pub error: Option<String>,
    pub last_verified: Option<DateTime<Local>>,
    generation: u64,
}

impl AppState {
    pub fn new(user: Option<User>, settings: ScheduleSettings) -> Self {
        Self {
            user,
            filter: FilterConfig::default(),
            settings,
            toggle: ToggleStatus::Verifying,
            error: None,
            last_verified: None,
            generation: 0,
        }
    }

    /// Starts a fresh verification pass. Bumping the generation orphans
    /// any response still in flight from an earlier pass.
    pub fn begin_verify(&mut self) -> u64 {
        self.generation += 1;
        self.toggle = ToggleStatus::Verifying;
        self.error = None;
        self.generation
    }

    /// Arms a toggle, but only from a stable state; while verifying or
    /// loading the switch ignores input. Returns the request generation
    /// and whether the filter is currently on.
    pub fn begin_toggle(&mut self) -> Option<(u64, bool)> {
        let was_active = match self.toggle {
            ToggleStatus::Active => true,
            ToggleStatus::Inactive => false,
            ToggleStatus::Verifying | ToggleStatus::Loading { .. } => return None,
        };
        self.generation += 1;
        self.toggle = ToggleStatus::Loading { was_active };
        self.error = None;
        Some((self.generation, was_active))
    }

    /// Applies a background result. Results from a superseded generation
    /// are dropped, so a stale verification can never overwrite a newer
    /// one.
    pub fn apply(&mut self, generation: u64, event: FilterEvent) {
        if generation != self.generation {
            return;
        }

        match event {
            FilterEvent::Verified(enabled) => {
                self.filter.enabled = enabled;
                self.last_verified = Some(Local::now());
                self.toggle = if enabled {
                    ToggleStatus::Active
                } else {
                    ToggleStatus::Inactive
                };
            }
            FilterEvent::Enabled => {
                self.filter.enabled = true;
                self.toggle = ToggleStatus::Active;
            }
            FilterEvent::Disabled => {
                self.filter.enabled = false;
                self.toggle = ToggleStatus::Inactive;
            }
            FilterEvent::Failed(message) => {
                self.error = Some(message);
                self.toggle = match self.toggle {
                    ToggleStatus::Loading { was_active: true } => ToggleStatus::Active,
                    ToggleStatus::Loading { was_active: false } => ToggleStatus::Inactive,
                    // A failed verification leaves the switch off with a
                    // visible error.
                    ToggleStatus::Verifying => ToggleStatus::Inactive,
                    stable => stable,
                };
            }
        }
    }
}
