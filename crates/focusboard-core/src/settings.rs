//! Per-user timer settings.
//!
//! Mirrors one row of the remote `user_settings` table. Durations are whole
//! seconds. A copy is cached in the local config so the timer works without
//! a remote identity.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::timer::{
    Cadence, Durations, FOCUS_DEFAULT_SECS, LONG_BREAK_DEFAULT_SECS, LONG_BREAK_INTERVAL_DEFAULT,
    SHORT_BREAK_DEFAULT_SECS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default = "default_focus")]
    pub focus_duration: u32,
    #[serde(default = "default_short_break")]
    pub short_break_duration: u32,
    #[serde(default = "default_long_break")]
    pub long_break_duration: u32,
    #[serde(default = "default_interval")]
    pub long_break_interval: u32,
    #[serde(default)]
    pub auto_start_break: bool,
    #[serde(default)]
    pub auto_start_pomodoro: bool,
}

fn default_focus() -> u32 {
    FOCUS_DEFAULT_SECS
}
fn default_short_break() -> u32 {
    SHORT_BREAK_DEFAULT_SECS
}
fn default_long_break() -> u32 {
    LONG_BREAK_DEFAULT_SECS
}
fn default_interval() -> u32 {
    LONG_BREAK_INTERVAL_DEFAULT
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            focus_duration: default_focus(),
            short_break_duration: default_short_break(),
            long_break_duration: default_long_break(),
            long_break_interval: default_interval(),
            auto_start_break: false,
            auto_start_pomodoro: false,
        }
    }
}

impl UserSettings {
    pub fn durations(&self) -> Durations {
        Durations {
            focus: self.focus_duration,
            short_break: self.short_break_duration,
            long_break: self.long_break_duration,
        }
    }

    pub fn cadence(&self) -> Cadence {
        Cadence::new(self.long_break_interval)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.durations().validate()?;
        if self.long_break_interval == 0 {
            return Err(ValidationError::InvalidValue {
                field: "long_break_interval".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Remote rows may carry a null/zero interval; treat it as the default.
    pub fn normalized(mut self) -> Self {
        if self.long_break_interval == 0 {
            self.long_break_interval = default_interval();
        }
        self
    }
}
