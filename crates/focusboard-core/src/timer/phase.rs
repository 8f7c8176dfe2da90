use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const FOCUS_DEFAULT_SECS: u32 = 25 * 60;
pub const SHORT_BREAK_DEFAULT_SECS: u32 = 5 * 60;
pub const LONG_BREAK_DEFAULT_SECS: u32 = 15 * 60;
pub const LONG_BREAK_INTERVAL_DEFAULT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Focus => "focus",
            Phase::ShortBreak => "short_break",
            Phase::LongBreak => "long_break",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Focus => "Focus",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, Phase::Focus)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "focus" | "pomodoro" => Ok(Phase::Focus),
            "short_break" | "short" => Ok(Phase::ShortBreak),
            "long_break" | "long" => Ok(Phase::LongBreak),
            _ => Err(ValidationError::UnknownPhase(s.to_string())),
        }
    }
}

/// Length of each phase in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durations {
    pub focus: u32,
    pub short_break: u32,
    pub long_break: u32,
}

impl Durations {
    pub fn get(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Focus => self.focus,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
        }
    }

    /// Every phase must last at least one second.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for phase in [Phase::Focus, Phase::ShortBreak, Phase::LongBreak] {
            if self.get(phase) == 0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("{phase}_duration"),
                    message: "must be a positive number of seconds".into(),
                });
            }
        }
        Ok(())
    }
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            focus: FOCUS_DEFAULT_SECS,
            short_break: SHORT_BREAK_DEFAULT_SECS,
            long_break: LONG_BREAK_DEFAULT_SECS,
        }
    }
}

/// Long-break cadence: counts completed focus intervals since the last
/// long break and decides which break comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    pub long_break_interval: u32,
    pub focus_streak: u32,
}

impl Cadence {
    pub fn new(long_break_interval: u32) -> Self {
        Self {
            long_break_interval: long_break_interval.max(1),
            focus_streak: 0,
        }
    }

    /// Record a completion of `phase` and return the phase that follows.
    pub fn next_after(&mut self, phase: Phase) -> Phase {
        match phase {
            Phase::Focus => {
                self.focus_streak = self.focus_streak.saturating_add(1);
                if self.focus_streak % self.long_break_interval.max(1) == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::LongBreak => {
                self.focus_streak = 0;
                Phase::Focus
            }
            Phase::ShortBreak => Phase::Focus,
        }
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::new(LONG_BREAK_INTERVAL_DEFAULT)
    }
}

/// `mm:ss`, minutes are not wrapped at 60.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Phase::ShortBreak).unwrap(),
            "\"short_break\""
        );
        let parsed: Phase = serde_json::from_str("\"long_break\"").unwrap();
        assert_eq!(parsed, Phase::LongBreak);
    }

    #[test]
    fn phase_parses_aliases() {
        assert_eq!("short-break".parse::<Phase>().unwrap(), Phase::ShortBreak);
        assert_eq!("Focus".parse::<Phase>().unwrap(), Phase::Focus);
        assert!("lunch".parse::<Phase>().is_err());
    }

    #[test]
    fn every_fourth_focus_earns_long_break() {
        let mut cadence = Cadence::new(4);
        let breaks: Vec<Phase> = (0..8).map(|_| cadence.next_after(Phase::Focus)).collect();
        assert_eq!(breaks[3], Phase::LongBreak);
        assert_eq!(breaks[7], Phase::LongBreak);
        assert_eq!(
            breaks.iter().filter(|p| **p == Phase::ShortBreak).count(),
            6
        );
    }

    #[test]
    fn long_break_completion_resets_streak() {
        let mut cadence = Cadence::new(2);
        cadence.next_after(Phase::Focus);
        assert_eq!(cadence.next_after(Phase::Focus), Phase::LongBreak);
        assert_eq!(cadence.next_after(Phase::LongBreak), Phase::Focus);
        assert_eq!(cadence.focus_streak, 0);
        assert_eq!(cadence.next_after(Phase::ShortBreak), Phase::Focus);
    }

    #[test]
    fn interval_of_one_always_long() {
        let mut cadence = Cadence::new(1);
        assert_eq!(cadence.next_after(Phase::Focus), Phase::LongBreak);
        assert_eq!(cadence.next_after(Phase::Focus), Phase::LongBreak);
    }

    #[test]
    fn zero_duration_rejected() {
        let durations = Durations {
            short_break: 0,
            ..Durations::default()
        };
        assert!(durations.validate().is_err());
        assert!(Durations::default().validate().is_ok());
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(6000), "100:00");
    }
}
