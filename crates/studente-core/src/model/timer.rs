// ── Session timer ──

use std::time::Duration;

use strum::{Display, EnumString};

/// Default session length when the tracker never sends `maxtime`.
pub const DEFAULT_MAX_TIMER: Duration = Duration::from_secs(30 * 60);

/// Remaining session time as last reported by a `TIMER_TICK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub remaining_ms: u64,
    pub max_ms: u64,
}

/// Urgency bucket for rendering the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TimerLevel {
    /// More than 30% left.
    Normal,
    /// 30% or less.
    Warning,
    /// 10% or less.
    Critical,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            remaining_ms: 0,
            max_ms: u64::try_from(DEFAULT_MAX_TIMER.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl TimerState {
    /// `HH:MM:SS`, hours not wrapped at 24.
    pub fn formatted(&self) -> String {
        let total_secs = self.remaining_ms / 1000;
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }

    pub fn level(&self) -> TimerLevel {
        // remaining / max <= 10%  <=>  remaining * 10 <= max
        let remaining = u128::from(self.remaining_ms);
        let max = u128::from(self.max_ms);
        if remaining * 10 <= max {
            TimerLevel::Critical
        } else if remaining * 10 <= max * 3 {
            TimerLevel::Warning
        } else {
            TimerLevel::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(remaining_ms: u64) -> TimerState {
        TimerState {
            remaining_ms,
            ..TimerState::default()
        }
    }

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(timer(0).formatted(), "00:00:00");
        assert_eq!(timer(999).formatted(), "00:00:00");
        assert_eq!(timer(61_000).formatted(), "00:01:01");
        assert_eq!(timer(3_723_000).formatted(), "01:02:03");
    }

    #[test]
    fn levels_follow_remaining_fraction() {
        // max = 30 min = 1_800_000 ms
        assert_eq!(timer(1_800_000).level(), TimerLevel::Normal);
        assert_eq!(timer(540_001).level(), TimerLevel::Normal);
        assert_eq!(timer(540_000).level(), TimerLevel::Warning);
        assert_eq!(timer(180_001).level(), TimerLevel::Warning);
        assert_eq!(timer(180_000).level(), TimerLevel::Critical);
        assert_eq!(timer(0).level(), TimerLevel::Critical);
    }

    #[test]
    fn default_max_is_thirty_minutes() {
        assert_eq!(TimerState::default().max_ms, 1_800_000);
        assert_eq!(TimerLevel::Warning.to_string(), "warning");
    }
}
