use std::fmt;

use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_CLOSE_DAYS: i64 = 2;

/// Badge classification of a deadline relative to the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineStatus {
    Overdue,
    Close,
    Normal,
}

impl DeadlineStatus {
    /// `None` when there is no deadline. A deadline exactly at `now` is
    /// close, not overdue.
    pub fn classify(
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        close_window: Duration,
    ) -> Option<Self> {
        let delta = deadline? - now;
        if delta < Duration::zero() {
            Some(DeadlineStatus::Overdue)
        } else if delta <= close_window {
            Some(DeadlineStatus::Close)
        } else {
            Some(DeadlineStatus::Normal)
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeadlineStatus::Overdue => "overdue",
            DeadlineStatus::Close => "close",
            DeadlineStatus::Normal => "normal",
        }
    }
}

impl fmt::Display for DeadlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn default_close_window() -> Duration {
    Duration::days(DEFAULT_CLOSE_DAYS)
}
