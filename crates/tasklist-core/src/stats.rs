use chrono::{DateTime, Duration, Utc};

use crate::deadline::DeadlineStatus;
use crate::task::{Priority, Task};
use crate::view::FilterMode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub overdue: usize,
}

impl Stats {
    /// Counts over the whole canonical list, ignoring filter and search.
    pub fn collect(tasks: &[Task], now: DateTime<Utc>, close_window: Duration) -> Self {
        let mut stats = Stats {
            total: tasks.len(),
            ..Stats::default()
        };

        for task in tasks {
            if task.completed {
                stats.completed += 1;
            }
            match task.priority {
                Priority::High => stats.high += 1,
                Priority::Medium => stats.medium += 1,
                Priority::Low => stats.low += 1,
            }
            if DeadlineStatus::classify(task.deadline, now, close_window)
                == Some(DeadlineStatus::Overdue)
            {
                stats.overdue += 1;
            }
        }

        stats.pending = stats.total - stats.completed;
        stats
    }

    /// Two-slice completed/pending chart data.
    pub fn chart(&self) -> [ChartSlice; 2] {
        [
            ChartSlice {
                label: "Completed",
                value: self.completed,
            },
            ChartSlice {
                label: "Pending",
                value: self.pending,
            },
        ]
    }

    pub fn by_priority(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSlice {
    pub label: &'static str,
    pub value: usize,
}

impl ChartSlice {
    pub fn share_of(&self, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.value as f64 / total as f64
        }
    }
}

/// Live counts shown on the filter buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCounts {
    pub all: usize,
    pub active: usize,
    pub completed: usize,
}

impl FilterCounts {
    pub fn from_stats(stats: &Stats) -> Self {
        Self {
            all: stats.total,
            active: stats.pending,
            completed: stats.completed,
        }
    }

    pub fn get(&self, mode: FilterMode) -> usize {
        match mode {
            FilterMode::All => self.all,
            FilterMode::Active => self.active,
            FilterMode::Completed => self.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{FilterCounts, Stats};
    use crate::deadline::default_close_window;
    use crate::task::{Priority, Task};
    use crate::view::FilterMode;

    #[test]
    fn counts_everything_once() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid now");

        let mut done_overdue = Task::new(1, "a".into(), now, Some(now - Duration::days(1)), Priority::High);
        done_overdue.completed = true;
        let overdue = Task::new(2, "b".into(), now, Some(now - Duration::hours(1)), Priority::Low);
        let close = Task::new(3, "c".into(), now, Some(now + Duration::hours(1)), Priority::High);
        let plain = Task::new(4, "d".into(), now, None, Priority::Medium);

        let stats = Stats::collect(&[done_overdue, overdue, close, plain], now, default_close_window());
        assert_eq!(
            stats,
            Stats {
                total: 4,
                completed: 1,
                pending: 3,
                high: 2,
                medium: 1,
                low: 1,
                overdue: 2,
            }
        );

        let [completed, pending] = stats.chart();
        assert_eq!((completed.label, completed.value), ("Completed", 1));
        assert_eq!((pending.label, pending.value), ("Pending", 3));
        assert!((pending.share_of(stats.total) - 0.75).abs() < f64::EPSILON);

        let counts = FilterCounts::from_stats(&stats);
        assert_eq!(counts.get(FilterMode::All), 4);
        assert_eq!(counts.get(FilterMode::Active), 3);
        assert_eq!(counts.get(FilterMode::Completed), 1);
    }

    #[test]
    fn empty_list_has_zero_shares() {
        let stats = Stats::default();
        assert_eq!(stats.chart()[0].share_of(stats.total), 0.0);
    }
}
