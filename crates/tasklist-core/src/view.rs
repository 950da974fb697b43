use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Completed,
}

impl FilterMode {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => !task.completed,
            FilterMode::Completed => task.completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::All => "all",
            FilterMode::Active => "active",
            FilterMode::Completed => "completed",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "active" | "pending" | "open" => Ok(FilterMode::Active),
            "completed" | "done" => Ok(FilterMode::Completed),
            other => Err(anyhow!("invalid filter: {other} (expected all, active or completed)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    PriorityHigh,
    PriorityLow,
    Deadline,
    Created,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::PriorityHigh => "priority-high",
            SortMode::PriorityLow => "priority-low",
            SortMode::Deadline => "deadline",
            SortMode::Created => "created",
        }
    }

    pub fn compare(self, left: &Task, right: &Task) -> Ordering {
        match self {
            SortMode::PriorityHigh => right.priority.rank().cmp(&left.priority.rank()),
            SortMode::PriorityLow => left.priority.rank().cmp(&right.priority.rank()),
            SortMode::Deadline => compare_deadline_nulls_last(left, right),
            SortMode::Created => right.created_at.cmp(&left.created_at),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority-high" | "priority-desc" | "priority" => Ok(SortMode::PriorityHigh),
            "priority-low" | "priority-asc" => Ok(SortMode::PriorityLow),
            "deadline" | "deadline-asc" | "due" => Ok(SortMode::Deadline),
            "created" | "created-desc" | "newest" => Ok(SortMode::Created),
            other => Err(anyhow!(
                "invalid sort: {other} (expected priority-high, priority-low, deadline or created)"
            )),
        }
    }
}

/// Missing deadlines go last no matter which side they are on.
fn compare_deadline_nulls_last(left: &Task, right: &Task) -> Ordering {
    match (left.deadline, right.deadline) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub filter: FilterMode,
    pub search: String,
    pub sort: SortMode,
}

/// One visible row: the task and where it sits in the canonical list.
#[derive(Debug, Clone, Copy)]
pub struct ViewRow<'a> {
    pub canonical_index: usize,
    pub task: &'a Task,
}

/// Filter, then search, then sort. The sort is stable, so ties keep
/// canonical (manual) order.
#[tracing::instrument(skip(tasks, query), fields(filter = %query.filter, sort = %query.sort))]
pub fn derive<'a>(tasks: &'a [Task], query: &ViewQuery) -> Vec<ViewRow<'a>> {
    let needle = query.search.to_lowercase();

    let mut rows: Vec<ViewRow<'a>> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| query.filter.matches(task))
        .filter(|(_, task)| needle.is_empty() || task.text.to_lowercase().contains(&needle))
        .map(|(canonical_index, task)| ViewRow {
            canonical_index,
            task,
        })
        .collect();

    rows.sort_by(|a, b| query.sort.compare(a.task, b.task));

    trace!(visible = rows.len(), total = tasks.len(), "derived view");
    rows
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{FilterMode, SortMode, ViewQuery, derive};
    use crate::task::{Priority, Task};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid base")
    }

    fn task(id: u64, text: &str, priority: Priority) -> Task {
        Task::new(id, text.to_string(), base() + Duration::minutes(id as i64), None, priority)
    }

    fn texts(tasks: &[Task], query: &ViewQuery) -> Vec<String> {
        derive(tasks, query)
            .into_iter()
            .map(|row| row.task.text.clone())
            .collect()
    }

    #[test]
    fn priority_sorts_both_directions() {
        let tasks = vec![task(1, "A", Priority::High), task(2, "B", Priority::Low)];

        let mut query = ViewQuery {
            sort: SortMode::PriorityHigh,
            ..ViewQuery::default()
        };
        assert_eq!(texts(&tasks, &query), vec!["A", "B"]);

        query.sort = SortMode::PriorityLow;
        assert_eq!(texts(&tasks, &query), vec!["B", "A"]);
    }

    #[test]
    fn equal_priorities_keep_manual_order() {
        let tasks = vec![
            task(1, "first", Priority::Medium),
            task(2, "urgent", Priority::High),
            task(3, "second", Priority::Medium),
        ];
        let query = ViewQuery::default();
        assert_eq!(texts(&tasks, &query), vec!["urgent", "first", "second"]);
    }

    #[test]
    fn deadline_sort_puts_missing_last() {
        let mut later = task(1, "later", Priority::Low);
        later.deadline = Some(base() + Duration::days(5));
        let undated_a = task(2, "undated-a", Priority::High);
        let mut sooner = task(3, "sooner", Priority::Medium);
        sooner.deadline = Some(base() + Duration::days(1));
        let undated_b = task(4, "undated-b", Priority::Low);

        let tasks = vec![undated_a, later, undated_b, sooner];
        let query = ViewQuery {
            sort: SortMode::Deadline,
            ..ViewQuery::default()
        };
        assert_eq!(
            texts(&tasks, &query),
            vec!["sooner", "later", "undated-a", "undated-b"]
        );
    }

    #[test]
    fn created_sort_is_newest_first() {
        let tasks = vec![
            task(1, "old", Priority::Medium),
            task(3, "newest", Priority::Medium),
            task(2, "mid", Priority::Medium),
        ];
        let query = ViewQuery {
            sort: SortMode::Created,
            ..ViewQuery::default()
        };
        assert_eq!(texts(&tasks, &query), vec!["newest", "mid", "old"]);
    }

    #[test]
    fn active_and_completed_partition_the_list() {
        let mut tasks: Vec<Task> = (1..=6)
            .map(|id| task(id, &format!("t{id}"), Priority::Medium))
            .collect();
        tasks[1].completed = true;
        tasks[4].completed = true;

        let ids = |filter: FilterMode| -> Vec<u64> {
            let query = ViewQuery {
                filter,
                ..ViewQuery::default()
            };
            let mut ids: Vec<u64> = derive(&tasks, &query).iter().map(|r| r.task.id).collect();
            ids.sort_unstable();
            ids
        };

        let active = ids(FilterMode::Active);
        let completed = ids(FilterMode::Completed);
        assert!(active.iter().all(|id| !completed.contains(id)));

        let mut union: Vec<u64> = active.into_iter().chain(completed).collect();
        union.sort_unstable();
        assert_eq!(union, ids(FilterMode::All));
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let tasks = vec![
            task(1, "Buy MILK", Priority::Medium),
            task(2, "Call mom", Priority::Medium),
            task(3, "Ödev yap", Priority::Medium),
        ];
        let mut query = ViewQuery {
            search: "milk".to_string(),
            ..ViewQuery::default()
        };
        assert_eq!(texts(&tasks, &query), vec!["Buy MILK"]);

        query.search = "ÖDEV".to_string();
        assert_eq!(texts(&tasks, &query), vec!["Ödev yap"]);

        query.search = String::new();
        assert_eq!(texts(&tasks, &query).len(), 3);
    }

    #[test]
    fn rows_remember_canonical_index() {
        let mut tasks = vec![
            task(1, "a", Priority::Low),
            task(2, "b", Priority::High),
        ];
        tasks[0].completed = true;
        let query = ViewQuery {
            filter: FilterMode::Active,
            ..ViewQuery::default()
        };
        let rows = derive(&tasks, &query);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].canonical_index, 1);
    }

    #[test]
    fn parses_mode_aliases() {
        assert_eq!("priority-desc".parse::<SortMode>().expect("parse"), SortMode::PriorityHigh);
        assert_eq!("deadline-asc".parse::<SortMode>().expect("parse"), SortMode::Deadline);
        assert_eq!("done".parse::<FilterMode>().expect("parse"), FilterMode::Completed);
        assert!("sideways".parse::<SortMode>().is_err());
    }
}
