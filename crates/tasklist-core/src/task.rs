use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::iso_date_serde;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Sort weight: high 3, medium 2, low 1.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(anyhow!("invalid priority: {other} (expected low, medium or high)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,

    pub text: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(with = "iso_date_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "iso_date_serde::option")]
    pub deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    pub fn new(
        id: u64,
        text: String,
        now: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at: now,
            deadline,
            priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Priority, Task};

    #[test]
    fn serializes_browser_shape() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid now");
        let task = Task::new(1_771_329_600_000, "Buy milk".to_string(), now, None, Priority::High);

        let json = serde_json::to_value(&task).expect("serialize task");
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1_771_329_600_000_u64,
                "text": "Buy milk",
                "completed": false,
                "createdAt": "2026-02-17T12:00:00.000Z",
                "deadline": null,
                "priority": "high"
            })
        );
    }

    #[test]
    fn deserializes_missing_optional_fields() {
        let raw = r#"{"id":7,"text":"Walk","createdAt":"2026-02-17T12:00:00.000Z"}"#;
        let task: Task = serde_json::from_str(raw).expect("parse task");
        assert!(!task.completed);
        assert_eq!(task.deadline, None);
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn parses_priority_aliases() {
        assert_eq!("H".parse::<Priority>().expect("parse"), Priority::High);
        assert_eq!("med".parse::<Priority>().expect("parse"), Priority::Medium);
        assert_eq!("low".parse::<Priority>().expect("parse"), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn ranks_follow_priority_order() {
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }
}
