use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PRIORITY: u8 = 3;
pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;

/// Priorities run from 1 (most urgent) to 5.
pub fn validate_priority(priority: u8) -> bool {
    (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "calendar_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "calendar_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_project_status", deserialize_with = "project_status")]
    pub status: String,
    /// Server fields this crate does not model, kept for full-record writes.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default = "default_priority", deserialize_with = "priority")]
    pub priority: u8,
    #[serde(default, with = "calendar_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub parent_task_id: Option<i64>,
    #[serde(default)]
    pub depends_on_task_id: Option<i64>,
    /// Server fields this crate does not model, kept for full-record writes.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "calendar_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(with = "calendar_date")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub priority: u8,
    #[serde(with = "calendar_date")]
    pub due_date: Option<NaiveDate>,
    pub parent_task_id: Option<i64>,
    pub depends_on_task_id: Option<i64>,
}

impl NewTask {
    pub fn new(project_id: i64, title: impl Into<String>) -> Self {
        NewTask {
            project_id,
            title: title.into(),
            description: None,
            assigned_to: None,
            priority: DEFAULT_PRIORITY,
            due_date: None,
            parent_task_id: None,
            depends_on_task_id: None,
        }
    }
}

/// Task state as reported by the server. `Overdue` is derived from the due
/// date and is never persisted from a client write. Statuses this crate does
/// not know, such as `blocked`, are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
    Overdue,
    Other(String),
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Done,
        TaskStatus::Overdue,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Overdue => "overdue",
            TaskStatus::Other(raw) => raw,
        }
    }

    /// Known names map to their variant, blank reads as `Todo`, anything
    /// else is kept as `Other` so a write-back returns it unchanged.
    pub fn parse_lenient(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return TaskStatus::Todo;
        }
        trimmed
            .parse()
            .unwrap_or_else(|_| TaskStatus::Other(trimmed.to_string()))
    }

    /// Status shown on the calendar: anything past due and not done is overdue.
    pub fn derive(&self, due_date: Option<NaiveDate>, today: NaiveDate) -> Self {
        match due_date {
            Some(due) if due < today && *self != TaskStatus::Done => TaskStatus::Overdue,
            _ => self.clone(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "overdue" => Ok(TaskStatus::Overdue),
            other => Err(format!(
                "Invalid status '{}'. Must be one of: todo, in_progress, done, overdue",
                other
            )),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.map(|s| TaskStatus::parse_lenient(&s)).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Created,
    Updated,
    Deleted,
}

impl ActionType {
    pub const ALL: [ActionType; 3] = [ActionType::Created, ActionType::Updated, ActionType::Deleted];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Created => "created",
            ActionType::Updated => "updated",
            ActionType::Deleted => "deleted",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            ActionType::Created => "+",
            ActionType::Updated => "~",
            ActionType::Deleted => "-",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Invalid action '{}'. Must be one of: created, updated, deleted",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Project,
    Task,
    Attachment,
    Chat,
    System,
}

impl ObjectType {
    pub const ALL: [ObjectType; 5] = [
        ObjectType::Project,
        ObjectType::Task,
        ObjectType::Attachment,
        ObjectType::Chat,
        ObjectType::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Project => "project",
            ObjectType::Task => "task",
            ObjectType::Attachment => "attachment",
            ObjectType::Chat => "chat",
            ObjectType::System => "system",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ObjectType::Project => "Project",
            ObjectType::Task => "Task",
            ObjectType::Attachment => "Attachment",
            ObjectType::Chat => "Chat message",
            ObjectType::System => "System",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectType::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Invalid object type '{}'. Must be one of: project, task, attachment, chat, system",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub action_type: ActionType,
    pub object_type: ObjectType,
    pub object_id: i64,
    #[serde(with = "activity_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Row of `GET /api/calendar/tasks`; the server already marks overdue tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarTask {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(with = "calendar_date::required")]
    pub due_date: NaiveDate,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn default_project_status() -> String {
    "active".to_string()
}

fn priority<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw: Option<i64> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|p| p.clamp(i64::from(MIN_PRIORITY), i64::from(MAX_PRIORITY)) as u8)
        .unwrap_or(DEFAULT_PRIORITY))
}

fn project_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_else(default_project_status))
}

/// Accepts `2025-10-30`, RFC 3339 and the RFC 2822 form Flask emits for dates.
pub fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    s.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Accepts RFC 3339 or a naive ISO-8601 timestamp, which is taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) mod calendar_date {
    use super::{format_date, parse_calendar_date};
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&format_date(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse_calendar_date(s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid date '{}'", s))),
        }
    }

    pub mod required {
        use super::super::{format_date, parse_calendar_date};
        use chrono::NaiveDate;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&format_date(*date))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
            let raw = String::deserialize(deserializer)?;
            parse_calendar_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date '{}'", raw)))
        }
    }
}

mod activity_timestamp {
    use super::parse_timestamp;
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}
