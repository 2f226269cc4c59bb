//! Entity Store abstraction over the workspace's projects, tasks and
//! activity log.
//!
//! Two backends implement [`EntityStore`]: [`HttpStore`] talks to the REST
//! surface of a workspace server and [`LocalStore`] wraps a SQLite
//! [`Database`](crate::db::Database). [`TrackedStore`] decorates either one
//! and fires refresh hooks after each successful mutation.

mod http;
mod local;
mod tracked;

pub use http::HttpStore;
pub use local::LocalStore;
pub use tracked::TrackedStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::models::{ActivityEntry, CalendarTask, NewProject, NewTask, Project, Task};

/// Inclusive date window for calendar listings.
pub type DateRange = (NaiveDate, NaiveDate);

#[async_trait]
pub trait EntityStore: Send + Sync {
    // ========================================================================
    // Projects
    // ========================================================================

    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn create_project(&self, project: &NewProject) -> Result<Project>;

    /// Full-record replace.
    async fn update_project(&self, project: &Project) -> Result<()>;

    async fn delete_project(&self, id: i64) -> Result<()>;

    // ========================================================================
    // Tasks
    // ========================================================================

    async fn list_tasks(&self) -> Result<Vec<Task>>;

    async fn get_task(&self, id: i64) -> Result<Task>;

    async fn create_task(&self, task: &NewTask) -> Result<Task>;

    /// Creates a task under `parent_id`; the parent's project wins.
    async fn create_subtask(&self, parent_id: i64, task: &NewTask) -> Result<Task>;

    /// Full-record replace. A status of `overdue` is never persisted.
    async fn update_task(&self, task: &Task) -> Result<()>;

    async fn delete_task(&self, id: i64) -> Result<()>;

    // ========================================================================
    // Activity and calendar
    // ========================================================================

    /// Entries in whatever order the backend returns them.
    async fn list_activity(&self) -> Result<Vec<ActivityEntry>>;

    /// Truncates the log and returns the number of deleted entries.
    async fn clear_activity(&self) -> Result<u64>;

    async fn list_calendar_tasks(&self, range: Option<DateRange>) -> Result<Vec<CalendarTask>>;

    /// Server-built graph elements, when the backend builds them.
    async fn fetch_graph(&self) -> Result<Vec<Value>> {
        Err(StoreError::Unsupported("server-built graph"))
    }
}
