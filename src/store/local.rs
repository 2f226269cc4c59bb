use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{DateRange, EntityStore};
use crate::db::{Database, ACTIVITY_WINDOW};
use crate::error::{Result, StoreError};
use crate::models::{ActivityEntry, CalendarTask, NewProject, NewTask, Project, Task};

/// Entity Store over a workspace database on disk.
pub struct LocalStore {
    db: Mutex<Database>,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| StoreError::Transport("workspace database lock poisoned".into()))
    }
}

#[async_trait]
impl EntityStore for LocalStore {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.db()?.list_projects()
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project> {
        self.db()?.create_project(project)
    }

    async fn update_project(&self, project: &Project) -> Result<()> {
        if !self.db()?.update_project(project)? {
            return Err(StoreError::NotFound { entity: "project", id: project.id });
        }
        Ok(())
    }

    async fn delete_project(&self, id: i64) -> Result<()> {
        if !self.db()?.delete_project(id)? {
            return Err(StoreError::NotFound { entity: "project", id });
        }
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.db()?.list_tasks()
    }

    async fn get_task(&self, id: i64) -> Result<Task> {
        self.db()?
            .get_task(id)?
            .ok_or(StoreError::NotFound { entity: "task", id })
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task> {
        self.db()?.create_task(task)
    }

    async fn create_subtask(&self, parent_id: i64, task: &NewTask) -> Result<Task> {
        self.db()?.create_subtask(parent_id, task)
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        if !self.db()?.update_task(task)? {
            return Err(StoreError::NotFound { entity: "task", id: task.id });
        }
        Ok(())
    }

    async fn delete_task(&self, id: i64) -> Result<()> {
        if !self.db()?.delete_task(id)? {
            return Err(StoreError::NotFound { entity: "task", id });
        }
        Ok(())
    }

    async fn list_activity(&self) -> Result<Vec<ActivityEntry>> {
        self.db()?.list_activity(ACTIVITY_WINDOW)
    }

    async fn clear_activity(&self) -> Result<u64> {
        self.db()?.clear_activity()
    }

    async fn list_calendar_tasks(&self, range: Option<DateRange>) -> Result<Vec<CalendarTask>> {
        self.db()?.calendar_tasks(range, Utc::now().date_naive())
    }
}
