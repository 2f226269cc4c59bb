use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{DateRange, EntityStore};
use crate::error::Result;
use crate::models::{ActivityEntry, CalendarTask, NewProject, NewTask, Project, Task};
use crate::refresh::RefreshHandle;

/// Fires refresh hooks after every successful project or task mutation, so
/// views that depend on the log or the graph pick up the change at once.
pub struct TrackedStore {
    inner: Arc<dyn EntityStore>,
    hooks: Vec<RefreshHandle>,
}

impl TrackedStore {
    pub fn new(inner: Arc<dyn EntityStore>) -> Self {
        Self {
            inner,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: RefreshHandle) -> Self {
        self.hooks.push(hook);
        self
    }

    fn fired<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            for hook in &self.hooks {
                hook.request();
            }
        }
        result
    }
}

#[async_trait]
impl EntityStore for TrackedStore {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.inner.list_projects().await
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project> {
        self.fired(self.inner.create_project(project).await)
    }

    async fn update_project(&self, project: &Project) -> Result<()> {
        self.fired(self.inner.update_project(project).await)
    }

    async fn delete_project(&self, id: i64) -> Result<()> {
        self.fired(self.inner.delete_project(id).await)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.inner.list_tasks().await
    }

    async fn get_task(&self, id: i64) -> Result<Task> {
        self.inner.get_task(id).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task> {
        self.fired(self.inner.create_task(task).await)
    }

    async fn create_subtask(&self, parent_id: i64, task: &NewTask) -> Result<Task> {
        self.fired(self.inner.create_subtask(parent_id, task).await)
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        self.fired(self.inner.update_task(task).await)
    }

    async fn delete_task(&self, id: i64) -> Result<()> {
        self.fired(self.inner.delete_task(id).await)
    }

    async fn list_activity(&self) -> Result<Vec<ActivityEntry>> {
        self.inner.list_activity().await
    }

    async fn clear_activity(&self) -> Result<u64> {
        self.inner.clear_activity().await
    }

    async fn list_calendar_tasks(&self, range: Option<DateRange>) -> Result<Vec<CalendarTask>> {
        self.inner.list_calendar_tasks(range).await
    }

    async fn fetch_graph(&self) -> Result<Vec<Value>> {
        self.inner.fetch_graph().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_store;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn fired(hook: &RefreshHandle) -> bool {
        timeout(Duration::from_millis(20), hook.notified()).await.is_ok()
    }

    #[tokio::test]
    async fn test_mutation_fires_hooks() {
        let (store, _dir) = setup_store();
        let hook = RefreshHandle::new();
        let tracked = TrackedStore::new(store).with_hook(hook.clone());

        tracked
            .create_project(&NewProject {
                name: "Launch".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(fired(&hook).await);
    }

    #[tokio::test]
    async fn test_reads_and_failures_do_not_fire() {
        let (store, _dir) = setup_store();
        let hook = RefreshHandle::new();
        let tracked = TrackedStore::new(store).with_hook(hook.clone());

        tracked.list_tasks().await.unwrap();
        assert!(tracked.delete_task(99).await.is_err());
        assert!(!fired(&hook).await);
    }
}
