//! Shared fixtures for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

use crate::error::{Result, StoreError};
use crate::graph::render::RenderTarget;
use crate::graph::{Edge, Graph};
use crate::models::{ActivityEntry, CalendarTask, NewProject, NewTask, Project, Task};
use crate::store::{DateRange, EntityStore, LocalStore};

pub fn setup_store() -> (Arc<dyn EntityStore>, TempDir) {
    let dir = tempdir().unwrap();
    let store = LocalStore::open(&dir.path().join("workspace.db")).unwrap();
    (Arc::new(store), dir)
}

/// Wraps a store and fails or delays reads, or fails writes, on demand.
pub struct FlakyStore {
    inner: Arc<dyn EntityStore>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicU64,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn EntityStore>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            read_delay_ms: AtomicU64::new(0),
        }
    }

    /// Every read sleeps this long before answering.
    pub fn delay_reads(&self, delay: Duration) {
        self.read_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    async fn read(&self) -> Result<()> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection refused".into()));
        }
        Ok(())
    }

    fn write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected {
                status: 500,
                message: "Failed to update task".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.read().await?;
        self.inner.list_projects().await
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project> {
        self.write()?;
        self.inner.create_project(project).await
    }

    async fn update_project(&self, project: &Project) -> Result<()> {
        self.write()?;
        self.inner.update_project(project).await
    }

    async fn delete_project(&self, id: i64) -> Result<()> {
        self.write()?;
        self.inner.delete_project(id).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.read().await?;
        self.inner.list_tasks().await
    }

    async fn get_task(&self, id: i64) -> Result<Task> {
        self.read().await?;
        self.inner.get_task(id).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task> {
        self.write()?;
        self.inner.create_task(task).await
    }

    async fn create_subtask(&self, parent_id: i64, task: &NewTask) -> Result<Task> {
        self.write()?;
        self.inner.create_subtask(parent_id, task).await
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        self.write()?;
        self.inner.update_task(task).await
    }

    async fn delete_task(&self, id: i64) -> Result<()> {
        self.write()?;
        self.inner.delete_task(id).await
    }

    async fn list_activity(&self) -> Result<Vec<ActivityEntry>> {
        self.read().await?;
        self.inner.list_activity().await
    }

    async fn clear_activity(&self) -> Result<u64> {
        self.write()?;
        self.inner.clear_activity().await
    }

    async fn list_calendar_tasks(&self, range: Option<DateRange>) -> Result<Vec<CalendarTask>> {
        self.read().await?;
        self.inner.list_calendar_tasks(range).await
    }

    async fn fetch_graph(&self) -> Result<Vec<Value>> {
        self.read().await?;
        self.inner.fetch_graph().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    /// Node count.
    Initialize(usize),
    /// Node count.
    Replace(usize),
    Layout,
    /// Edge count.
    EdgeStyles(usize),
    Placeholder(String),
    Teardown,
}

#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub calls: Vec<RenderCall>,
}

impl RenderTarget for RecordingTarget {
    fn initialize(&mut self, graph: &Graph) -> io::Result<()> {
        self.calls.push(RenderCall::Initialize(graph.nodes.len()));
        Ok(())
    }

    fn replace_elements(&mut self, graph: &Graph) -> io::Result<()> {
        self.calls.push(RenderCall::Replace(graph.nodes.len()));
        Ok(())
    }

    fn run_layout(&mut self) -> io::Result<()> {
        self.calls.push(RenderCall::Layout);
        Ok(())
    }

    fn apply_edge_styles(&mut self, edges: &[Edge]) -> io::Result<()> {
        self.calls.push(RenderCall::EdgeStyles(edges.len()));
        Ok(())
    }

    fn show_placeholder(&mut self, message: &str) -> io::Result<()> {
        self.calls.push(RenderCall::Placeholder(message.to_string()));
        Ok(())
    }

    fn teardown(&mut self) -> io::Result<()> {
        self.calls.push(RenderCall::Teardown);
        Ok(())
    }
}
