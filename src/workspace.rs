//! Wires the live components of a workspace view together.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use crate::activity::{ActivityConfig, ActivityLogEngine, ActivityView};
use crate::graph::render::RenderTarget;
use crate::graph::sync::{GraphSyncController, SyncConfig, SyncOutcome};
use crate::refresh::RefreshHandle;
use crate::reschedule::{CalendarBoard, RescheduleAction, Rescheduler};
use crate::store::{DateRange, EntityStore, TrackedStore};

#[derive(Debug, Clone, Default)]
pub struct WorkspaceConfig {
    pub activity: ActivityConfig,
    pub graph: SyncConfig,
    pub calendar_range: Option<DateRange>,
}

/// Graph, activity feed and calendar over one store. Mutations made through
/// [`Workspace::store`] refresh the graph and the feed.
pub struct Workspace<T: RenderTarget + Send + 'static> {
    store: Arc<dyn EntityStore>,
    activity: ActivityLogEngine,
    graph: GraphSyncController<T>,
    graph_refresh: RefreshHandle,
    rescheduler: Rescheduler,
    calendar: CalendarBoard,
    calendar_range: Option<DateRange>,
}

impl<T: RenderTarget + Send + 'static> Workspace<T> {
    pub fn new(base: Arc<dyn EntityStore>, target: T, config: WorkspaceConfig) -> Self {
        let activity = ActivityLogEngine::new(Arc::clone(&base), config.activity);
        let graph_refresh = RefreshHandle::new();
        let store: Arc<dyn EntityStore> = Arc::new(
            TrackedStore::new(base)
                .with_hook(activity.refresh_handle())
                .with_hook(graph_refresh.clone()),
        );
        let graph = GraphSyncController::new(Arc::clone(&store), target, config.graph);
        let rescheduler =
            Rescheduler::new(Arc::clone(&store)).with_activity_refresh(activity.refresh_handle());

        Self {
            store,
            activity,
            graph,
            graph_refresh,
            rescheduler,
            calendar: CalendarBoard::default(),
            calendar_range: config.calendar_range,
        }
    }

    /// Store whose successful mutations fire the refresh hooks.
    pub fn store(&self) -> Arc<dyn EntityStore> {
        Arc::clone(&self.store)
    }

    pub fn activity(&self) -> &ActivityLogEngine {
        &self.activity
    }

    pub fn activity_mut(&mut self) -> &mut ActivityLogEngine {
        &mut self.activity
    }

    pub fn graph(&self) -> &GraphSyncController<T> {
        &self.graph
    }

    pub fn calendar(&self) -> &CalendarBoard {
        &self.calendar
    }

    pub fn graph_refresh(&self) -> RefreshHandle {
        self.graph_refresh.clone()
    }

    /// First load of every panel. Failures land in the panels themselves.
    pub async fn init(&mut self) -> SyncOutcome {
        let outcome = self.graph.init().await;
        self.activity.poll().await;
        self.reload_calendar().await;
        outcome
    }

    pub async fn refresh_all(&mut self) -> SyncOutcome {
        let outcome = self.graph.refresh().await;
        self.activity.poll().await;
        self.reload_calendar().await;
        outcome
    }

    async fn reload_calendar(&mut self) {
        match CalendarBoard::load(self.store.as_ref(), self.calendar_range).await {
            Ok(board) => self.calendar = board,
            Err(e) => warn!("failed to load calendar: {}", e),
        }
    }

    pub async fn reschedule(&mut self, task_id: i64, to: NaiveDate) -> RescheduleAction {
        self.rescheduler.reschedule(&mut self.calendar, task_id, to).await
    }

    /// Runs the graph and activity loops side by side until `shutdown`.
    pub async fn run<F>(&mut self, shutdown: watch::Receiver<bool>, on_activity: F)
    where
        F: FnMut(&ActivityView),
    {
        tokio::join!(
            self.graph.run(self.graph_refresh.clone(), shutdown.clone()),
            self.activity.run(shutdown, on_activity),
        );
    }

    pub fn teardown(&mut self) {
        self.graph.teardown();
        self.activity.teardown();
        self.calendar = CalendarBoard::default();
    }
}
