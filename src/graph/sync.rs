//! Keeps a render target consistent with the store's projects and tasks.

use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::render::RenderTarget;
use super::{build_graph, Edge, Graph, Node};
use crate::error::{Result, StoreError};
use crate::refresh::{RefreshHandle, RequestSequencer, Ticket};
use crate::store::EntityStore;

/// Where the graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphSource {
    /// Built here from project and task listings.
    #[default]
    Client,
    /// Fetched pre-built from the store, falling back to `Client` when the
    /// store cannot build it.
    Server,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delays after each render pass at which edge styles are re-applied.
    pub reassert_delays: Vec<Duration>,
    pub source: GraphSource,
    /// Poll for changes on this interval; `None` renders only on refresh.
    pub poll_interval: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reassert_delays: vec![
                Duration::from_millis(100),
                Duration::from_millis(300),
                Duration::from_millis(600),
            ],
            source: GraphSource::Client,
            poll_interval: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Empty,
    Rendered(Graph),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Initialized,
    Updated(GraphDiff),
    Unchanged,
    /// The fetch failed and a placeholder is showing.
    Failed(String),
    /// A newer response was already applied.
    Stale,
}

/// Node and edge ids that differ between two graphs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphDiff {
    pub added_nodes: Vec<String>,
    pub removed_nodes: Vec<String>,
    pub changed_nodes: Vec<String>,
    pub added_edges: Vec<String>,
    pub removed_edges: Vec<String>,
    pub changed_edges: Vec<String>,
}

impl GraphDiff {
    pub fn between(old: &Graph, new: &Graph) -> Self {
        let (added_nodes, removed_nodes, changed_nodes) =
            diff_by_id(&old.nodes, &new.nodes, |n: &Node| n.id.as_str());
        let (added_edges, removed_edges, changed_edges) =
            diff_by_id(&old.edges, &new.edges, |e: &Edge| e.id.as_str());
        GraphDiff {
            added_nodes,
            removed_nodes,
            changed_nodes,
            added_edges,
            removed_edges,
            changed_edges,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.changed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
            && self.changed_edges.is_empty()
    }
}

type IdDiff = (Vec<String>, Vec<String>, Vec<String>);

fn diff_by_id<T: PartialEq>(old: &[T], new: &[T], id: impl Fn(&T) -> &str) -> IdDiff {
    let old: BTreeMap<&str, &T> = old.iter().map(|x| (id(x), x)).collect();
    let new: BTreeMap<&str, &T> = new.iter().map(|x| (id(x), x)).collect();

    let mut added = Vec::new();
    let mut changed = Vec::new();
    for (key, item) in &new {
        match old.get(key) {
            None => added.push(key.to_string()),
            Some(prev) if prev != item => changed.push(key.to_string()),
            Some(_) => {}
        }
    }
    let removed = old
        .keys()
        .filter(|key| !new.contains_key(*key))
        .map(|key| key.to_string())
        .collect();
    (added, removed, changed)
}

/// Fetches rows (or server-built elements) and builds the graph once.
pub async fn load_graph(store: Arc<dyn EntityStore>, source: GraphSource) -> Result<Graph> {
    if source == GraphSource::Server {
        match store.fetch_graph().await {
            Ok(elements) => return Ok(Graph::from_elements(&elements)),
            Err(StoreError::Unsupported(what)) => {
                debug!(what, "store cannot build the graph, building locally");
            }
            Err(e) => return Err(e),
        }
    }
    let (projects, tasks) = tokio::try_join!(store.list_projects(), store.list_tasks())?;
    Ok(build_graph(&projects, &tasks))
}

type Dispatched = (Ticket, Result<Graph>);

/// Owns the current render state and is its only writer.
pub struct GraphSyncController<T: RenderTarget + Send + 'static> {
    store: Arc<dyn EntityStore>,
    target: Arc<Mutex<T>>,
    config: SyncConfig,
    state: RenderState,
    sequencer: RequestSequencer,
    reassertions: Vec<JoinHandle<()>>,
}

impl<T: RenderTarget + Send + 'static> GraphSyncController<T> {
    pub fn new(store: Arc<dyn EntityStore>, target: T, config: SyncConfig) -> Self {
        Self {
            store,
            target: Arc::new(Mutex::new(target)),
            config,
            state: RenderState::Empty,
            sequencer: RequestSequencer::new(),
            reassertions: Vec::new(),
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn target(&self) -> Arc<Mutex<T>> {
        Arc::clone(&self.target)
    }

    /// First load. Same as `refresh`, named for the widget lifecycle.
    pub async fn init(&mut self) -> SyncOutcome {
        self.refresh().await
    }

    /// Poll tick: re-renders only if the graph changed.
    pub async fn sync(&mut self) -> SyncOutcome {
        let (ticket, result) = self.dispatch().await;
        self.apply(ticket, result, false)
    }

    /// Manual refresh: always re-renders.
    pub async fn refresh(&mut self) -> SyncOutcome {
        let (ticket, result) = self.dispatch().await;
        self.apply(ticket, result, true)
    }

    /// Stamps a fetch with a ticket. The returned future owns everything it
    /// needs so several can be in flight at once.
    pub fn dispatch(&self) -> impl Future<Output = Dispatched> + Send + 'static {
        let ticket = self.sequencer.begin();
        let store = Arc::clone(&self.store);
        let source = self.config.source;
        async move { (ticket, load_graph(store, source).await) }
    }

    /// Applies a fetch result unless a newer one has already been applied.
    pub fn apply(&mut self, ticket: Ticket, result: Result<Graph>, force: bool) -> SyncOutcome {
        if !self.sequencer.accept(ticket) {
            debug!("discarding stale graph response");
            return SyncOutcome::Stale;
        }

        let graph = match result {
            Ok(graph) => graph,
            Err(e) => {
                warn!(kind = ?e.kind(), "graph fetch failed: {}", e);
                self.show_placeholder(&format!("Unable to load the task graph: {}", e));
                return SyncOutcome::Failed(e.to_string());
            }
        };

        let current = match &self.state {
            RenderState::Empty => return self.initialize(graph),
            RenderState::Rendered(current) => current,
        };

        if *current == graph && !force {
            return SyncOutcome::Unchanged;
        }
        let diff = GraphDiff::between(current, &graph);
        if !diff.is_empty() {
            info!(
                added_nodes = diff.added_nodes.len(),
                removed_nodes = diff.removed_nodes.len(),
                changed_nodes = diff.changed_nodes.len(),
                added_edges = diff.added_edges.len(),
                removed_edges = diff.removed_edges.len(),
                changed_edges = diff.changed_edges.len(),
                "graph changed"
            );
        }

        self.cancel_reassertions();
        let rendered = self.with_target(|target| {
            target.replace_elements(&graph)?;
            target.run_layout()
        });
        if !rendered {
            self.state = RenderState::Empty;
            return SyncOutcome::Failed("render target rejected the update".into());
        }

        self.schedule_reassertions(&graph.edges);
        self.state = RenderState::Rendered(graph);
        SyncOutcome::Updated(diff)
    }

    fn initialize(&mut self, graph: Graph) -> SyncOutcome {
        self.cancel_reassertions();
        if !self.with_target(|target| target.initialize(&graph)) {
            return SyncOutcome::Failed("render target failed to initialize".into());
        }
        info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "graph rendered");
        self.schedule_reassertions(&graph.edges);
        self.state = RenderState::Rendered(graph);
        SyncOutcome::Initialized
    }

    fn show_placeholder(&mut self, message: &str) {
        self.cancel_reassertions();
        self.with_target(|target| target.show_placeholder(message));
        self.state = RenderState::Empty;
    }

    /// Runs `f` against the target; false if the lock or the target failed.
    fn with_target(&self, f: impl FnOnce(&mut T) -> std::io::Result<()>) -> bool {
        let Ok(mut target) = self.target.lock() else {
            warn!("render target lock poisoned");
            return false;
        };
        match f(&mut target) {
            Ok(()) => true,
            Err(e) => {
                warn!("render target error: {}", e);
                false
            }
        }
    }

    fn schedule_reassertions(&mut self, edges: &[Edge]) {
        let edges: Arc<[Edge]> = Arc::from(edges);
        for &delay in &self.config.reassert_delays {
            let target = Arc::clone(&self.target);
            let edges = Arc::clone(&edges);
            self.reassertions.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                match target.lock() {
                    Ok(mut target) => {
                        if let Err(e) = target.apply_edge_styles(&edges) {
                            warn!("edge style re-assertion failed: {}", e);
                        }
                    }
                    Err(_) => warn!("render target lock poisoned"),
                }
            }));
        }
    }

    fn cancel_reassertions(&mut self) {
        for handle in self.reassertions.drain(..) {
            handle.abort();
        }
    }

    pub fn teardown(&mut self) {
        self.sequencer.invalidate();
        self.cancel_reassertions();
        self.with_target(|target| target.teardown());
        self.state = RenderState::Empty;
    }

    /// Renders on every refresh request and, if configured, on each poll
    /// tick until `shutdown` flips to true.
    pub async fn run(&mut self, refresh: RefreshHandle, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = self.config.poll_interval.map(|period| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        let mut in_flight: JoinSet<(Dispatched, bool)> = JoinSet::new();

        if matches!(self.state, RenderState::Empty) {
            let fetch = self.dispatch();
            in_flight.spawn(async move { (fetch.await, true) });
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = async {
                    match ticker.as_mut() {
                        Some(ticker) => { ticker.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    let fetch = self.dispatch();
                    in_flight.spawn(async move { (fetch.await, false) });
                }
                _ = refresh.notified() => {
                    let fetch = self.dispatch();
                    in_flight.spawn(async move { (fetch.await, true) });
                }
                Some(joined) = in_flight.join_next() => match joined {
                    Ok(((ticket, result), force)) => {
                        let outcome = self.apply(ticket, result, force);
                        debug!(?outcome, "graph sync pass");
                    }
                    Err(e) => warn!("graph fetch task failed: {}", e),
                },
            }
        }

        in_flight.abort_all();
    }
}

impl<T: RenderTarget + Send + 'static> Drop for GraphSyncController<T> {
    fn drop(&mut self) {
        self.cancel_reassertions();
    }
}
