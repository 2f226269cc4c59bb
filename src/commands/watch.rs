use anyhow::Result;
use chrono::Utc;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use teamgraph::activity::{ActivityConfig, ActivityView};
use teamgraph::graph::render::{JsonTarget, RenderTarget, TerminalTarget};
use teamgraph::graph::sync::{GraphSource, SyncConfig, SyncOutcome};
use teamgraph::store::EntityStore;
use teamgraph::workspace::{Workspace, WorkspaceConfig};

pub struct WatchOptions {
    pub poll: Duration,
    /// `None` re-renders the graph only after local mutations.
    pub graph_poll: Option<Duration>,
    pub server_built: bool,
    /// Stream newline-delimited JSON frames instead of text.
    pub json: bool,
}

impl WatchOptions {
    pub fn from_millis(poll_ms: u64, graph_poll_ms: u64, server_built: bool) -> Self {
        WatchOptions {
            poll: Duration::from_millis(poll_ms.max(1)),
            graph_poll: (graph_poll_ms > 0).then(|| Duration::from_millis(graph_poll_ms)),
            server_built,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn workspace_config(&self) -> WorkspaceConfig {
        WorkspaceConfig {
            activity: ActivityConfig {
                poll_interval: self.poll,
                ..Default::default()
            },
            graph: SyncConfig {
                source: if self.server_built {
                    GraphSource::Server
                } else {
                    GraphSource::Client
                },
                poll_interval: self.graph_poll,
                ..Default::default()
            },
            calendar_range: None,
        }
    }
}

fn activity_frame(view: &ActivityView) -> Option<String> {
    let frame = serde_json::json!({ "event": "activity", "view": view });
    match serde_json::to_string(&frame) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!("could not encode activity frame: {}", e);
            None
        }
    }
}

fn print_activity(view: &ActivityView, json: bool, first: bool) {
    if json {
        if let Some(line) = activity_frame(view) {
            println!("{}", line);
        }
        return;
    }
    println!();
    if !first {
        println!("--- activity ---");
    }
    print!("{}", view.render());
}

async fn watch_with<T: RenderTarget + Send + 'static>(
    store: Arc<dyn EntityStore>,
    target: T,
    options: WatchOptions,
    shutdown: watch::Receiver<bool>,
) {
    let json = options.json;
    let mut ws = Workspace::new(store, target, options.workspace_config());

    if let SyncOutcome::Failed(message) = ws.init().await {
        info!("graph not loaded yet: {}", message);
    }
    print_activity(&ws.activity().view(Utc::now()), json, true);

    ws.run(shutdown, |view| print_activity(view, json, false)).await;

    ws.teardown();
}

/// Prints the graph and the activity feed, then keeps both current until
/// `shutdown` flips to true.
pub async fn run(
    store: Arc<dyn EntityStore>,
    options: WatchOptions,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    if options.json {
        watch_with(store, JsonTarget::new(io::stdout()), options, shutdown).await;
    } else {
        watch_with(store, TerminalTarget::new(io::stdout()), options, shutdown).await;
        println!("Stopped watching.");
    }
    Ok(())
}
