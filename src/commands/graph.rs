use anyhow::{bail, Result};
use std::io;
use std::sync::Arc;

use teamgraph::graph::render::{JsonTarget, RenderTarget, TerminalTarget};
use teamgraph::graph::{parse_node_id, project_node_id, task_node_id, NodeKind};
use teamgraph::graph::stats::GraphStats;
use teamgraph::graph::sync::{load_graph, GraphSource, GraphSyncController, SyncConfig, SyncOutcome};
use teamgraph::store::EntityStore;

fn source(server_built: bool) -> GraphSource {
    if server_built {
        GraphSource::Server
    } else {
        GraphSource::Client
    }
}

async fn render_once<T: RenderTarget + Send + 'static>(
    store: Arc<dyn EntityStore>,
    target: T,
    server_built: bool,
) -> SyncOutcome {
    let config = SyncConfig {
        reassert_delays: Vec::new(),
        source: source(server_built),
        poll_interval: None,
    };
    let mut controller = GraphSyncController::new(store, target, config);
    let outcome = controller.init().await;
    controller.teardown();
    outcome
}

/// Prints the graph once, as a tree or as one JSON `initialize` frame.
pub async fn run(store: Arc<dyn EntityStore>, json: bool, server_built: bool) -> Result<()> {
    let outcome = if json {
        render_once(store, JsonTarget::new(io::stdout()), server_built).await
    } else {
        render_once(store, TerminalTarget::new(io::stdout()), server_built).await
    };

    if let SyncOutcome::Failed(message) = outcome {
        bail!("Failed to load graph: {}", message);
    }
    Ok(())
}

/// Shows one project or task node with its counts.
pub async fn node(store: Arc<dyn EntityStore>, node_id: &str, json: bool, server_built: bool) -> Result<()> {
    let Some((kind, id)) = parse_node_id(node_id) else {
        bail!("Invalid node id '{}'. Use project-<id> or task-<id>", node_id);
    };
    let canonical = match kind {
        NodeKind::Project => project_node_id(id),
        NodeKind::Task => task_node_id(id),
    };

    let graph = load_graph(store, source(server_built)).await?;
    let Some(detail) = graph.node_detail(&canonical) else {
        match kind {
            NodeKind::Project => bail!("Project #{} not found", id),
            NodeKind::Task => bail!("Task #{} not found", id),
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&detail.to_json()?)?);
    } else {
        print!("{}", detail.render());
    }
    Ok(())
}

pub async fn stats(store: Arc<dyn EntityStore>, json: bool) -> Result<()> {
    let graph = load_graph(store, GraphSource::Client).await?;
    let stats = GraphStats::of(&graph);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Projects: {}", stats.projects);
    for (status, count) in &stats.projects_by_status {
        println!("  {:<12} {}", status, count);
    }
    println!("Tasks: {}", stats.tasks);
    for (status, count) in &stats.tasks_by_status {
        println!("  {:<12} {}", status, count);
    }
    for (priority, count) in &stats.tasks_by_priority {
        println!("  P{:<11} {}", priority, count);
    }
    println!("Edges: {}", stats.edges);
    for (kind, count) in &stats.edges_by_kind {
        println!("  {:<12} {}", kind, count);
    }
    if stats.dangling_edges > 0 {
        println!("Dangling edges: {}", stats.dangling_edges);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamgraph::models::{NewProject, NewTask};
    use teamgraph::store::LocalStore;
    use tempfile::tempdir;

    fn setup_store() -> (Arc<dyn EntityStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(&dir.path().join("workspace.db")).unwrap();
        (Arc::new(store), dir)
    }

    async fn seed(store: &dyn EntityStore) {
        let pid = store
            .create_project(&NewProject {
                name: "Launch".into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id;
        let ship = store.create_task(&NewTask::new(pid, "Ship")).await.unwrap();
        store
            .create_subtask(ship.id, &NewTask::new(pid, "Notes"))
            .await
            .unwrap();
    }

    // ==================== Unit Tests ====================

    #[tokio::test]
    async fn test_graph_tree_and_json() {
        let (store, _dir) = setup_store();
        seed(store.as_ref()).await;

        assert!(run(Arc::clone(&store), false, false).await.is_ok());
        assert!(run(Arc::clone(&store), true, false).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_json_target_streams_edge_reassertions() {
        let (store, _dir) = setup_store();
        seed(store.as_ref()).await;

        let mut controller =
            GraphSyncController::new(store, JsonTarget::new(Vec::new()), SyncConfig::default());
        assert!(matches!(controller.init().await, SyncOutcome::Initialized));
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        let target = controller.target();
        let target = target.lock().unwrap();
        let frames: Vec<serde_json::Value> = String::from_utf8(target.get_ref().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let events: Vec<_> = frames.iter().map(|f| f["event"].as_str().unwrap()).collect();
        assert_eq!(events, ["initialize", "edge_styles", "edge_styles", "edge_styles"]);

        let subtask = target
            .elements()
            .iter()
            .find(|e| e["data"]["type"] == "subtask")
            .unwrap();
        assert_eq!(subtask["data"]["line_style"], "dashed");
    }

    #[tokio::test]
    async fn test_server_built_falls_back_for_local_store() {
        let (store, _dir) = setup_store();
        seed(store.as_ref()).await;
        assert!(run(store, false, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_graph_empty_workspace() {
        let (store, _dir) = setup_store();
        assert!(run(store, false, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_node_detail() {
        let (store, _dir) = setup_store();
        seed(store.as_ref()).await;

        assert!(node(Arc::clone(&store), "project-1", false, false).await.is_ok());
        assert!(node(Arc::clone(&store), "task-1", true, false).await.is_ok());
        assert!(node(Arc::clone(&store), "task-01", false, false).await.is_ok());

        let err = node(Arc::clone(&store), "task-99", false, false).await.unwrap_err();
        assert_eq!(err.to_string(), "Task #99 not found");
        let err = node(store, "milestone-1", false, false).await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid node id"));
    }

    #[tokio::test]
    async fn test_stats() {
        let (store, _dir) = setup_store();
        seed(store.as_ref()).await;
        assert!(stats(Arc::clone(&store), false).await.is_ok());
        assert!(stats(store, true).await.is_ok());
    }
}
