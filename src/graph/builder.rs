use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{project_node_id, task_node_id, Edge, EdgeKind, Graph, Node, NodeRecord};
use crate::models::{parse_calendar_date, Project, Task, TaskStatus, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};

/// Builds the relationship graph from flat rows.
///
/// Rows with a repeated id collapse to the last one. Nodes come out as
/// projects by id then tasks by id; each task contributes its `belongs_to`,
/// `subtask` and `depends_on` edges in that order. References to rows that
/// are not present still produce an edge, flagged as dangling.
pub fn build_graph(projects: &[Project], tasks: &[Task]) -> Graph {
    let projects: BTreeMap<i64, &Project> = projects.iter().map(|p| (p.id, p)).collect();
    let tasks: BTreeMap<i64, &Task> = tasks.iter().map(|t| (t.id, t)).collect();

    let mut nodes = Vec::with_capacity(projects.len() + tasks.len());
    for project in projects.values() {
        nodes.push(Node {
            id: project_node_id(project.id),
            label: project.name.clone(),
            record: NodeRecord::Project((*project).clone()),
        });
    }

    let mut edges = Vec::new();
    for task in tasks.values() {
        let source = task_node_id(task.id);
        nodes.push(Node {
            id: source.clone(),
            label: task.title.clone(),
            record: NodeRecord::Task((*task).clone()),
        });

        edges.push(Edge::new(
            EdgeKind::BelongsTo,
            source.clone(),
            project_node_id(task.project_id),
            projects.get(&task.project_id).map(|p| p.name.as_str()),
        ));

        if let Some(parent_id) = task.parent_task_id {
            edges.push(Edge::new(
                EdgeKind::Subtask,
                source.clone(),
                task_node_id(parent_id),
                tasks.get(&parent_id).map(|t| t.title.as_str()),
            ));
        }

        if let Some(blocker_id) = task.depends_on_task_id {
            edges.push(Edge::new(
                EdgeKind::DependsOn,
                source,
                task_node_id(blocker_id),
                tasks.get(&blocker_id).map(|t| t.title.as_str()),
            ));
        }
    }

    let dangling = edges.iter().filter(|e| e.dangling).count();
    if dangling > 0 {
        debug!(dangling, "graph has edges to missing nodes");
    }

    Graph { nodes, edges }
}

impl Graph {
    /// Rebuilds a graph from server-built elements.
    ///
    /// Rows are recovered from node metadata and edges are re-derived, so
    /// the result is identical to building from the same rows locally. A
    /// task without a `project_id` takes it from a `belongs_to` edge in
    /// either direction; one with neither is dropped.
    pub fn from_elements(elements: &[Value]) -> Graph {
        let mut projects = Vec::new();
        let mut tasks = Vec::new();
        let mut task_projects: BTreeMap<i64, i64> = BTreeMap::new();

        for element in elements {
            let Some(data) = element.get("data").and_then(Value::as_object) else {
                warn!("skipping graph element without data");
                continue;
            };

            if data.contains_key("source") && data.contains_key("target") {
                if data.get("type").and_then(Value::as_str) == Some(EdgeKind::BelongsTo.as_str()) {
                    let ends = [str_field(data, "source"), str_field(data, "target")];
                    let task = ends.iter().flatten().find_map(|id| parse_node_id(id, "task-"));
                    let project = ends.iter().flatten().find_map(|id| parse_node_id(id, "project-"));
                    if let (Some(task), Some(project)) = (task, project) {
                        task_projects.insert(task, project);
                    }
                }
                continue;
            }

            let Some(id) = str_field(data, "id") else {
                warn!("skipping graph node without id");
                continue;
            };

            if let Some(project_id) = parse_node_id(id, "project-") {
                projects.push(project_from_data(project_id, data));
            } else if let Some(task_id) = parse_node_id(id, "task-") {
                tasks.push(PartialTask {
                    id: task_id,
                    project_id: int_field(data, "project_id"),
                    data,
                });
            } else {
                warn!(id, "skipping graph node with unrecognized id");
            }
        }

        let tasks: Vec<Task> = tasks
            .into_iter()
            .filter_map(|partial| {
                let Some(project_id) = partial
                    .project_id
                    .or_else(|| task_projects.get(&partial.id).copied())
                else {
                    warn!(task_id = partial.id, "skipping graph task with no project");
                    return None;
                };
                Some(task_from_data(partial.id, project_id, partial.data))
            })
            .collect();

        build_graph(&projects, &tasks)
    }
}

struct PartialTask<'a> {
    id: i64,
    project_id: Option<i64>,
    data: &'a serde_json::Map<String, Value>,
}

fn parse_node_id(id: &str, prefix: &str) -> Option<i64> {
    id.strip_prefix(prefix)?.parse().ok()
}

fn str_field<'a>(data: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

fn int_field(data: &serde_json::Map<String, Value>, key: &str) -> Option<i64> {
    data.get(key).and_then(Value::as_i64)
}

fn opt_string(data: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    str_field(data, key)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn date_field(data: &serde_json::Map<String, Value>, key: &str) -> Option<chrono::NaiveDate> {
    str_field(data, key).and_then(parse_calendar_date)
}

fn project_from_data(id: i64, data: &serde_json::Map<String, Value>) -> Project {
    Project {
        id,
        name: str_field(data, "label")
            .or_else(|| str_field(data, "name"))
            .unwrap_or_default()
            .to_string(),
        description: opt_string(data, "description"),
        start_date: date_field(data, "start_date"),
        end_date: date_field(data, "end_date"),
        status: str_field(data, "status").unwrap_or("active").to_string(),
        extra: BTreeMap::new(),
    }
}

fn task_from_data(id: i64, project_id: i64, data: &serde_json::Map<String, Value>) -> Task {
    let priority = int_field(data, "priority")
        .map(|p| p.clamp(i64::from(MIN_PRIORITY), i64::from(MAX_PRIORITY)) as u8)
        .unwrap_or(DEFAULT_PRIORITY);

    Task {
        id,
        project_id,
        title: str_field(data, "label")
            .or_else(|| str_field(data, "title"))
            .unwrap_or_default()
            .to_string(),
        description: opt_string(data, "description"),
        assigned_to: opt_string(data, "assigned_to"),
        status: str_field(data, "status")
            .map(TaskStatus::parse_lenient)
            .unwrap_or_default(),
        priority,
        due_date: date_field(data, "due_date"),
        parent_task_id: int_field(data, "parent_task_id"),
        depends_on_task_id: int_field(data, "depends_on_task_id"),
        extra: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{UNKNOWN_PROJECT, UNKNOWN_TASK};
    use proptest::prelude::*;
    use serde_json::json;

    fn project(id: i64, name: &str) -> Project {
        serde_json::from_value(json!({"id": id, "name": name})).unwrap()
    }

    fn task(id: i64, project_id: i64, parent: Option<i64>, depends_on: Option<i64>) -> Task {
        serde_json::from_value(json!({
            "id": id,
            "project_id": project_id,
            "title": format!("Task {}", id),
            "parent_task_id": parent,
            "depends_on_task_id": depends_on
        }))
        .unwrap()
    }

    // ==================== Unit Tests ====================

    #[test]
    fn test_single_task_single_project() {
        let graph = build_graph(&[project(1, "Launch")], &[task(5, 1, None, None)]);

        let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["project-1", "task-5"]);
        assert_eq!(graph.edges.len(), 1);
        let edge = &graph.edges[0];
        assert_eq!(edge.kind, EdgeKind::BelongsTo);
        assert_eq!(edge.source, "task-5");
        assert_eq!(edge.target, "project-1");
        assert_eq!(edge.target_label, "Launch");
        assert!(!edge.dangling);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_graph(&[], &[]).is_empty());
    }

    #[test]
    fn test_missing_parent_is_flagged() {
        let graph = build_graph(&[project(1, "P")], &[task(2, 1, Some(99), None)]);
        let edge = graph.edges_of(EdgeKind::Subtask).next().unwrap();
        assert_eq!(edge.target, "task-99");
        assert_eq!(edge.target_label, UNKNOWN_TASK);
        assert!(edge.dangling);
    }

    #[test]
    fn test_missing_project_is_flagged() {
        let graph = build_graph(&[], &[task(2, 7, None, None)]);
        let edge = &graph.edges[0];
        assert_eq!(edge.target_label, UNKNOWN_PROJECT);
        assert!(edge.dangling);
    }

    #[test]
    fn test_relations_are_independent() {
        let tasks = [
            task(1, 1, None, None),
            task(2, 1, Some(1), None),
            task(3, 1, None, Some(1)),
            task(4, 1, Some(2), Some(3)),
        ];
        let graph = build_graph(&[project(1, "P")], &tasks);

        assert_eq!(graph.edges_of(EdgeKind::BelongsTo).count(), 4);
        assert_eq!(graph.edges_of(EdgeKind::Subtask).count(), 2);
        assert_eq!(graph.edges_of(EdgeKind::DependsOn).count(), 2);

        let kinds: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.source == "task-4")
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![EdgeKind::BelongsTo, EdgeKind::Subtask, EdgeKind::DependsOn]);
    }

    #[test]
    fn test_self_reference_accepted() {
        let graph = build_graph(&[project(1, "P")], &[task(1, 1, Some(1), Some(1))]);
        assert_eq!(graph.edges.len(), 3);
        assert!(graph.edges.iter().all(|e| !e.dangling));
    }

    #[test]
    fn test_duplicate_rows_last_wins() {
        let mut renamed = task(3, 1, None, None);
        renamed.title = "Renamed".into();
        let graph = build_graph(&[project(1, "P")], &[task(3, 1, None, None), renamed]);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.node("task-3").unwrap().label, "Renamed");
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let a = build_graph(
            &[project(2, "B"), project(1, "A")],
            &[task(9, 1, None, None), task(3, 2, None, Some(9))],
        );
        let b = build_graph(
            &[project(1, "A"), project(2, "B")],
            &[task(3, 2, None, Some(9)), task(9, 1, None, None)],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_server_elements() {
        // Server-built shape: belongs_to runs project -> task and ids use its own scheme.
        let elements = vec![
            json!({"data": {"id": "project-1", "label": "Launch", "type": "project", "status": "active"}}),
            json!({"data": {"id": "task-5", "label": "Write copy", "type": "task", "status": "in_progress",
                            "priority": 2, "project_id": 1, "due_date": "2025-10-30",
                            "parent_task_id": null, "depends_on_task_id": 4}}),
            json!({"data": {"id": "task-4", "label": "Brief", "type": "task", "status": "done"}}),
            json!({"data": {"id": "edge-project-1-task-4", "source": "project-1", "target": "task-4",
                            "type": "belongs_to"}}),
            json!({"data": {"id": "edge-depends-4-on-5", "source": "task-4", "target": "task-5",
                            "type": "depends_on"}}),
        ];

        let graph = Graph::from_elements(&elements);
        let local = build_graph(
            &[project(1, "Launch")],
            &[
                Task {
                    title: "Brief".into(),
                    status: TaskStatus::Done,
                    ..task(4, 1, None, None)
                },
                Task {
                    title: "Write copy".into(),
                    status: TaskStatus::InProgress,
                    priority: 2,
                    due_date: parse_calendar_date("2025-10-30"),
                    ..task(5, 1, None, Some(4))
                },
            ],
        );
        assert_eq!(graph, local);
    }

    #[test]
    fn test_from_elements_skips_task_without_project() {
        let elements = vec![json!({"data": {"id": "task-1", "label": "Lost"}}), json!("junk")];
        assert!(Graph::from_elements(&elements).is_empty());
    }

    #[test]
    fn test_elements_roundtrip_through_server_shape() {
        let graph = build_graph(
            &[project(1, "P")],
            &[task(1, 1, None, None), task(2, 1, Some(1), Some(1))],
        );
        assert_eq!(Graph::from_elements(&graph.to_elements()), graph);
    }

    // ==================== Property-Based Tests ====================

    fn arb_task() -> impl Strategy<Value = Task> {
        (
            1i64..20,
            1i64..4,
            proptest::option::of(1i64..25),
            proptest::option::of(1i64..25),
        )
            .prop_map(|(id, project_id, parent, dep)| task(id, project_id, parent, dep))
    }

    proptest! {
        #[test]
        fn prop_rebuild_is_byte_identical(tasks in proptest::collection::vec(arb_task(), 0..20)) {
            let projects = [project(1, "A"), project(2, "B")];
            let first = serde_json::to_string(&build_graph(&projects, &tasks).to_elements()).unwrap();
            let second = serde_json::to_string(&build_graph(&projects, &tasks).to_elements()).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_every_task_has_one_belongs_to(tasks in proptest::collection::vec(arb_task(), 0..20)) {
            let graph = build_graph(&[project(1, "A")], &tasks);
            for node in graph.nodes.iter().filter(|n| n.as_task().is_some()) {
                let count = graph
                    .edges_of(EdgeKind::BelongsTo)
                    .filter(|e| e.source == node.id)
                    .count();
                prop_assert_eq!(count, 1);
            }
        }

        #[test]
        fn prop_dangling_matches_missing_nodes(tasks in proptest::collection::vec(arb_task(), 0..20)) {
            let graph = build_graph(&[project(1, "A"), project(2, "B")], &tasks);
            for edge in &graph.edges {
                prop_assert_eq!(edge.dangling, graph.node(&edge.target).is_none());
            }
        }
    }
}
