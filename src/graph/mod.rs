//! The project/task relationship graph.
//!
//! A [`Graph`] is derived from flat project and task rows by
//! [`build_graph`] and is never persisted. Node ids are `project-<id>` and
//! `task-<id>`; edges point from a task towards the thing it relates to
//! (its project, its parent, or the task blocking it).

mod builder;
pub mod detail;
pub mod render;
pub mod stats;
pub mod style;
pub mod sync;

pub use builder::build_graph;
pub use detail::{parse_node_id, NodeDetail};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::models::{format_date, Project, Task};
use style::{priority_color, status_color};

pub const UNKNOWN_PROJECT: &str = "Unknown Project";
pub const UNKNOWN_TASK: &str = "Unknown Task";

pub fn project_node_id(id: i64) -> String {
    format!("project-{}", id)
}

pub fn task_node_id(id: i64) -> String {
    format!("task-{}", id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Project,
    Task,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Project => "project",
            NodeKind::Task => "task",
        }
    }
}

/// The row a node was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeRecord {
    Project(Project),
    Task(Task),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub record: NodeRecord,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self.record {
            NodeRecord::Project(_) => NodeKind::Project,
            NodeRecord::Task(_) => NodeKind::Task,
        }
    }

    pub fn entity_id(&self) -> i64 {
        match &self.record {
            NodeRecord::Project(p) => p.id,
            NodeRecord::Task(t) => t.id,
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match &self.record {
            NodeRecord::Task(t) => Some(t),
            NodeRecord::Project(_) => None,
        }
    }
}

/// Declaration order is the per-task edge emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    BelongsTo,
    Subtask,
    DependsOn,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 3] = [EdgeKind::BelongsTo, EdgeKind::Subtask, EdgeKind::DependsOn];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::BelongsTo => "belongs_to",
            EdgeKind::Subtask => "subtask",
            EdgeKind::DependsOn => "depends_on",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EdgeKind::BelongsTo => "belongs to",
            EdgeKind::Subtask => "subtask of",
            EdgeKind::DependsOn => "blocked by",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        EdgeKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub id: String,
    pub kind: EdgeKind,
    pub source: String,
    pub target: String,
    /// Label of the target node, or a placeholder when it is missing.
    pub target_label: String,
    /// The target id is not present among the graph's nodes.
    pub dangling: bool,
}

impl Edge {
    pub fn new(kind: EdgeKind, source: String, target: String, target_label: Option<&str>) -> Self {
        let dangling = target_label.is_none();
        let placeholder = match kind {
            EdgeKind::BelongsTo => UNKNOWN_PROJECT,
            EdgeKind::Subtask | EdgeKind::DependsOn => UNKNOWN_TASK,
        };
        Edge {
            id: format!("edge-{}-{}-{}", kind.as_str(), source, target),
            kind,
            target_label: target_label.unwrap_or(placeholder).to_string(),
            source,
            target,
            dangling,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Cytoscape-style `{data: {...}}` elements, nodes first.
    pub fn to_elements(&self) -> Vec<Value> {
        self.nodes
            .iter()
            .map(node_element)
            .chain(self.edges.iter().map(edge_element))
            .collect()
    }
}

fn node_element(node: &Node) -> Value {
    let mut data = Map::new();
    data.insert("id".into(), json!(node.id));
    data.insert("label".into(), json!(node.label));
    data.insert("type".into(), json!(node.kind().as_str()));

    match &node.record {
        NodeRecord::Project(p) => {
            data.insert("description".into(), json!(p.description));
            data.insert("start_date".into(), json!(p.start_date.map(format_date)));
            data.insert("end_date".into(), json!(p.end_date.map(format_date)));
            data.insert("status".into(), json!(p.status));
        }
        NodeRecord::Task(t) => {
            data.insert("status".into(), json!(t.status.as_str()));
            data.insert("color".into(), json!(status_color(&t.status)));
            data.insert("priority".into(), json!(t.priority));
            data.insert("priority_color".into(), json!(priority_color(t.priority)));
            data.insert("description".into(), json!(t.description));
            data.insert("assigned_to".into(), json!(t.assigned_to));
            data.insert("due_date".into(), json!(t.due_date.map(format_date)));
            data.insert("project_id".into(), json!(t.project_id));
            data.insert("parent_task_id".into(), json!(t.parent_task_id));
            data.insert("depends_on_task_id".into(), json!(t.depends_on_task_id));
        }
    }

    json!({ "data": data })
}

fn edge_element(edge: &Edge) -> Value {
    let mut data = Map::new();
    data.insert("id".into(), json!(edge.id));
    data.insert("source".into(), json!(edge.source));
    data.insert("target".into(), json!(edge.target));
    data.insert("type".into(), json!(edge.kind.as_str()));
    data.insert("label".into(), json!(edge.kind.label()));
    data.insert("target_label".into(), json!(edge.target_label));
    data.insert("dangling".into(), json!(edge.dangling));
    data.extend(edge.kind.style().to_fields());
    json!({ "data": data })
}
