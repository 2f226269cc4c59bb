use serde::Serialize;
use std::collections::BTreeMap;

use super::{EdgeKind, Graph, NodeRecord};

/// Counts over a built graph, grouped the way the dashboard shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub projects: usize,
    pub projects_by_status: BTreeMap<String, usize>,
    pub tasks: usize,
    pub tasks_by_status: BTreeMap<String, usize>,
    pub tasks_by_priority: BTreeMap<u8, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
    pub edges: usize,
    pub dangling_edges: usize,
}

impl GraphStats {
    pub fn of(graph: &Graph) -> Self {
        let mut stats = GraphStats::default();

        for node in &graph.nodes {
            match &node.record {
                NodeRecord::Project(p) => {
                    stats.projects += 1;
                    *stats.projects_by_status.entry(p.status.clone()).or_default() += 1;
                }
                NodeRecord::Task(t) => {
                    stats.tasks += 1;
                    *stats
                        .tasks_by_status
                        .entry(t.status.as_str().to_string())
                        .or_default() += 1;
                    *stats.tasks_by_priority.entry(t.priority).or_default() += 1;
                }
            }
        }

        for kind in EdgeKind::ALL {
            stats.edges_by_kind.insert(kind.as_str().to_string(), 0);
        }
        for edge in &graph.edges {
            *stats
                .edges_by_kind
                .entry(edge.kind.as_str().to_string())
                .or_default() += 1;
            if edge.dangling {
                stats.dangling_edges += 1;
            }
        }
        stats.edges = graph.edges.len();

        stats
    }
}
