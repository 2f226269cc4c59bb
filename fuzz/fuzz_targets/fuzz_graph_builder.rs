#![no_main]

//! Fuzz target for graph construction and rendering.
//!
//! Ids are drawn from a small range so parents, dependencies and projects
//! collide, dangle and form cycles often.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;

use teamgraph::graph::render::write_tree;
use teamgraph::graph::stats::GraphStats;
use teamgraph::graph::{build_graph, Graph};
use teamgraph::models::{Project, Task, TaskStatus};

#[derive(Arbitrary, Debug)]
struct ProjectInput {
    id: u8,
    name: String,
}

#[derive(Arbitrary, Debug)]
struct TaskInput {
    id: u8,
    project_id: u8,
    title: String,
    status: u8,
    priority: u8,
    parent: Option<u8>,
    depends_on: Option<u8>,
}

#[derive(Arbitrary, Debug)]
struct GraphInput {
    projects: Vec<ProjectInput>,
    tasks: Vec<TaskInput>,
}

fuzz_target!(|input: GraphInput| {
    let projects: Vec<Project> = input
        .projects
        .into_iter()
        .take(32)
        .map(|p| Project {
            id: i64::from(p.id % 16),
            name: p.name,
            description: None,
            start_date: None,
            end_date: None,
            status: "active".to_string(),
            extra: BTreeMap::new(),
        })
        .collect();

    let tasks: Vec<Task> = input
        .tasks
        .into_iter()
        .take(64)
        .map(|t| Task {
            id: i64::from(t.id % 32),
            project_id: i64::from(t.project_id % 16),
            title: t.title,
            description: None,
            assigned_to: None,
            status: TaskStatus::ALL[usize::from(t.status) % TaskStatus::ALL.len()].clone(),
            priority: t.priority.clamp(1, 5),
            due_date: None,
            parent_task_id: t.parent.map(|p| i64::from(p % 32)),
            depends_on_task_id: t.depends_on.map(|d| i64::from(d % 32)),
            extra: BTreeMap::new(),
        })
        .collect();

    let graph = build_graph(&projects, &tasks);

    // Every edge endpoint is a node unless the edge is marked dangling
    for edge in &graph.edges {
        assert!(graph.node(&edge.source).is_some());
        assert!(edge.dangling || graph.node(&edge.target).is_some());
    }
    assert_eq!(graph, build_graph(&projects, &tasks));

    let mut out = Vec::new();
    let _ = write_tree(&mut out, &graph);
    let _ = GraphStats::of(&graph);

    let reparsed = Graph::from_elements(&graph.to_elements());
    assert_eq!(reparsed.nodes.len(), graph.nodes.len());
});
