//! Render targets for the relationship graph.

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use super::{Edge, Graph, NodeRecord};
use crate::models::{Task, TaskStatus};

/// Receiver of render instructions from the sync controller.
///
/// Layout and presentation belong to the implementor; the controller only
/// decides when to render and what to hand over.
pub trait RenderTarget {
    /// First render of a full element set.
    fn initialize(&mut self, graph: &Graph) -> io::Result<()>;

    /// Swaps the rendered elements for a new set in place.
    fn replace_elements(&mut self, graph: &Graph) -> io::Result<()>;

    fn run_layout(&mut self) -> io::Result<()>;

    /// Forces each edge's visual properties back to its kind's style.
    fn apply_edge_styles(&mut self, edges: &[Edge]) -> io::Result<()>;

    /// User-visible stand-in shown when the graph cannot be loaded.
    fn show_placeholder(&mut self, message: &str) -> io::Result<()>;

    fn teardown(&mut self) -> io::Result<()>;
}

/// Prints the project/task hierarchy as an indented tree.
pub struct TerminalTarget<W: Write> {
    out: W,
}

impl<W: Write> TerminalTarget<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_graph(&mut self, graph: &Graph) -> io::Result<()> {
        write_tree(&mut self.out, graph)
    }
}

impl<W: Write> RenderTarget for TerminalTarget<W> {
    fn initialize(&mut self, graph: &Graph) -> io::Result<()> {
        self.print_graph(graph)
    }

    fn replace_elements(&mut self, graph: &Graph) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "--- graph updated ---")?;
        self.print_graph(graph)
    }

    fn run_layout(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn apply_edge_styles(&mut self, _edges: &[Edge]) -> io::Result<()> {
        // Printed lines carry no edge visuals to restore.
        Ok(())
    }

    fn show_placeholder(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "[graph unavailable] {}", message)?;
        self.out.flush()
    }

    fn teardown(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Streams the graph as newline-delimited JSON frames.
///
/// Each frame is an object with an `event` field. `initialize` and `replace`
/// carry the full Cytoscape element set, `edge_styles` carries the edge
/// properties a re-assertion forced back, `placeholder` carries the load
/// failure message.
pub struct JsonTarget<W: Write> {
    out: W,
    elements: Vec<Value>,
}

impl<W: Write> JsonTarget<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            elements: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Elements as last rendered, with edge styles as last asserted.
    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    fn emit(&mut self, frame: Value) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, &frame)?;
        writeln!(self.out)
    }

    fn emit_elements(&mut self, event: &str, graph: &Graph) -> io::Result<()> {
        self.elements = graph.to_elements();
        let frame = json!({ "event": event, "elements": self.elements });
        self.emit(frame)
    }
}

impl<W: Write> RenderTarget for JsonTarget<W> {
    fn initialize(&mut self, graph: &Graph) -> io::Result<()> {
        self.emit_elements("initialize", graph)?;
        self.out.flush()
    }

    fn replace_elements(&mut self, graph: &Graph) -> io::Result<()> {
        self.emit_elements("replace", graph)
    }

    fn run_layout(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn apply_edge_styles(&mut self, edges: &[Edge]) -> io::Result<()> {
        let styles: BTreeMap<&str, Map<String, Value>> = edges
            .iter()
            .map(|e| (e.id.as_str(), e.kind.style().to_fields()))
            .collect();

        for element in &mut self.elements {
            let Some(data) = element.get_mut("data").and_then(Value::as_object_mut) else {
                continue;
            };
            let Some(fields) = data.get("id").and_then(Value::as_str).and_then(|id| styles.get(id)) else {
                continue;
            };
            data.extend(fields.clone());
        }

        let restyled: Vec<Value> = styles
            .into_iter()
            .map(|(id, mut fields)| {
                fields.insert("id".into(), json!(id));
                Value::Object(fields)
            })
            .collect();
        self.emit(json!({ "event": "edge_styles", "edges": restyled }))?;
        self.out.flush()
    }

    fn show_placeholder(&mut self, message: &str) -> io::Result<()> {
        self.elements.clear();
        self.emit(json!({ "event": "placeholder", "message": message }))?;
        self.out.flush()
    }

    fn teardown(&mut self) -> io::Result<()> {
        self.elements.clear();
        self.out.flush()
    }
}

pub fn status_icon(status: &TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => " ",
        TaskStatus::InProgress => "~",
        TaskStatus::Done => "x",
        TaskStatus::Overdue => "!",
        TaskStatus::Other(_) => "-",
    }
}

fn write_task<W: Write>(out: &mut W, task: &Task, tasks: &BTreeMap<i64, &Task>, indent: usize) -> io::Result<()> {
    let prefix = "  ".repeat(indent);
    write!(
        out,
        "{}[{}] #{} P{} {}",
        prefix,
        status_icon(&task.status),
        task.id,
        task.priority,
        task.title
    )?;
    if let Some(blocker) = task.depends_on_task_id {
        let title = tasks.get(&blocker).map(|t| t.title.as_str()).unwrap_or(super::UNKNOWN_TASK);
        write!(out, " (blocked by #{} {})", blocker, title)?;
    }
    writeln!(out)
}

fn write_children<W: Write>(
    out: &mut W,
    parent_id: i64,
    children: &BTreeMap<i64, Vec<&Task>>,
    tasks: &BTreeMap<i64, &Task>,
    printed: &mut BTreeSet<i64>,
    indent: usize,
) -> io::Result<()> {
    for child in children.get(&parent_id).into_iter().flatten() {
        if !printed.insert(child.id) {
            continue;
        }
        write_task(out, child, tasks, indent)?;
        write_children(out, child.id, children, tasks, printed, indent + 1)?;
    }
    Ok(())
}

/// Writes projects with their task trees. Tasks whose parent is missing are
/// shown at the top of their project; tasks caught in a parent cycle are
/// listed after all projects.
pub fn write_tree<W: Write>(out: &mut W, graph: &Graph) -> io::Result<()> {
    let tasks: BTreeMap<i64, &Task> = graph
        .nodes
        .iter()
        .filter_map(|n| n.as_task())
        .map(|t| (t.id, t))
        .collect();

    if graph.nodes.is_empty() {
        writeln!(out, "No projects or tasks found.")?;
        return Ok(());
    }

    let mut children: BTreeMap<i64, Vec<&Task>> = BTreeMap::new();
    let mut roots: BTreeMap<i64, Vec<&Task>> = BTreeMap::new();
    for task in tasks.values() {
        match task.parent_task_id {
            Some(parent) if tasks.contains_key(&parent) => {
                children.entry(parent).or_default().push(task)
            }
            _ => roots.entry(task.project_id).or_default().push(task),
        }
    }

    let mut printed = BTreeSet::new();
    let mut known_projects = BTreeSet::new();
    for node in &graph.nodes {
        let NodeRecord::Project(project) = &node.record else {
            continue;
        };
        known_projects.insert(project.id);
        writeln!(out, "{} #{} [{}]", project.name, project.id, project.status)?;
        for root in roots.get(&project.id).into_iter().flatten() {
            printed.insert(root.id);
            write_task(out, root, &tasks, 1)?;
            write_children(out, root.id, &children, &tasks, &mut printed, 2)?;
        }
    }

    for (project_id, orphans) in roots.iter().filter(|(id, _)| !known_projects.contains(id)) {
        writeln!(out, "{} #{}", super::UNKNOWN_PROJECT, project_id)?;
        for root in orphans {
            printed.insert(root.id);
            write_task(out, root, &tasks, 1)?;
            write_children(out, root.id, &children, &tasks, &mut printed, 2)?;
        }
    }

    let cyclic: Vec<_> = tasks.values().filter(|t| !printed.contains(&t.id)).collect();
    if !cyclic.is_empty() {
        writeln!(out, "Cyclic subtasks:")?;
        for task in cyclic {
            write_task(out, task, &tasks, 1)?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Legend: [ ] todo, [~] in progress, [x] done, [!] overdue, [-] other")?;
    Ok(())
}
