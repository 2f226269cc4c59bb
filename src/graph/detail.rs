//! Lookup of a single node with the counts a tooltip shows.

use serde_json::{json, Value};

use super::{project_node_id, task_node_id, Graph, NodeKind, NodeRecord, UNKNOWN_PROJECT};
use crate::models::{format_date, Project, Task};

/// Splits `project-<id>` or `task-<id>` into its kind and entity id.
pub fn parse_node_id(node_id: &str) -> Option<(NodeKind, i64)> {
    let (kind, id) = node_id.trim().split_once('-')?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let kind = match kind {
        "project" => NodeKind::Project,
        "task" => NodeKind::Task,
        _ => return None,
    };
    Some((kind, id.parse().ok()?))
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeDetail {
    Project {
        project: Project,
        task_count: usize,
    },
    Task {
        task: Task,
        /// `None` when the task's project is not in the graph.
        project_name: Option<String>,
        subtask_count: usize,
    },
}

impl NodeDetail {
    pub fn node_id(&self) -> String {
        match self {
            NodeDetail::Project { project, .. } => project_node_id(project.id),
            NodeDetail::Task { task, .. } => task_node_id(task.id),
        }
    }

    /// The record's fields plus `type` and the counts.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        let (mut value, extra) = match self {
            NodeDetail::Project { project, task_count } => (
                serde_json::to_value(project)?,
                json!({ "type": "project", "task_count": task_count }),
            ),
            NodeDetail::Task {
                task,
                project_name,
                subtask_count,
            } => (
                serde_json::to_value(task)?,
                json!({
                    "type": "task",
                    "project_name": project_name,
                    "subtask_count": subtask_count,
                }),
            ),
        };
        if let (Value::Object(fields), Value::Object(extra)) = (&mut value, extra) {
            fields.extend(extra);
        }
        Ok(value)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        match self {
            NodeDetail::Project { project, task_count } => {
                out.push_str(&format!("Project #{}: {}\n", project.id, project.name));
                out.push_str(&format!("Status: {}\n", project.status));
                if let Some(start) = project.start_date {
                    out.push_str(&format!("Start: {}\n", format_date(start)));
                }
                if let Some(end) = project.end_date {
                    out.push_str(&format!("End: {}\n", format_date(end)));
                }
                out.push_str(&format!("Tasks: {}\n", task_count));
            }
            NodeDetail::Task {
                task,
                project_name,
                subtask_count,
            } => {
                out.push_str(&format!("Task #{}: {}\n", task.id, task.title));
                out.push_str(&format!("Status: {}\n", task.status));
                out.push_str(&format!("Priority: P{}\n", task.priority));
                out.push_str(&format!(
                    "Project: #{} {}\n",
                    task.project_id,
                    project_name.as_deref().unwrap_or(UNKNOWN_PROJECT)
                ));
                if let Some(assignee) = &task.assigned_to {
                    out.push_str(&format!("Assigned to: {}\n", assignee));
                }
                if let Some(due) = task.due_date {
                    out.push_str(&format!("Due: {}\n", format_date(due)));
                }
                out.push_str(&format!("Subtasks: {}\n", subtask_count));
            }
        }
        out
    }
}

impl Graph {
    /// Detail for `project-<id>` or `task-<id>`; `None` when no such node exists.
    pub fn node_detail(&self, node_id: &str) -> Option<NodeDetail> {
        let node = self.node(node_id.trim())?;
        let tasks = || self.nodes.iter().filter_map(|n| n.as_task());

        let detail = match &node.record {
            NodeRecord::Project(project) => NodeDetail::Project {
                project: project.clone(),
                task_count: tasks().filter(|t| t.project_id == project.id).count(),
            },
            NodeRecord::Task(task) => NodeDetail::Task {
                task: task.clone(),
                project_name: self.nodes.iter().find_map(|n| match &n.record {
                    NodeRecord::Project(p) if p.id == task.project_id => Some(p.name.clone()),
                    _ => None,
                }),
                subtask_count: tasks().filter(|t| t.parent_task_id == Some(task.id)).count(),
            },
        };
        Some(detail)
    }
}
