use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::io::{self, Write};

use teamgraph::display::truncate;
use teamgraph::error::StoreError;
use teamgraph::models::{format_date, validate_priority, NewTask, Task};
use teamgraph::store::EntityStore;

pub struct TaskArgs<'a> {
    pub project: Option<i64>,
    pub parent: Option<i64>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub assignee: Option<&'a str>,
    pub priority: u8,
    pub due: Option<NaiveDate>,
    pub depends_on: Option<i64>,
}

pub async fn create(store: &dyn EntityStore, args: TaskArgs<'_>) -> Result<i64> {
    if !validate_priority(args.priority) {
        bail!(
            "Invalid priority '{}'. Must be between 1 and 5",
            args.priority
        );
    }

    let mut task = NewTask::new(args.project.unwrap_or_default(), args.title);
    task.description = args.description.map(str::to_string);
    task.assigned_to = args.assignee.map(str::to_string);
    task.priority = args.priority;
    task.due_date = args.due;
    task.depends_on_task_id = args.depends_on;

    let created = match (args.parent, args.project) {
        (Some(parent), _) => {
            let subtask = store.create_subtask(parent, &task).await?;
            if let Some(project) = args.project.filter(|p| *p != subtask.project_id) {
                println!(
                    "Note: subtask joins project #{} of its parent, not #{}",
                    subtask.project_id, project
                );
            }
            println!("Created subtask #{} under #{}", subtask.id, parent);
            subtask
        }
        (None, Some(_)) => {
            let created = store.create_task(&task).await?;
            println!("Created task #{}", created.id);
            created
        }
        (None, None) => bail!("A task needs --project or --parent"),
    };

    Ok(created.id)
}

pub async fn list(store: &dyn EntityStore, project: Option<i64>) -> Result<()> {
    let tasks: Vec<Task> = store
        .list_tasks()
        .await?
        .into_iter()
        .filter(|t| project.map_or(true, |p| t.project_id == p))
        .collect();

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    for task in tasks {
        let status_display = format!("[{}]", task.status);
        let due = task.due_date.map(format_date).unwrap_or_default();
        println!(
            "#{:<4} {:14} {:<40} P{} {:<10} {}",
            task.id,
            status_display,
            truncate(&task.title, 40),
            task.priority,
            due,
            task.assigned_to.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

pub async fn show(store: &dyn EntityStore, id: i64) -> Result<()> {
    let task = match store.get_task(id).await {
        Ok(t) => t,
        Err(StoreError::NotFound { .. }) => bail!("Task #{} not found", id),
        Err(e) => return Err(e.into()),
    };
    let tasks = store.list_tasks().await?;
    let projects = store.list_projects().await?;

    println!("Task #{}: {}", task.id, task.title);
    println!("Status: {}", task.status);
    println!("Priority: P{}", task.priority);
    match projects.iter().find(|p| p.id == task.project_id) {
        Some(project) => println!("Project: #{} {}", project.id, project.name),
        None => println!("Project: #{}", task.project_id),
    }
    if let Some(assignee) = &task.assigned_to {
        println!("Assigned to: {}", assignee);
    }
    if let Some(due) = task.due_date {
        println!("Due: {}", format_date(due));
    }
    if let Some(parent_id) = task.parent_task_id {
        println!("Parent: #{}", parent_id);
    }

    if let Some(desc) = &task.description {
        if !desc.is_empty() {
            println!("\nDescription:");
            for line in desc.lines() {
                println!("  {}", line);
            }
        }
    }

    let subtasks: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.parent_task_id == Some(id))
        .collect();
    if !subtasks.is_empty() {
        println!("\nSubtasks:");
        for sub in subtasks {
            println!("  #{} [{}] {}", sub.id, sub.status, sub.title);
        }
    }

    println!();
    match task.depends_on_task_id {
        Some(blocker) => {
            let title = tasks
                .iter()
                .find(|t| t.id == blocker)
                .map(|t| t.title.as_str())
                .unwrap_or("(missing)");
            println!("Blocked by: #{} {}", blocker, title);
        }
        None => println!("Blocked by: (none)"),
    }

    let blocking: Vec<String> = tasks
        .iter()
        .filter(|t| t.depends_on_task_id == Some(id))
        .map(|t| format!("#{}", t.id))
        .collect();
    if blocking.is_empty() {
        println!("Blocking: (none)");
    } else {
        println!("Blocking: {}", blocking.join(", "));
    }

    Ok(())
}

pub async fn delete(store: &dyn EntityStore, id: i64, force: bool) -> Result<()> {
    let task = match store.get_task(id).await {
        Ok(t) => t,
        Err(StoreError::NotFound { .. }) => bail!("Task #{} not found", id),
        Err(e) => return Err(e.into()),
    };

    if !force {
        print!("Delete task #{} \"{}\"? [y/N] ", id, task.title);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_task(id).await?;
    println!("Deleted task #{}", id);
    Ok(())
}
