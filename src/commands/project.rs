use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::io::{self, Write};

use teamgraph::display::truncate;
use teamgraph::models::{format_date, NewProject};
use teamgraph::store::EntityStore;

pub async fn create(
    store: &dyn EntityStore,
    name: &str,
    description: Option<&str>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<i64> {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            bail!("End date {} is before start date {}", end, start);
        }
    }

    let project = store
        .create_project(&NewProject {
            name: name.to_string(),
            description: description.map(str::to_string),
            start_date,
            end_date,
        })
        .await?;
    println!("Created project #{}", project.id);
    Ok(project.id)
}

pub async fn list(store: &dyn EntityStore) -> Result<()> {
    let projects = store.list_projects().await?;

    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    for project in projects {
        let span = match (project.start_date, project.end_date) {
            (Some(start), Some(end)) => format!("{} .. {}", format_date(start), format_date(end)),
            (Some(start), None) => format!("from {}", format_date(start)),
            (None, Some(end)) => format!("until {}", format_date(end)),
            (None, None) => String::new(),
        };
        println!(
            "#{:<4} {:10} {:<40} {}",
            project.id,
            format!("[{}]", project.status),
            truncate(&project.name, 40),
            span
        );
    }

    Ok(())
}

pub async fn delete(store: &dyn EntityStore, id: i64, force: bool) -> Result<()> {
    let projects = store.list_projects().await?;
    let project = match projects.into_iter().find(|p| p.id == id) {
        Some(p) => p,
        None => bail!("Project #{} not found", id),
    };

    if !force {
        print!(
            "Delete project #{} \"{}\" and all of its tasks? [y/N] ",
            id, project.name
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_project(id).await?;
    println!("Deleted project #{}", id);
    Ok(())
}
