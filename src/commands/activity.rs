use anyhow::{bail, Result};
use chrono::Utc;
use std::io::{self, Write};
use std::sync::Arc;

use teamgraph::activity::{
    ActivityConfig, ActivityFilter, ActivityLogEngine, ClearConfirmation, PollOutcome,
};
use teamgraph::store::EntityStore;

pub async fn run(
    store: Arc<dyn EntityStore>,
    filter: ActivityFilter,
    limit: usize,
    json: bool,
) -> Result<()> {
    let config = ActivityConfig {
        display_limit: limit,
        ..Default::default()
    };
    let mut engine = ActivityLogEngine::new(store, config);
    engine.set_filter(filter);

    if let PollOutcome::Failed(message) = engine.poll().await {
        bail!("Failed to load activity: {}", message);
    }

    let view = engine.view(Utc::now());
    if json {
        println!("{}", serde_json::to_string_pretty(&view.rows)?);
    } else {
        print!("{}", view.render());
    }
    Ok(())
}

pub async fn clear(store: Arc<dyn EntityStore>, force: bool) -> Result<()> {
    let confirmation = if force {
        ClearConfirmation::forced()
    } else {
        print!("Clear the entire activity log? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        match ClearConfirmation::from_answer(&input) {
            Some(c) => c,
            None => {
                println!("Cancelled.");
                return Ok(());
            }
        }
    };

    let mut engine = ActivityLogEngine::new(store, ActivityConfig::default());
    let deleted = engine.clear(confirmation).await?;
    println!("Cleared {} activity entries", deleted);
    Ok(())
}
