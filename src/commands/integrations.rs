use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use teamgraph::activity::IntegrationFeed;

fn read_source(source: &Path) -> Result<String> {
    if source == Path::new("-") {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    fs::read_to_string(source).with_context(|| format!("Failed to read {}", source.display()))
}

/// Lists upstream integration events from a JSON file, or stdin for `-`.
pub fn run(source: &Path, json: bool) -> Result<()> {
    let raw = read_source(source)?;
    let feed = IntegrationFeed::from_json(&raw).context("Expected a JSON array of events")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&feed.events)?);
    } else {
        print!("{}", feed.render());
    }
    Ok(())
}
