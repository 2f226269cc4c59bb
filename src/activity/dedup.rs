use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::display::truncate;

/// Read-only upstream event shown in the external-integration view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    pub kind: String,
    pub user: String,
    #[serde(default)]
    pub changes: Vec<Value>,
}

impl IntegrationEvent {
    fn key(&self) -> (String, String, String) {
        let mut changes = String::new();
        for change in &self.changes {
            write_canonical(change, &mut changes);
            changes.push(';');
        }
        (self.kind.clone(), self.user.clone(), changes)
    }
}

/// Serializes with object keys sorted, whatever order the map keeps them in.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            out.push('{');
            for key in keys {
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
                out.push(',');
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for item in items {
                write_canonical(item, out);
                out.push(',');
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Drops events whose (kind, user, change list) repeats an earlier one.
pub fn dedup_events(events: Vec<IntegrationEvent>) -> Vec<IntegrationEvent> {
    let mut seen = HashSet::new();
    events.into_iter().filter(|e| seen.insert(e.key())).collect()
}

/// Read-only listing of upstream events with repeats hidden.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrationFeed {
    pub events: Vec<IntegrationEvent>,
    /// Events dropped as repeats.
    pub hidden: usize,
}

impl IntegrationFeed {
    pub fn new(events: Vec<IntegrationEvent>) -> Self {
        let total = events.len();
        let events = dedup_events(events);
        let hidden = total - events.len();
        Self { events, hidden }
    }

    /// Parses a JSON array of events. Entries that are not events are
    /// skipped with a warning.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let values: Vec<Value> = serde_json::from_str(raw)?;
        let events = values
            .into_iter()
            .filter_map(|v| match serde_json::from_value(v) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("skipping malformed integration event: {}", e);
                    None
                }
            })
            .collect();
        Ok(Self::new(events))
    }

    pub fn render(&self) -> String {
        if self.events.is_empty() {
            return "No integration events.\n".to_string();
        }
        let mut out = String::new();
        for event in &self.events {
            let noun = if event.changes.len() == 1 { "change" } else { "changes" };
            out.push_str(&format!(
                "{:<20} {:<16} {} {}\n",
                truncate(&event.kind, 20),
                truncate(&event.user, 16),
                event.changes.len(),
                noun
            ));
        }
        if self.hidden > 0 {
            out.push_str(&format!("({} repeated events hidden)\n", self.hidden));
        }
        out
    }
}
