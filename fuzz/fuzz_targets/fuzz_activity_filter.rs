#![no_main]

//! Fuzz target for activity filtering, relative time labels and event
//! de-duplication.

use arbitrary::Arbitrary;
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

use teamgraph::activity::{dedup_events, relative_label, ActivityFilter, IntegrationEvent, Selection};
use teamgraph::models::{ActionType, ActivityEntry, ObjectType};

#[derive(Arbitrary, Debug)]
struct EntryInput {
    action: u8,
    object: u8,
    object_id: i64,
    seconds: u32,
    description: Option<String>,
    project_name: Option<String>,
}

#[derive(Arbitrary, Debug)]
struct FilterInput {
    entries: Vec<EntryInput>,
    object: Option<u8>,
    action: Option<u8>,
    search: String,
    now_offset: u32,
    events: Vec<(String, String, Vec<String>)>,
}

fuzz_target!(|input: FilterInput| {
    let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let entries: Vec<ActivityEntry> = input
        .entries
        .into_iter()
        .take(128)
        .enumerate()
        .map(|(i, e)| ActivityEntry {
            id: i as i64,
            action_type: ActionType::ALL[usize::from(e.action) % ActionType::ALL.len()],
            object_type: ObjectType::ALL[usize::from(e.object) % ObjectType::ALL.len()],
            object_id: e.object_id,
            timestamp: base + chrono::Duration::seconds(i64::from(e.seconds)),
            user_id: None,
            description: e.description,
            status: None,
            priority: None,
            project_name: e.project_name,
            user_name: None,
        })
        .collect();

    let filter = ActivityFilter {
        object_type: input
            .object
            .map(|o| Selection::Only(ObjectType::ALL[usize::from(o) % ObjectType::ALL.len()]))
            .unwrap_or_default(),
        action_type: input
            .action
            .map(|a| Selection::Only(ActionType::ALL[usize::from(a) % ActionType::ALL.len()]))
            .unwrap_or_default(),
        search: input.search,
    };

    let matched = filter.apply(&entries);
    assert!(matched.len() <= entries.len());
    for entry in &matched {
        assert!(filter.matches(entry));
    }

    let now = base + chrono::Duration::seconds(i64::from(input.now_offset));
    for entry in &entries {
        let _ = relative_label(entry.timestamp, now);
    }

    let events: Vec<IntegrationEvent> = input
        .events
        .into_iter()
        .take(64)
        .map(|(kind, user, changes)| IntegrationEvent {
            kind,
            user,
            changes: changes.into_iter().map(Value::String).collect(),
        })
        .collect();
    let unique = dedup_events(events.clone());
    assert!(unique.len() <= events.len());
    assert_eq!(dedup_events(unique.clone()), unique);
});
