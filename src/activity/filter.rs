use std::fmt;
use std::str::FromStr;

use crate::models::{ActionType, ActivityEntry, ObjectType};

/// `all`, or exactly one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<T> {
    All,
    Only(T),
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

impl<T: PartialEq> Selection<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == value,
        }
    }
}

impl<T: FromStr> FromStr for Selection<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Selection::All);
        }
        s.parse().map(Selection::Only)
    }
}

impl<T: fmt::Display> fmt::Display for Selection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::Only(value) => value.fmt(f),
        }
    }
}

/// Three conjunctive filters over activity entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub object_type: Selection<ObjectType>,
    pub action_type: Selection<ActionType>,
    /// Case-insensitive substring; blank matches everything.
    pub search: String,
}

impl ActivityFilter {
    pub fn matches(&self, entry: &ActivityEntry) -> bool {
        self.object_type.matches(&entry.object_type)
            && self.action_type.matches(&entry.action_type)
            && self.search_matches(entry)
    }

    fn search_matches(&self, entry: &ActivityEntry) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let haystacks = [
            entry.object_type.as_str().to_string(),
            entry.object_type.label().to_lowercase(),
            entry.action_type.as_str().to_string(),
            entry.description.as_deref().unwrap_or_default().to_lowercase(),
            entry.object_id.to_string(),
        ];
        haystacks.iter().any(|h| h.contains(&needle))
    }

    /// Matching entries, in input order.
    pub fn apply<'a>(&self, entries: &'a [ActivityEntry]) -> Vec<&'a ActivityEntry> {
        entries.iter().filter(|e| self.matches(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn entry(id: i64, action: ActionType, object: ObjectType, description: Option<&str>) -> ActivityEntry {
        ActivityEntry {
            id,
            action_type: action,
            object_type: object,
            object_id: id * 10,
            timestamp: Utc.with_ymd_and_hms(2025, 10, 28, 3, 0, 0).unwrap(),
            user_id: Some(1),
            description: description.map(str::to_string),
            status: None,
            priority: None,
            project_name: None,
            user_name: None,
        }
    }

    fn sample() -> Vec<ActivityEntry> {
        vec![
            entry(1, ActionType::Created, ObjectType::Project, Some("Website Redesign")),
            entry(2, ActionType::Updated, ObjectType::Task, Some("Write copy")),
            entry(3, ActionType::Deleted, ObjectType::Task, None),
            entry(4, ActionType::Created, ObjectType::Chat, Some("hello team")),
        ]
    }

    #[test]
    fn test_default_matches_everything() {
        let entries = sample();
        assert_eq!(ActivityFilter::default().apply(&entries).len(), 4);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let entries = sample();
        let filter = ActivityFilter {
            object_type: Selection::Only(ObjectType::Task),
            action_type: Selection::Only(ActionType::Updated),
            search: String::new(),
        };
        let ids: Vec<_> = filter.apply(&entries).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_search_fields() {
        let entries = sample();
        let search = |s: &str| {
            let filter = ActivityFilter {
                search: s.to_string(),
                ..Default::default()
            };
            filter.apply(&entries).iter().map(|e| e.id).collect::<Vec<_>>()
        };

        assert_eq!(search("REDESIGN"), vec![1]);
        assert_eq!(search("deleted"), vec![3]);
        assert_eq!(search("30"), vec![3]);
        assert_eq!(search("chat message"), vec![4]);
        assert_eq!(search("task"), vec![2, 3]);
        assert_eq!(search("   "), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!("all".parse::<Selection<ObjectType>>().unwrap(), Selection::All);
        assert_eq!(
            "task".parse::<Selection<ObjectType>>().unwrap(),
            Selection::Only(ObjectType::Task)
        );
        assert!("folder".parse::<Selection<ObjectType>>().is_err());
        assert_eq!(Selection::Only(ActionType::Created).to_string(), "created");
    }

    proptest! {
        #[test]
        fn prop_filter_is_idempotent(search in "[a-z0-9 ]{0,6}", obj in 0usize..5, act in 0usize..3) {
            let entries = sample();
            let filter = ActivityFilter {
                object_type: Selection::Only(ObjectType::ALL[obj]),
                action_type: Selection::Only(ActionType::ALL[act]),
                search,
            };
            let once: Vec<ActivityEntry> = filter.apply(&entries).into_iter().cloned().collect();
            let twice: Vec<ActivityEntry> = filter.apply(&once).into_iter().cloned().collect();
            prop_assert_eq!(once, twice);
        }
    }
}
