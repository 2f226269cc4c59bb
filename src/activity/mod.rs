//! Activity log engine: a polled cache of log entries with filtering, a
//! bounded newest-first view and relative time labels.

mod dedup;
mod engine;
mod filter;
mod time;

pub use dedup::{dedup_events, IntegrationEvent, IntegrationFeed};
pub use engine::{
    ActivityConfig, ActivityLogEngine, ActivityRow, ActivityView, ClearConfirmation, PollOutcome,
    DISPLAY_LIMIT, EMPTY_STATE,
};
pub use filter::{ActivityFilter, Selection};
pub use time::relative_label;
