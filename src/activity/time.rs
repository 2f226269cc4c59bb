use chrono::{DateTime, Utc};

use crate::models::format_date;

/// Label relative to `now`: "just now", "5m ago", "3h ago", "2d ago", then
/// the calendar date once a week has passed. Future times read "just now".
pub fn relative_label(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - timestamp).num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }
    let minutes = secs / 60;
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{}d ago", days);
    }
    format_date(timestamp.date_naive())
}
