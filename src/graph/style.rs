use serde_json::{json, Map, Value};

use super::EdgeKind;
use crate::models::TaskStatus;

pub const DEFAULT_COLOR: &str = "#6b7280";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

impl LineStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            LineStyle::Solid => "solid",
            LineStyle::Dashed => "dashed",
            LineStyle::Dotted => "dotted",
        }
    }
}

/// Intended visual properties of an edge. Re-assertion passes force the
/// render target back to these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeStyle {
    pub color: &'static str,
    pub line_style: LineStyle,
    pub width: u8,
    pub arrow: bool,
}

impl EdgeStyle {
    /// Element data keys a renderer reads the edge visuals from.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("line_color".into(), json!(self.color));
        fields.insert("line_style".into(), json!(self.line_style.as_str()));
        fields.insert("width".into(), json!(self.width));
        fields.insert("arrow".into(), json!(self.arrow));
        fields
    }
}

impl EdgeKind {
    pub fn style(self) -> EdgeStyle {
        match self {
            EdgeKind::BelongsTo => EdgeStyle {
                color: "#94a3b8",
                line_style: LineStyle::Solid,
                width: 2,
                arrow: false,
            },
            EdgeKind::Subtask => EdgeStyle {
                color: "#8b5cf6",
                line_style: LineStyle::Dashed,
                width: 2,
                arrow: true,
            },
            EdgeKind::DependsOn => EdgeStyle {
                color: "#ef4444",
                line_style: LineStyle::Solid,
                width: 3,
                arrow: true,
            },
        }
    }
}

pub fn status_color(status: &TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "#3b82f6",
        TaskStatus::InProgress => "#f59e0b",
        TaskStatus::Done => "#10b981",
        TaskStatus::Overdue => "#dc2626",
        TaskStatus::Other(raw) if raw.eq_ignore_ascii_case("blocked") => "#ef4444",
        TaskStatus::Other(_) => DEFAULT_COLOR,
    }
}

/// 1 is the most urgent.
pub fn priority_color(priority: u8) -> &'static str {
    match priority {
        1 => "#e53e3e",
        2 => "#fb923c",
        3 => "#fbbf24",
        4 => "#60a5fa",
        5 => "#9ca3af",
        _ => DEFAULT_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_edge_kind_is_distinct() {
        let styles: Vec<_> = EdgeKind::ALL.iter().map(|k| k.style()).collect();
        assert_ne!(styles[0], styles[1]);
        assert_ne!(styles[1], styles[2]);
        assert_ne!(styles[0], styles[2]);
    }

    #[test]
    fn test_style_fields() {
        let fields = EdgeKind::Subtask.style().to_fields();
        assert_eq!(fields["line_color"], "#8b5cf6");
        assert_eq!(fields["line_style"], "dashed");
        assert_eq!(fields["arrow"], true);
    }

    #[test]
    fn test_priority_color_out_of_range() {
        assert_eq!(priority_color(1), "#e53e3e");
        assert_eq!(priority_color(0), DEFAULT_COLOR);
        assert_eq!(priority_color(9), DEFAULT_COLOR);
    }

    #[test]
    fn test_status_color() {
        assert_eq!(status_color(&TaskStatus::Done), "#10b981");
        assert_eq!(status_color(&TaskStatus::Overdue), "#dc2626");
        assert_eq!(status_color(&TaskStatus::Other("blocked".into())), "#ef4444");
        assert_eq!(status_color(&TaskStatus::Other("parked".into())), DEFAULT_COLOR);
    }
}
