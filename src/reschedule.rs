//! Optimistic due-date changes for calendar items.
//!
//! A reschedule moves the item on the [`CalendarBoard`] at once, then writes
//! the full task record back with only `due_date` replaced. If the write
//! fails the item returns to its previous date and the board gets an error
//! notice.

use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::display::truncate;
use crate::error::{Result, StoreError};
use crate::models::{format_date, CalendarTask, Task, TaskStatus};
use crate::refresh::RefreshHandle;
use crate::store::{DateRange, EntityStore};

/// How long a confirmed item keeps its success cue.
pub const SUCCESS_CUE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleState {
    Pending,
    Confirmed,
    Reverted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarItem {
    pub task_id: i64,
    pub title: String,
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    pub date: NaiveDate,
    cue_until: Option<Instant>,
}

impl CalendarItem {
    pub fn has_cue(&self, now: Instant) -> bool {
        self.cue_until.is_some_and(|until| now < until)
    }
}

impl From<CalendarTask> for CalendarItem {
    fn from(task: CalendarTask) -> Self {
        CalendarItem {
            task_id: task.id,
            title: task.title,
            assigned_to: task.assigned_to,
            status: task.status,
            date: task.due_date,
            cue_until: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Calendar items keyed by task id, plus notices for the user.
#[derive(Debug, Default)]
pub struct CalendarBoard {
    items: BTreeMap<i64, CalendarItem>,
    notices: Vec<Notice>,
}

impl CalendarBoard {
    pub fn from_tasks(tasks: Vec<CalendarTask>) -> Self {
        CalendarBoard {
            items: tasks.into_iter().map(|t| (t.id, CalendarItem::from(t))).collect(),
            notices: Vec::new(),
        }
    }

    pub async fn load(store: &dyn EntityStore, range: Option<DateRange>) -> Result<Self> {
        Ok(Self::from_tasks(store.list_calendar_tasks(range).await?))
    }

    pub fn item(&self, task_id: i64) -> Option<&CalendarItem> {
        self.items.get(&task_id)
    }

    /// Items ordered by date, then task id.
    pub fn items(&self) -> Vec<&CalendarItem> {
        let mut items: Vec<_> = self.items.values().collect();
        items.sort_by_key(|i| (i.date, i.task_id));
        items
    }

    pub fn on_date(&self, date: NaiveDate) -> Vec<&CalendarItem> {
        self.items().into_iter().filter(|i| i.date == date).collect()
    }

    /// Moves an item and returns the date it had.
    fn move_item(&mut self, task_id: i64, date: NaiveDate) -> Option<NaiveDate> {
        let item = self.items.get_mut(&task_id)?;
        Some(std::mem::replace(&mut item.date, date))
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        self.notices.push(Notice { level, message });
    }

    /// Drops cues that have run out.
    pub fn expire_cues(&mut self, now: Instant) {
        for item in self.items.values_mut() {
            if !item.has_cue(now) {
                item.cue_until = None;
            }
        }
    }

    /// Agenda grouped by day.
    pub fn render(&self, now: Instant) -> String {
        let mut out = String::new();
        if self.items.is_empty() {
            out.push_str("No scheduled tasks.\n");
            return out;
        }

        let mut current: Option<NaiveDate> = None;
        for item in self.items() {
            if current != Some(item.date) {
                let _ = writeln!(out, "{}", format_date(item.date));
                current = Some(item.date);
            }
            let _ = write!(
                out,
                "  #{:<4} {:12} {}",
                item.task_id,
                format!("[{}]", item.status),
                truncate(&item.title, 40)
            );
            if let Some(who) = &item.assigned_to {
                let _ = write!(out, " @{}", who);
            }
            if item.has_cue(now) {
                out.push_str(" *");
            }
            out.push('\n');
        }
        out
    }
}

/// One drag-drop of a task onto a new date.
#[derive(Debug, Clone, PartialEq)]
pub struct RescheduleAction {
    pub task_id: i64,
    /// Date before the drop; `None` if the task was not on the board.
    pub from: Option<NaiveDate>,
    pub to: NaiveDate,
    pub state: RescheduleState,
}

pub struct Rescheduler {
    store: Arc<dyn EntityStore>,
    activity_refresh: Option<RefreshHandle>,
    cue: Duration,
}

impl Rescheduler {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            activity_refresh: None,
            cue: SUCCESS_CUE,
        }
    }

    /// Fired on every confirmed reschedule.
    pub fn with_activity_refresh(mut self, hook: RefreshHandle) -> Self {
        self.activity_refresh = Some(hook);
        self
    }

    /// Optimistic half: the item moves before the store is asked.
    pub fn begin(&self, board: &mut CalendarBoard, task_id: i64, to: NaiveDate) -> RescheduleAction {
        let from = board.move_item(task_id, to);
        info!(task_id, to = %format_date(to), "reschedule pending");
        RescheduleAction {
            task_id,
            from,
            to,
            state: RescheduleState::Pending,
        }
    }

    /// Fetches the current record and writes it back with the new due date.
    /// Borrows nothing from the board, so different tasks can be in flight
    /// together.
    pub async fn submit(&self, action: &RescheduleAction) -> Result<Task> {
        let mut task = self.store.get_task(action.task_id).await?;
        task.due_date = Some(action.to);
        self.store.update_task(&task).await?;
        Ok(task)
    }

    /// Settles a pending action on the board.
    pub fn finish(&self, board: &mut CalendarBoard, action: &mut RescheduleAction, result: Result<Task>) {
        match result {
            Ok(task) => {
                let today = Utc::now().date_naive();
                let status = task.status.derive(task.due_date, today);
                let item = board
                    .items
                    .entry(task.id)
                    .or_insert_with(|| CalendarItem {
                        task_id: task.id,
                        title: task.title.clone(),
                        assigned_to: task.assigned_to.clone(),
                        status: status.clone(),
                        date: action.to,
                        cue_until: None,
                    });
                item.status = status;
                item.cue_until = Some(Instant::now() + self.cue);
                board.notify(
                    NoticeLevel::Info,
                    format!("Moved \"{}\" to {}", task.title, format_date(action.to)),
                );

                if let Some(hook) = &self.activity_refresh {
                    hook.request();
                }
                action.state = RescheduleState::Confirmed;
                info!(task_id = action.task_id, "reschedule confirmed");
            }
            Err(e) => {
                match action.from {
                    Some(from) => {
                        board.move_item(action.task_id, from);
                    }
                    None => {
                        board.items.remove(&action.task_id);
                    }
                }
                let message = match &e {
                    StoreError::NotFound { .. } => format!("Task #{} no longer exists", action.task_id),
                    other => format!("Could not reschedule task #{}: {}", action.task_id, other),
                };
                board.notify(NoticeLevel::Error, message);
                action.state = RescheduleState::Reverted;
                warn!(task_id = action.task_id, kind = ?e.kind(), "reschedule reverted: {}", e);
            }
        }
    }

    pub async fn reschedule(&self, board: &mut CalendarBoard, task_id: i64, to: NaiveDate) -> RescheduleAction {
        let mut action = self.begin(board, task_id, to);
        let result = self.submit(&action).await;
        self.finish(board, &mut action, result);
        action
    }
}
