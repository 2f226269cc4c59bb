use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::sync::Arc;

use teamgraph::models::format_date;
use teamgraph::reschedule::{CalendarBoard, NoticeLevel, RescheduleState, Rescheduler};
use teamgraph::store::EntityStore;

pub async fn run(store: Arc<dyn EntityStore>, task_id: i64, to: NaiveDate) -> Result<()> {
    let mut board = CalendarBoard::load(store.as_ref(), None).await?;
    let rescheduler = Rescheduler::new(store);
    let action = rescheduler.reschedule(&mut board, task_id, to).await;

    let mut error = None;
    for notice in board.take_notices() {
        match notice.level {
            NoticeLevel::Info => println!("{}", notice.message),
            NoticeLevel::Error => error = Some(notice.message),
        }
    }

    match action.state {
        RescheduleState::Confirmed => {
            if let Some(from) = action.from {
                println!("Task #{}: {} -> {}", task_id, format_date(from), format_date(to));
            }
            Ok(())
        }
        _ => bail!(
            "{}",
            error.unwrap_or_else(|| format!("Failed to reschedule task #{}", task_id))
        ),
    }
}
