use anyhow::{bail, Result};
use chrono::NaiveDate;
use tokio::time::Instant;

use teamgraph::reschedule::CalendarBoard;
use teamgraph::store::EntityStore;

pub async fn run(
    store: &dyn EntityStore,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let range = match (from, to) {
        (Some(from), Some(to)) if to < from => bail!("--to {} is before --from {}", to, from),
        (Some(from), Some(to)) => Some((from, to)),
        (None, None) => None,
        _ => bail!("--from and --to must be given together"),
    };

    let board = CalendarBoard::load(store, range).await?;
    print!("{}", board.render(Instant::now()));
    Ok(())
}
