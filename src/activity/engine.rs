use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::filter::ActivityFilter;
use super::time::relative_label;
use crate::display::truncate;
use crate::error::Result;
use crate::models::ActivityEntry;
use crate::refresh::{RefreshHandle, RequestSequencer, Ticket};
use crate::store::EntityStore;

pub const DISPLAY_LIMIT: usize = 20;
pub const EMPTY_STATE: &str = "No activity yet.";

#[derive(Debug, Clone)]
pub struct ActivityConfig {
    pub poll_interval: Duration,
    pub display_limit: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            display_limit: DISPLAY_LIMIT,
        }
    }
}

/// Proof that the user agreed to wipe the log.
#[derive(Debug)]
pub struct ClearConfirmation(());

impl ClearConfirmation {
    /// For callers that confirmed out of band, e.g. with `--force`.
    pub fn forced() -> Self {
        ClearConfirmation(())
    }

    /// Accepts `y` or `yes`, in any case.
    pub fn from_answer(answer: &str) -> Option<Self> {
        let answer = answer.trim();
        (answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
            .then_some(ClearConfirmation(()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRow {
    pub id: i64,
    pub icon: &'static str,
    pub action: &'static str,
    pub object: &'static str,
    pub object_id: i64,
    pub description: Option<String>,
    pub project_name: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i64>,
    pub user_name: Option<String>,
    pub when: String,
}

impl ActivityRow {
    fn from_entry(entry: &ActivityEntry, now: DateTime<Utc>) -> Self {
        ActivityRow {
            id: entry.id,
            icon: entry.action_type.icon(),
            action: entry.action_type.as_str(),
            object: entry.object_type.label(),
            object_id: entry.object_id,
            description: entry.description.clone().filter(|d| !d.trim().is_empty()),
            project_name: entry.project_name.clone().filter(|p| !p.trim().is_empty()),
            status: entry.status.clone().filter(|s| !s.trim().is_empty()),
            priority: entry.priority,
            user_name: entry.user_name.clone(),
            when: relative_label(entry.timestamp, now),
        }
    }
}

/// What the activity panel shows right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityView {
    pub rows: Vec<ActivityRow>,
    /// Entries in the cache that passed the filter, before the display cut.
    pub matched: usize,
    pub total: usize,
    /// Set while the last poll failed; the rows are the last good cache.
    pub banner: Option<String>,
}

impl ActivityView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(banner) = &self.banner {
            let _ = writeln!(out, "! {}", banner);
        }
        if self.rows.is_empty() {
            let message = if self.total == 0 {
                EMPTY_STATE
            } else {
                "No activity matches the current filters."
            };
            let _ = writeln!(out, "{}", message);
            return out;
        }

        for row in &self.rows {
            let _ = write!(
                out,
                "{:>10}  [{}] {} #{} {}",
                row.when, row.icon, row.object, row.object_id, row.action
            );
            if let Some(description) = &row.description {
                let _ = write!(out, " - {}", truncate(description, 50));
            }
            if let Some(project) = &row.project_name {
                let _ = write!(out, " ({})", project);
            }
            out.push('\n');
        }
        if self.matched > self.rows.len() {
            let _ = writeln!(out, "... {} older entries not shown", self.matched - self.rows.len());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Cache replaced with this many entries.
    Replaced(usize),
    /// Cache kept; banner set.
    Failed(String),
    Stale,
}

type Dispatched = (Ticket, Result<Vec<ActivityEntry>>);

/// Client-side cache of the activity log. The poll handler is the only
/// writer of the cache.
pub struct ActivityLogEngine {
    store: Arc<dyn EntityStore>,
    config: ActivityConfig,
    filter: ActivityFilter,
    cache: Vec<ActivityEntry>,
    banner: Option<String>,
    sequencer: RequestSequencer,
    refresh: RefreshHandle,
}

impl ActivityLogEngine {
    pub fn new(store: Arc<dyn EntityStore>, config: ActivityConfig) -> Self {
        Self {
            store,
            config,
            filter: ActivityFilter::default(),
            cache: Vec::new(),
            banner: None,
            sequencer: RequestSequencer::new(),
            refresh: RefreshHandle::new(),
        }
    }

    /// Hook other components fire to force an immediate poll.
    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    pub fn filter(&self) -> &ActivityFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: ActivityFilter) {
        self.filter = filter;
    }

    /// Cached entries, newest first.
    pub fn entries(&self) -> &[ActivityEntry] {
        &self.cache
    }

    pub fn dispatch(&self) -> impl Future<Output = Dispatched> + Send + 'static {
        let ticket = self.sequencer.begin();
        let store = Arc::clone(&self.store);
        async move { (ticket, store.list_activity().await) }
    }

    /// Replaces the cache with a poll result unless a newer poll has already
    /// been applied or a clear was issued after it was dispatched.
    pub fn apply(&mut self, ticket: Ticket, result: Result<Vec<ActivityEntry>>) -> PollOutcome {
        if !self.sequencer.accept(ticket) {
            debug!("discarding stale activity response");
            return PollOutcome::Stale;
        }

        match result {
            Ok(mut entries) => {
                entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
                let count = entries.len();
                if count != self.cache.len() {
                    debug!(count, "activity cache replaced");
                }
                self.cache = entries;
                self.banner = None;
                PollOutcome::Replaced(count)
            }
            Err(e) => {
                warn!(kind = ?e.kind(), "activity poll failed: {}", e);
                let message = format!("Unable to load activity: {}", e);
                self.banner = Some(message.clone());
                PollOutcome::Failed(message)
            }
        }
    }

    pub async fn poll(&mut self) -> PollOutcome {
        let (ticket, result) = self.dispatch().await;
        self.apply(ticket, result)
    }

    pub fn view(&self, now: DateTime<Utc>) -> ActivityView {
        let matched = self.filter.apply(&self.cache);
        ActivityView {
            rows: matched
                .iter()
                .take(self.config.display_limit)
                .map(|e| ActivityRow::from_entry(e, now))
                .collect(),
            matched: matched.len(),
            total: self.cache.len(),
            banner: self.banner.clone(),
        }
    }

    /// Truncates the log on the store and empties the cache. Any poll
    /// dispatched before this call is discarded when it lands.
    pub async fn clear(&mut self, _confirmation: ClearConfirmation) -> Result<u64> {
        self.sequencer.invalidate();
        match self.store.clear_activity().await {
            Ok(deleted) => {
                info!(deleted, "activity log cleared");
                self.cache.clear();
                self.banner = None;
                Ok(deleted)
            }
            Err(e) => {
                warn!("failed to clear activity log: {}", e);
                self.banner = Some(format!("Unable to clear activity: {}", e));
                Err(e)
            }
        }
    }

    /// Polls on the configured interval and on every refresh request until
    /// `shutdown` flips to true. `on_change` receives each applied view.
    pub async fn run<F>(&mut self, mut shutdown: watch::Receiver<bool>, mut on_change: F)
    where
        F: FnMut(&ActivityView),
    {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: JoinSet<Dispatched> = JoinSet::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    in_flight.spawn(self.dispatch());
                }
                _ = self.refresh.notified() => {
                    in_flight.spawn(self.dispatch());
                }
                Some(joined) = in_flight.join_next() => match joined {
                    Ok((ticket, result)) => {
                        if self.apply(ticket, result) != PollOutcome::Stale {
                            on_change(&self.view(Utc::now()));
                        }
                    }
                    Err(e) => warn!("activity poll task failed: {}", e),
                },
            }
        }

        in_flight.abort_all();
    }

    pub fn teardown(&mut self) {
        self.cache.clear();
        self.banner = None;
        self.sequencer.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Selection;
    use crate::models::{ActionType, NewProject, NewTask, ObjectType};
    use crate::test_support::{setup_store, FlakyStore};
    use chrono::TimeZone;

    async fn seed(store: &Arc<dyn EntityStore>, tasks: usize) {
        let project = store
            .create_project(&NewProject {
                name: "Launch".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        for i in 0..tasks {
            store
                .create_task(&NewTask::new(project.id, format!("Task {}", i)))
                .await
                .unwrap();
        }
    }

    fn entry(id: i64, secs: i64) -> ActivityEntry {
        ActivityEntry {
            id,
            action_type: ActionType::Created,
            object_type: ObjectType::Task,
            object_id: id,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            user_id: None,
            description: None,
            status: None,
            priority: None,
            project_name: None,
            user_name: None,
        }
    }

    #[test]
    fn test_confirmation_answers() {
        assert!(ClearConfirmation::from_answer("y").is_some());
        assert!(ClearConfirmation::from_answer(" YES\n").is_some());
        assert!(ClearConfirmation::from_answer("").is_none());
        assert!(ClearConfirmation::from_answer("no").is_none());
    }

    #[tokio::test]
    async fn test_poll_normalizes_to_newest_first() {
        let (store, _dir) = setup_store();
        let mut engine = ActivityLogEngine::new(store, ActivityConfig::default());

        let ticket = engine.sequencer.begin();
        let outcome = engine.apply(ticket, Ok(vec![entry(1, 0), entry(3, 20), entry(2, 10)]));
        assert_eq!(outcome, PollOutcome::Replaced(3));
        let ids: Vec<_> = engine.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_view_limited_to_display_window() {
        let (store, _dir) = setup_store();
        seed(&store, 30).await;
        let mut engine = ActivityLogEngine::new(store, ActivityConfig::default());

        assert_eq!(engine.poll().await, PollOutcome::Replaced(31));
        let view = engine.view(Utc::now());
        assert_eq!(view.rows.len(), DISPLAY_LIMIT);
        assert_eq!(view.matched, 31);
        assert!(view.render().contains("11 older entries not shown"));
    }

    #[tokio::test]
    async fn test_filter_applies_to_view() {
        let (store, _dir) = setup_store();
        seed(&store, 2).await;
        let mut engine = ActivityLogEngine::new(store, ActivityConfig::default());
        engine.poll().await;

        engine.set_filter(ActivityFilter {
            object_type: Selection::Only(ObjectType::Project),
            ..Default::default()
        });
        let view = engine.view(Utc::now());
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].object, "Project");
        assert_eq!(view.rows[0].when, "just now");
    }

    #[tokio::test]
    async fn test_clear_then_poll_shows_empty_state() {
        let (store, _dir) = setup_store();
        seed(&store, 3).await;
        let mut engine = ActivityLogEngine::new(store, ActivityConfig::default());
        engine.poll().await;

        assert_eq!(engine.clear(ClearConfirmation::forced()).await.unwrap(), 4);
        assert_eq!(engine.poll().await, PollOutcome::Replaced(0));
        let view = engine.view(Utc::now());
        assert!(view.is_empty());
        assert_eq!(view.render(), format!("{}\n", EMPTY_STATE));
    }

    #[tokio::test]
    async fn test_poll_dispatched_before_clear_is_discarded() {
        let (store, _dir) = setup_store();
        seed(&store, 3).await;
        let mut engine = ActivityLogEngine::new(store, ActivityConfig::default());

        let in_flight = engine.dispatch();
        let (ticket, result) = in_flight.await;
        engine.clear(ClearConfirmation::forced()).await.unwrap();

        assert_eq!(engine.apply(ticket, result), PollOutcome::Stale);
        assert!(engine.entries().is_empty());
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_cache_and_sets_banner() {
        let (store, _dir) = setup_store();
        seed(&store, 1).await;
        let flaky = Arc::new(FlakyStore::new(store));
        let mut engine = ActivityLogEngine::new(Arc::clone(&flaky) as Arc<dyn EntityStore>, ActivityConfig::default());
        engine.poll().await;

        flaky.fail_reads(true);
        assert!(matches!(engine.poll().await, PollOutcome::Failed(_)));
        let view = engine.view(Utc::now());
        assert_eq!(view.rows.len(), 2);
        assert!(view.banner.is_some());
        assert!(view.render().starts_with("! Unable to load activity"));

        flaky.fail_reads(false);
        engine.poll().await;
        assert!(engine.view(Utc::now()).banner.is_none());
    }

    #[tokio::test]
    async fn test_failed_clear_keeps_cache() {
        let (store, _dir) = setup_store();
        seed(&store, 1).await;
        let flaky = Arc::new(FlakyStore::new(store));
        let mut engine = ActivityLogEngine::new(Arc::clone(&flaky) as Arc<dyn EntityStore>, ActivityConfig::default());
        engine.poll().await;

        flaky.fail_writes(true);
        assert!(engine.clear(ClearConfirmation::forced()).await.is_err());
        assert_eq!(engine.entries().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_tick_and_refresh() {
        let (store, _dir) = setup_store();
        let mut engine = ActivityLogEngine::new(Arc::clone(&store), ActivityConfig::default());
        let refresh = engine.refresh_handle();
        let (stop_tx, stop_rx) = watch::channel(false);

        let driver = async move {
            // First tick fires at once; the refresh lands well before the next one.
            tokio::time::sleep(Duration::from_millis(100)).await;
            seed(&store, 1).await;
            refresh.request();
            tokio::time::sleep(Duration::from_millis(100)).await;
            stop_tx.send(true).unwrap();
        };

        let mut sizes = Vec::new();
        tokio::join!(engine.run(stop_rx, |view| sizes.push(view.total)), driver);
        assert_eq!(sizes, vec![0, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_applies_polls_slower_than_interval() {
        let (store, _dir) = setup_store();
        seed(&store, 1).await;
        let slow = Arc::new(FlakyStore::new(store));
        slow.delay_reads(Duration::from_secs(3));
        let mut engine = ActivityLogEngine::new(Arc::clone(&slow) as Arc<dyn EntityStore>, ActivityConfig::default());
        let (stop_tx, stop_rx) = watch::channel(false);

        let driver = async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            stop_tx.send(true).unwrap();
        };

        let mut totals = Vec::new();
        tokio::join!(engine.run(stop_rx, |view| totals.push(view.total)), driver);
        assert!(totals.len() >= 10, "only {} polls applied", totals.len());
        assert!(totals.iter().all(|t| *t == 2));
        assert_eq!(engine.entries().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_shows_banner_for_slow_failures() {
        let (store, _dir) = setup_store();
        let slow = Arc::new(FlakyStore::new(store));
        slow.delay_reads(Duration::from_secs(3));
        slow.fail_reads(true);
        let mut engine = ActivityLogEngine::new(Arc::clone(&slow) as Arc<dyn EntityStore>, ActivityConfig::default());
        let (stop_tx, stop_rx) = watch::channel(false);

        let driver = async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            stop_tx.send(true).unwrap();
        };

        let mut banners = Vec::new();
        tokio::join!(engine.run(stop_rx, |view| banners.push(view.banner.clone())), driver);
        assert!(!banners.is_empty());
        assert!(banners.iter().all(|b| b.is_some()));
    }
}
