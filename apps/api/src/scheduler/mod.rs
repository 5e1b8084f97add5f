//! Recurring Scheduler: per-automation daily triggers plus the due-post sweep.
//!
//! The scheduler is an owned value shared through `Arc`, never a global. Route
//! handlers that mutate automations call `resync()` on it.
//!
//! Trigger loops only sleep and spawn; each run executes in its own task, so
//! aborting a trigger during `resync()` never cancels a run in flight.

pub mod guard;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::automation::delivery::deliver;
use crate::automation::schedule::{DailySchedule, ScheduleError};
use crate::automation::AutomationEngine;
use crate::models::account::Account;
use crate::models::post::PostStatus;
use crate::scheduler::guard::InFlight;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome counts of one due-post sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub published: usize,
    pub failed: usize,
    /// Account inactive or missing, or the post was transitioned elsewhere.
    pub skipped: usize,
    /// Datastore errors; the post stays `scheduled`.
    pub errors: usize,
}

pub struct AutomationScheduler {
    engine: Arc<AutomationEngine>,
    sweep_interval: Duration,
    in_flight: InFlight,
    triggers: RwLock<HashMap<Uuid, JoinHandle<()>>>,
    sweep: RwLock<Option<JoinHandle<()>>>,
}

impl AutomationScheduler {
    pub fn new(engine: Arc<AutomationEngine>, sweep_interval: Duration) -> Self {
        Self {
            engine,
            sweep_interval,
            in_flight: InFlight::default(),
            triggers: RwLock::new(HashMap::new()),
            sweep: RwLock::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<AutomationEngine> {
        &self.engine
    }

    /// Builds all daily triggers and starts the sweep loop.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let count = self.resync().await?;
        info!("Scheduler started with {count} automation triggers");

        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let report = scheduler.sweep_due_posts(Utc::now()).await;
                if report != SweepReport::default() {
                    info!("Due-post sweep: {report:?}");
                }
            }
        });
        if let Some(old) = self.sweep.write().await.replace(handle) {
            old.abort();
        }
        Ok(())
    }

    /// Aborts every trigger and the sweep loop. Runs already in flight finish.
    pub async fn shutdown(&self) {
        let mut triggers = self.triggers.write().await;
        for (_, handle) in triggers.drain() {
            handle.abort();
        }
        if let Some(sweep) = self.sweep.write().await.take() {
            sweep.abort();
        }
        info!("Scheduler stopped");
    }

    /// Full rebuild: drops every automation trigger and adds one per enabled
    /// automation. Returns the number of triggers installed.
    ///
    /// The trigger table stays write-locked while automations are read, so
    /// concurrent resyncs apply in the order they observed the datastore.
    pub async fn resync(self: &Arc<Self>) -> Result<usize> {
        let mut triggers = self.triggers.write().await;
        let automations = self.engine.store().list_enabled_automations().await?;

        let mut accounts: HashMap<Uuid, Option<Account>> = HashMap::new();
        let mut schedules = Vec::with_capacity(automations.len());
        for automation in &automations {
            if !accounts.contains_key(&automation.account_id) {
                let account = self.engine.store().get_account(automation.account_id).await?;
                accounts.insert(automation.account_id, account);
            }
            let account = accounts.get(&automation.account_id).and_then(Option::as_ref);
            match DailySchedule::for_automation(automation, account) {
                Ok(schedule) => schedules.push((automation.id, schedule)),
                Err(e) => error!("Automation {} has an invalid schedule: {e}", automation.id),
            }
        }

        for (_, handle) in triggers.drain() {
            handle.abort();
        }
        for (id, schedule) in schedules {
            debug!(
                "Trigger for automation {id}: cron '{}' in {}",
                schedule.cron_expression(),
                schedule.tz
            );
            let handle = self.spawn_trigger(id, schedule);
            triggers.insert(id, handle);
        }

        let count = triggers.len();
        info!("Scheduler resynced: {count} automation triggers");
        Ok(count)
    }

    pub async fn trigger_count(&self) -> usize {
        self.triggers.read().await.len()
    }

    pub async fn has_trigger(&self, id: Uuid) -> bool {
        self.triggers.read().await.contains_key(&id)
    }

    fn spawn_trigger(self: &Arc<Self>, id: Uuid, schedule: DailySchedule) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut last_fired = None;
            loop {
                let now = Utc::now();
                let next = match next_firing(&schedule, now, last_fired) {
                    Ok(next) => next,
                    Err(e) => {
                        error!("Trigger for automation {id} stopped: {e}");
                        return;
                    }
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;
                scheduler.fire(id);
                last_fired = Some(next);
            }
        })
    }

    /// Starts a run for `id` unless one is already executing.
    /// Returns false when the firing was rejected as overlapping.
    pub fn fire(&self, id: Uuid) -> bool {
        let Some(token) = self.in_flight.try_acquire(id) else {
            warn!("Automation {id} is still running, skipping overlapping firing");
            return false;
        };
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let _token = token;
            info!("Scheduled run for automation {id}");
            engine.run(id).await;
        });
        true
    }

    pub fn is_running(&self, id: Uuid) -> bool {
        self.in_flight.contains(id)
    }

    /// Publishes every `scheduled` post whose time has come, oldest first.
    ///
    /// Each post is committed on its own; one failure never affects another.
    pub async fn sweep_due_posts(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let store = self.engine.store();

        let due = match store.due_posts(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to load due posts: {e:#}");
                report.errors += 1;
                return report;
            }
        };

        let mut accounts: HashMap<Uuid, Option<Account>> = HashMap::new();
        for post in due {
            if !accounts.contains_key(&post.account_id) {
                match store.get_account(post.account_id).await {
                    Ok(account) => {
                        accounts.insert(post.account_id, account);
                    }
                    Err(e) => {
                        error!("Failed to load account {}: {e:#}", post.account_id);
                        report.errors += 1;
                        continue;
                    }
                }
            }
            let account = match accounts.get(&post.account_id).and_then(Option::as_ref) {
                Some(account) if account.is_active => account,
                _ => {
                    debug!("Post {} skipped: account inactive or missing", post.id);
                    report.skipped += 1;
                    continue;
                }
            };

            match deliver(store.as_ref(), self.engine.publisher(), &post, account, now).await {
                Ok(Some(updated)) if updated.status == PostStatus::Published => {
                    report.published += 1
                }
                Ok(Some(_)) => report.failed += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    error!("Failed to record publish outcome for post {}: {e:#}", post.id);
                    report.errors += 1;
                }
            }
        }
        report
    }
}

/// Next occurrence strictly after both `now` and the last fired target, so a
/// wall clock that lags the sleep timer cannot fire the same slot twice.
fn next_firing(
    schedule: &DailySchedule,
    now: DateTime<Utc>,
    last_fired: Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let from = match last_fired {
        Some(last) if last > now => last,
        _ => now,
    };
    schedule.next_after(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::testing::memory_engine;
    use crate::llm_client::testing::ScriptedTextModel;
    use crate::llm_client::{LlmError, TextModel};
    use crate::models::automation::PostingMode;
    use crate::models::post::Post;
    use crate::publish::testing::FakeGraph;
    use crate::publish::DEFAULT_NOT_READY_CODE;
    use crate::store::memory::{account_fixture, automation_fixture, post_fixture, MemoryStore};
    use crate::store::Store;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Text model that takes a while to answer, so runs stay in flight.
    struct SlowTextModel;

    #[async_trait]
    impl TextModel for SlowTextModel {
        async fn complete(
            &self,
            _prompt: &str,
            _system: &str,
            _temperature: f32,
        ) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(r#"{"caption": "A slow but perfectly valid caption.", "hashtags": []}"#.to_string())
        }
    }

    fn scheduler(
        store: Arc<MemoryStore>,
        model: Arc<dyn TextModel>,
        graph: FakeGraph,
    ) -> Arc<AutomationScheduler> {
        let engine = memory_engine(store, model, graph);
        Arc::new(AutomationScheduler::new(engine, DEFAULT_SWEEP_INTERVAL))
    }

    fn scheduled(post: Post, at: DateTime<Utc>) -> Post {
        Post {
            status: PostStatus::Scheduled,
            scheduled_time: Some(at),
            ..post
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_firing_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let account = account_fixture("UTC", "09:00");
        let automation = automation_fixture(&account, "Gratitude");
        store.put_account(account.clone());
        store.put_automation(automation.clone());
        store.put_post(post_fixture(&account, Some("https://x/img1.jpg")));
        let scheduler = scheduler(store.clone(), Arc::new(SlowTextModel), FakeGraph::succeeding());

        assert!(scheduler.fire(automation.id));
        tokio::task::yield_now().await;
        assert!(scheduler.is_running(automation.id));
        assert!(!scheduler.fire(automation.id));

        // Let the first run finish; the guard is released afterwards.
        tokio::time::sleep(Duration::from_secs(31)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!scheduler.is_running(automation.id));
        assert_eq!(store.posts().len(), 2);
        assert!(scheduler.fire(automation.id));
    }

    #[tokio::test]
    async fn test_resync_tracks_enabled_automations_only() {
        let store = Arc::new(MemoryStore::new());
        let account = account_fixture("America/Detroit", "09:00");
        store.put_account(account.clone());
        let first = automation_fixture(&account, "Gratitude");
        let second = automation_fixture(&account, "Patience");
        let mut disabled = automation_fixture(&account, "Charity");
        disabled.enabled = false;
        let mut broken = automation_fixture(&account, "Hope");
        broken.timezone = Some("Nowhere/Land".to_string());
        for a in [&first, &second, &disabled, &broken] {
            store.put_automation(a.clone());
        }
        let scheduler = scheduler(
            store.clone(),
            Arc::new(ScriptedTextModel::always("{}")),
            FakeGraph::succeeding(),
        );

        assert_eq!(scheduler.resync().await.unwrap(), 2);
        assert!(scheduler.has_trigger(first.id).await);
        assert!(!scheduler.has_trigger(disabled.id).await);

        // Disabling then resyncing drops the trigger; a second resync is idempotent.
        store
            .set_automation_enabled(second.id, false)
            .await
            .unwrap();
        assert_eq!(scheduler.resync().await.unwrap(), 1);
        assert_eq!(scheduler.resync().await.unwrap(), 1);
        assert!(!scheduler.has_trigger(second.id).await);

        scheduler.shutdown().await;
        assert_eq!(scheduler.trigger_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_publishes_due_posts_and_skips_inactive_accounts() {
        let store = Arc::new(MemoryStore::new());
        let active = account_fixture("UTC", "09:00");
        let mut inactive = account_fixture("UTC", "09:00");
        inactive.is_active = false;
        store.put_account(active.clone());
        store.put_account(inactive.clone());

        let now = Utc::now();
        let due = scheduled(post_fixture(&active, Some("https://x/a.jpg")), now - ChronoDuration::minutes(5));
        let future = scheduled(post_fixture(&active, Some("https://x/b.jpg")), now + ChronoDuration::hours(1));
        let parked = scheduled(post_fixture(&inactive, Some("https://x/c.jpg")), now - ChronoDuration::minutes(1));
        for p in [&due, &future, &parked] {
            store.put_post(p.clone());
        }

        let scheduler = scheduler(
            store.clone(),
            Arc::new(ScriptedTextModel::always("{}")),
            FakeGraph::succeeding(),
        );
        let report = scheduler.sweep_due_posts(now).await;

        assert_eq!(
            report,
            SweepReport {
                published: 1,
                skipped: 1,
                ..Default::default()
            }
        );
        assert_eq!(store.post(due.id).unwrap().status, PostStatus::Published);
        assert_eq!(store.post(future.id).unwrap().status, PostStatus::Scheduled);
        assert_eq!(store.post(parked.id).unwrap().status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_sweep_failures_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let account = account_fixture("UTC", "09:00");
        store.put_account(account.clone());

        let now = Utc::now();
        let older = scheduled(post_fixture(&account, Some("https://x/a.jpg")), now - ChronoDuration::minutes(10));
        let newer = scheduled(post_fixture(&account, Some("https://x/b.jpg")), now - ChronoDuration::minutes(2));
        store.put_post(newer.clone());
        store.put_post(older.clone());

        // Oldest post is processed first and hits a hard error; the next still publishes.
        let graph = FakeGraph::scripted(vec![Err(190)], None);
        let scheduler = scheduler(store.clone(), Arc::new(ScriptedTextModel::always("{}")), graph);
        let report = scheduler.sweep_due_posts(now).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.published, 1);
        let older = store.post(older.id).unwrap();
        assert_eq!(older.status, PostStatus::Failed);
        assert_eq!(older.flags["publish_error"]["step"], "media_publish");
        assert_eq!(store.post(newer.id).unwrap().status, PostStatus::Published);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_leaves_publish_now_post_to_its_run() {
        let store = Arc::new(MemoryStore::new());
        let account = account_fixture("UTC", "09:00");
        let mut automation = automation_fixture(&account, "Gratitude");
        automation.posting_mode = PostingMode::PublishNow;
        store.put_account(account.clone());
        store.put_automation(automation.clone());
        store.put_post(post_fixture(&account, Some("https://x/img1.jpg")));

        // Two not-ready answers keep the run polling for a few seconds.
        let graph = FakeGraph::scripted(
            vec![Err(DEFAULT_NOT_READY_CODE), Err(DEFAULT_NOT_READY_CODE)],
            None,
        );
        let model = ScriptedTextModel::always(
            r##"{"caption": "Gratitude grows when you write it down each evening.", "hashtags": ["#gratitude"]}"##,
        );
        let scheduler = scheduler(store.clone(), Arc::new(model), graph);

        let now = Utc::now();
        let id = automation.id;
        let engine = scheduler.engine().clone();
        let run = tokio::spawn(async move {
            engine
                .run_at(id, now, &mut StdRng::seed_from_u64(3))
                .await
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        let pending: Vec<Post> = store
            .posts()
            .into_iter()
            .filter(|p| p.automation_id == Some(id))
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, PostStatus::Scheduled);

        let report = scheduler
            .sweep_due_posts(now + ChronoDuration::seconds(1))
            .await;
        assert_eq!(report, SweepReport::default());

        let post = run.await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Published);
        assert_eq!(store.post(post.id).unwrap().status, PostStatus::Published);
    }

    #[test]
    fn test_lagging_wall_clock_does_not_refire_the_same_slot() {
        let schedule = DailySchedule::parse("09:00", "UTC").unwrap();
        let slot = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        let lagging_now = slot - ChronoDuration::seconds(1);

        assert_eq!(next_firing(&schedule, lagging_now, None).unwrap(), slot);
        assert_eq!(
            next_firing(&schedule, lagging_now, Some(slot)).unwrap(),
            slot + ChronoDuration::days(1)
        );
        // A clock that is ahead of the last target is used as is.
        let later = slot + ChronoDuration::hours(30);
        assert_eq!(
            next_firing(&schedule, later, Some(slot)).unwrap(),
            Utc.with_ymd_and_hms(2025, 5, 3, 9, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_resync_reads_automations_under_the_trigger_lock() {
        let store = Arc::new(MemoryStore::new());
        let account = account_fixture("UTC", "09:00");
        let automation = automation_fixture(&account, "Gratitude");
        store.put_account(account.clone());
        store.put_automation(automation.clone());
        let scheduler = scheduler(
            store.clone(),
            Arc::new(ScriptedTextModel::always("{}")),
            FakeGraph::succeeding(),
        );

        // Another resync holds the table; this one must not read until it is released.
        let held = scheduler.triggers.write().await;
        let pending = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.resync().await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        store
            .set_automation_enabled(automation.id, false)
            .await
            .unwrap();
        drop(held);

        assert_eq!(pending.await.unwrap().unwrap(), 0);
        assert!(!scheduler.has_trigger(automation.id).await);
    }
}
