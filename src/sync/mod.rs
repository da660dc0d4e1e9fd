//! Write-behind persistence of slide content.
//!
//! Reads go through a short-lived listing cache. Writes are coalesced per id, held until the
//! edits go quiet for the debounce window, then drained one at a time with retries. Every
//! `save` hands back a future that settles when that id's write lands (or finally fails).

mod clock;
mod queue;
mod retry;
#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Alarm, BrowserClock, Clock, TimeoutAlarm};
pub use retry::{retry_with_backoff, RetryPolicy};

use crate::api::{RemoteStore, StoreError, StoreResult};
use crate::cache::ListingCache;
use crate::config::SyncConfig;
use crate::models::ContentRecord;
use futures::channel::oneshot;
use futures::FutureExt;
use leptos::logging::{error, log, warn};
use queue::{PendingWrite, PendingWrites};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct EngineState {
    pending: PendingWrites,
    listing: ListingCache<Vec<ContentRecord>>,
    draining: bool,
    flush_at: Option<i64>,
}

/// Observer of writes that failed for good, e.g. to stop writing after a quota error.
pub type FailureListener = Arc<dyn Fn(&str, &StoreError)>;

pub struct WriteBehindCache<R, C, A> {
    remote: Arc<R>,
    clock: Arc<C>,
    alarm: Arc<A>,
    debounce_ms: u64,
    cache_ttl_ms: u64,
    policy: RetryPolicy,
    state: Arc<Mutex<EngineState>>,
    on_failure: Arc<Mutex<Option<FailureListener>>>,
}

impl<R, C, A> Clone for WriteBehindCache<R, C, A> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            clock: self.clock.clone(),
            alarm: self.alarm.clone(),
            debounce_ms: self.debounce_ms,
            cache_ttl_ms: self.cache_ttl_ms,
            policy: self.policy,
            state: self.state.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<R, C, A> WriteBehindCache<R, C, A>
where
    R: RemoteStore + 'static,
    C: Clock + 'static,
    A: Alarm + 'static,
{
    pub fn new(remote: R, clock: C, alarm: A, config: &SyncConfig) -> Self {
        Self {
            remote: Arc::new(remote),
            clock: Arc::new(clock),
            alarm: Arc::new(alarm),
            debounce_ms: config.debounce_ms,
            cache_ttl_ms: config.cache_ttl_ms,
            policy: RetryPolicy::from_config(config),
            state: Arc::new(Mutex::new(EngineState::default())),
            on_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Called with the id and error of every drained write that finally failed.
    pub fn set_failure_listener(&self, listener: impl Fn(&str, &StoreError) + 'static) {
        if let Ok(mut slot) = self.on_failure.lock() {
            *slot = Some(Arc::new(listener));
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        // The lock is never held across an await, so poisoning only follows a panic elsewhere.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Full content listing, served from cache while it is fresh.
    pub async fn load_all_cached(&self) -> StoreResult<Vec<ContentRecord>> {
        let now = self.clock.now_ms();
        if let Some(records) = self.state().listing.get(now) {
            return Ok(records);
        }

        let remote = &*self.remote;
        let records = retry_with_backoff(self.policy, &*self.clock, || remote.load_all()).await?;

        let now = self.clock.now_ms();
        self.state()
            .listing
            .put(records.clone(), now, self.cache_ttl_ms);
        Ok(records)
    }

    /// Queue `content` for `id` and restart the debounce window.
    ///
    /// The write is registered immediately; the returned future only reports the outcome.
    /// Dropping it does not cancel the write.
    pub fn save(
        &self,
        id: impl Into<String>,
        content: Option<Vec<String>>,
    ) -> impl Future<Output = StoreResult<()>> + 'static {
        let id = id.into();
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state();
            state.pending.upsert(&id, content, tx);
            state.flush_at = Some(self.clock.now_ms() + self.debounce_ms as i64);
        }
        self.schedule(self.debounce_ms);

        async move { rx.await.unwrap_or_else(|_| Err(StoreError::cancelled())) }
    }

    fn schedule(&self, delay_ms: u64) {
        let this = self.clone();
        self.alarm
            .arm(delay_ms, async move { this.fire().await }.boxed_local());
    }

    /// Alarm entry point. Drains when the debounce deadline has passed and no drain is
    /// running; an early wake-up re-arms for the remainder.
    pub async fn fire(&self) {
        let now = self.clock.now_ms();
        {
            let mut state = self.state();
            if state.draining || state.pending.is_empty() {
                return;
            }
            let flush_at = state.flush_at;
            if let Some(at) = flush_at {
                if at > now {
                    drop(state);
                    self.schedule((at - now) as u64);
                    return;
                }
            }
            state.draining = true;
            state.flush_at = None;
        }
        self.drain().await;
    }

    /// Drain right away, skipping the rest of the debounce window.
    pub async fn flush_now(&self) {
        self.alarm.cancel();
        {
            let mut state = self.state();
            if state.draining || state.pending.is_empty() {
                return;
            }
            state.draining = true;
            state.flush_at = None;
        }
        self.drain().await;
    }

    /// Persist queued writes one at a time until the queue is empty. A quota error ends the
    /// drain and rejects whatever is still queued with that error.
    async fn drain(&self) {
        loop {
            let next = {
                let mut state = self.state();
                match state.pending.pop() {
                    Some(write) => write,
                    None => {
                        state.draining = false;
                        state.flush_at = None;
                        return;
                    }
                }
            };

            let Err(e) = self.persist(next).await else {
                continue;
            };
            if e.is_quota_exceeded() {
                let rejected = {
                    let mut state = self.state();
                    let rejected = state.pending.len();
                    state.pending.settle_all(Err(e));
                    state.draining = false;
                    state.flush_at = None;
                    rejected
                };
                self.alarm.cancel();
                if rejected > 0 {
                    warn!("quota exhausted; rejected {rejected} queued writes");
                }
                return;
            }
        }
    }

    async fn persist(&self, write: PendingWrite) -> StoreResult<()> {
        let remote = &*self.remote;
        let id = write.id.as_str();
        let content = write.content.as_deref();
        let result =
            retry_with_backoff(self.policy, &*self.clock, || remote.save(id, content)).await;

        match &result {
            Ok(()) => {
                self.state().listing.invalidate();
                log!("saved slide {id}");
            }
            Err(e) => {
                if e.is_quota_exceeded() {
                    error!("saving slide {id} hit the quota: {e}");
                } else {
                    warn!("saving slide {id} failed: {e}");
                }
                let listener = self.on_failure.lock().ok().and_then(|l| l.clone());
                if let Some(listener) = listener {
                    listener(id, e);
                }
            }
        }
        write.settle(result.clone());
        result
    }

    /// Delete the remote record for `id`, then drop the cached listing. A write still queued
    /// for `id` is discarded first and its waiters fail with `Cancelled`.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let superseded = {
            let mut state = self.state();
            let superseded = state.pending.remove(id);
            if state.pending.is_empty() && !state.draining {
                state.flush_at = None;
            }
            superseded
        };
        if let Some(write) = superseded {
            log!("dropping queued write for slide {id}: it is being deleted");
            write.settle(Err(StoreError::cancelled()));
        }

        let remote = &*self.remote;
        retry_with_backoff(self.policy, &*self.clock, || remote.delete(id)).await?;
        self.state().listing.invalidate();
        Ok(())
    }

    /// Forget everything queued and cached. Pending waiters fail with `Cancelled`; a write
    /// already in flight still completes.
    pub fn reset(&self) {
        self.alarm.cancel();
        let mut state = self.state();
        state.pending.cancel_all();
        state.listing.invalidate();
        state.flush_at = None;
    }

    pub fn invalidate_listing(&self) {
        self.state().listing.invalidate();
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.state().pending.ids()
    }

    pub fn is_draining(&self) -> bool {
        self.state().draining
    }

    pub fn next_flush_at(&self) -> Option<i64> {
        self.state().flush_at
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeRemote, ManualAlarm, ManualClock, RemoteCall};
    use super::*;
    use crate::api::StoreErrorKind;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;

    type TestCache = WriteBehindCache<FakeRemote, ManualClock, ManualAlarm>;

    fn setup(records: Vec<ContentRecord>) -> (TestCache, FakeRemote, ManualClock, ManualAlarm) {
        let remote = FakeRemote::with_records(records);
        let clock = ManualClock::new(10_000);
        let alarm = ManualAlarm::new();
        let cache = WriteBehindCache::new(
            remote.clone(),
            clock.clone(),
            alarm.clone(),
            &SyncConfig::default(),
        );
        (cache, remote, clock, alarm)
    }

    fn html(s: &str) -> Option<Vec<String>> {
        Some(vec![format!("<p>{s}</p>")])
    }

    fn fire_alarm(alarm: &ManualAlarm) {
        let task = alarm.take().expect("alarm should be armed");
        block_on(task);
    }

    #[test]
    fn test_listing_is_cached_until_ttl() {
        let (cache, remote, clock, _) = setup(vec![ContentRecord::new("a", html("a"))]);

        let first = block_on(cache.load_all_cached()).expect("should load");
        assert_eq!(first.len(), 1);
        clock.advance(29_999);
        block_on(cache.load_all_cached()).expect("should load");
        assert_eq!(remote.load_count(), 1);

        clock.advance(1);
        block_on(cache.load_all_cached()).expect("should load");
        assert_eq!(remote.load_count(), 2);
    }

    #[test]
    fn test_load_is_retried() {
        let (cache, remote, clock, _) = setup(vec![]);
        remote.fail_next([StoreError::new(StoreErrorKind::Unavailable, "down")]);
        block_on(cache.load_all_cached()).expect("second attempt should succeed");
        assert_eq!(remote.load_count(), 2);
        assert_eq!(clock.sleeps().len(), 1);
    }

    #[test]
    fn test_coalesces_writes_to_latest_value() {
        let (cache, remote, clock, alarm) = setup(vec![]);

        let first = cache.save("x", html("A"));
        clock.advance(500);
        let second = cache.save("x", html("B"));
        assert_eq!(alarm.arm_count(), 2);
        assert_eq!(cache.pending_ids(), vec!["x".to_string()]);

        clock.advance(1_200);
        fire_alarm(&alarm);

        assert_eq!(remote.saves(), vec![("x".to_string(), html("B"))]);
        assert_eq!(block_on(first), Ok(()));
        assert_eq!(block_on(second), Ok(()));
        assert!(cache.pending_ids().is_empty());
        assert!(!cache.is_draining());
    }

    #[test]
    fn test_early_fire_rearms_for_remaining_window() {
        let (cache, remote, clock, alarm) = setup(vec![]);
        let _done = cache.save("x", html("A"));
        assert_eq!(cache.next_flush_at(), Some(11_200));

        clock.advance(700);
        fire_alarm(&alarm);
        assert!(remote.saves().is_empty());
        assert_eq!(alarm.armed_delay(), Some(500));

        clock.advance(500);
        fire_alarm(&alarm);
        assert_eq!(remote.saves().len(), 1);
    }

    #[test]
    fn test_burst_across_ids_drains_fifo_once() {
        let (cache, remote, clock, alarm) = setup(vec![]);
        let a = cache.save("a", html("1"));
        let b = cache.save("b", html("2"));
        let c = cache.save("c", html("3"));
        let _a2 = cache.save("a", html("4"));

        clock.advance(1_200);
        fire_alarm(&alarm);

        let ids: Vec<String> = remote.saves().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(remote.records().get("a"), Some(&html("4")));
        for done in [a, b, c] {
            assert_eq!(block_on(done), Ok(()));
        }
    }

    #[test]
    fn test_drain_runs_one_write_at_a_time() {
        let (cache, remote, clock, _alarm) = setup(vec![]);
        let release = remote.hold_next_save();
        let a = cache.save("a", html("1"));
        let b = cache.save("b", html("2"));
        clock.advance(1_200);

        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        for _ in 0..2 {
            let c = cache.clone();
            spawner
                .spawn_local(async move { c.fire().await })
                .expect("should spawn");
        }
        pool.run_until_stalled();
        assert!(cache.is_draining());
        assert_eq!(remote.saves().len(), 1);

        // Queued while draining: picked up by the same drain.
        let c = cache.save("c", html("3"));
        assert!(cache.next_flush_at().is_some());
        release.send(()).expect("save is parked");
        pool.run_until_stalled();
        assert_eq!(cache.next_flush_at(), None);

        assert_eq!(remote.max_in_flight(), 1);
        let ids: Vec<String> = remote.saves().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        for done in [a, b, c] {
            assert_eq!(block_on(done), Ok(()));
        }
        assert!(!cache.is_draining());
    }

    #[test]
    fn test_quota_error_is_not_retried() {
        let (cache, remote, clock, alarm) = setup(vec![]);
        remote.fail_next([StoreError::from_code("resource-exhausted", "quota")]);
        let done = cache.save("x", html("A"));
        clock.advance(1_200);
        fire_alarm(&alarm);

        let err = block_on(done).expect_err("quota should reject");
        assert!(err.is_quota_exceeded());
        assert_eq!(remote.saves().len(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_failure_listener_sees_final_errors() {
        let (cache, remote, clock, alarm) = setup(vec![]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        cache.set_failure_listener(move |id, e| {
            sink.lock().expect("listener lock").push((id.to_string(), e.kind()));
        });

        remote.fail_next([StoreError::from_code("resource-exhausted", "quota")]);
        let _x = cache.save("x", html("A"));
        let _y = cache.save("y", html("B"));
        clock.advance(1_200);
        fire_alarm(&alarm);

        let seen = seen.lock().expect("listener lock").clone();
        assert_eq!(seen, vec![("x".to_string(), StoreErrorKind::ResourceExhausted)]);
    }

    #[test]
    fn test_quota_error_stops_the_drain() {
        let (cache, remote, clock, alarm) = setup(vec![]);
        remote.fail_next([StoreError::from_code("resource-exhausted", "quota")]);
        let x = cache.save("x", html("A"));
        let y = cache.save("y", html("B"));
        let z = cache.save("z", html("C"));
        clock.advance(1_200);
        fire_alarm(&alarm);

        assert_eq!(remote.saves(), vec![("x".to_string(), html("A"))]);
        for done in [x, y, z] {
            assert!(block_on(done).expect_err("quota").is_quota_exceeded());
        }
        assert!(cache.pending_ids().is_empty());
        assert!(!cache.is_draining());
        assert_eq!(cache.next_flush_at(), None);
    }

    #[test]
    fn test_transient_failures_are_retried_then_reported() {
        let (cache, remote, clock, alarm) = setup(vec![]);
        remote.fail_next((0..3).map(|_| StoreError::new(StoreErrorKind::Internal, "boom")));
        let failed = cache.save("x", html("A"));
        let ok = cache.save("y", html("B"));
        clock.advance(1_200);
        fire_alarm(&alarm);

        assert_eq!(
            block_on(failed).expect_err("three failures").kind(),
            StoreErrorKind::Internal
        );
        assert_eq!(block_on(ok), Ok(()));
        assert_eq!(remote.saves().len(), 4);
    }

    #[test]
    fn test_successful_write_invalidates_listing() {
        let (cache, remote, clock, alarm) = setup(vec![ContentRecord::new("x", html("old"))]);
        block_on(cache.load_all_cached()).expect("should load");

        let _done = cache.save("x", html("new"));
        clock.advance(1_200);
        fire_alarm(&alarm);

        let records = block_on(cache.load_all_cached()).expect("should reload");
        assert_eq!(remote.load_count(), 2);
        assert_eq!(records[0].content, html("new"));
    }

    #[test]
    fn test_delete_retries_and_invalidates() {
        let (cache, remote, _clock, _) = setup(vec![ContentRecord::new("x", html("x"))]);
        block_on(cache.load_all_cached()).expect("should load");
        remote.fail_next([StoreError::new(StoreErrorKind::DeadlineExceeded, "slow")]);

        block_on(cache.delete("x")).expect("second attempt should succeed");
        assert_eq!(
            remote.calls().iter().filter(|c| matches!(c, RemoteCall::Delete(_))).count(),
            2
        );
        let records = block_on(cache.load_all_cached()).expect("should reload");
        assert!(records.is_empty());
    }

    #[test]
    fn test_delete_discards_queued_write_for_same_id() {
        let (cache, remote, clock, alarm) = setup(vec![ContentRecord::new("b", html("old"))]);
        let edit = cache.save("b", html("edit"));
        let other = cache.save("c", html("keep"));

        block_on(cache.delete("b")).expect("delete should succeed");
        assert_eq!(cache.pending_ids(), vec!["c".to_string()]);
        assert_eq!(
            block_on(edit).expect_err("superseded by delete").kind(),
            StoreErrorKind::Cancelled
        );

        clock.advance(1_200);
        fire_alarm(&alarm);
        assert_eq!(block_on(other), Ok(()));
        assert_eq!(remote.records().get("b"), None);
        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::Delete("b".to_string()),
                RemoteCall::Save("c".to_string(), html("keep")),
            ]
        );
    }

    #[test]
    fn test_flush_now_skips_debounce() {
        let (cache, remote, _clock, alarm) = setup(vec![]);
        let done = cache.save("x", html("A"));
        block_on(cache.flush_now());
        assert!(alarm.armed_delay().is_none());
        assert_eq!(remote.saves().len(), 1);
        assert_eq!(block_on(done), Ok(()));
    }

    #[test]
    fn test_reset_cancels_pending_writes() {
        let (cache, remote, clock, alarm) = setup(vec![]);
        let done = cache.save("x", html("A"));
        cache.reset();

        assert!(alarm.armed_delay().is_none());
        assert!(cache.pending_ids().is_empty());
        assert_eq!(cache.next_flush_at(), None);
        assert_eq!(
            block_on(done).expect_err("reset should cancel").kind(),
            StoreErrorKind::Cancelled
        );

        clock.advance(5_000);
        block_on(cache.fire());
        assert!(remote.saves().is_empty());
    }
}
