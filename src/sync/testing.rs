//! Deterministic doubles for driving the sync engine from tests.

use super::clock::{Alarm, Clock};
use crate::api::{RemoteStore, StoreError, StoreResult};
use crate::models::ContentRecord;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Virtual clock. `sleep` advances time instantly and records the requested delay.
#[derive(Clone, Debug, Default)]
pub(crate) struct ManualClock {
    now: Arc<Mutex<i64>>,
    sleeps: Arc<Mutex<Vec<u64>>>,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
            sleeps: Arc::default(),
        }
    }

    pub fn advance(&self, ms: u64) {
        *self.now.lock().expect("clock lock") += ms as i64;
    }

    pub fn sleeps(&self) -> Vec<u64> {
        self.sleeps.lock().expect("clock lock").clone()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        *self.now.lock().expect("clock lock")
    }

    fn sleep(&self, ms: u64) -> impl Future<Output = ()> {
        self.sleeps.lock().expect("clock lock").push(ms);
        self.advance(ms);
        std::future::ready(())
    }
}

/// Alarm that only fires when the test says so.
#[derive(Clone, Default)]
pub(crate) struct ManualAlarm {
    armed: Arc<Mutex<Option<(u64, LocalBoxFuture<'static, ()>)>>>,
    arm_count: Arc<Mutex<usize>>,
}

impl ManualAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed_delay(&self) -> Option<u64> {
        self.armed.lock().expect("alarm lock").as_ref().map(|(d, _)| *d)
    }

    pub fn arm_count(&self) -> usize {
        *self.arm_count.lock().expect("alarm lock")
    }

    /// Take the armed task, if any. The caller runs it.
    pub fn take(&self) -> Option<LocalBoxFuture<'static, ()>> {
        self.armed.lock().expect("alarm lock").take().map(|(_, task)| task)
    }
}

impl Alarm for ManualAlarm {
    fn arm(&self, delay_ms: u64, task: LocalBoxFuture<'static, ()>) {
        *self.armed.lock().expect("alarm lock") = Some((delay_ms, task));
        *self.arm_count.lock().expect("alarm lock") += 1;
    }

    fn cancel(&self) {
        self.armed.lock().expect("alarm lock").take();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RemoteCall {
    LoadAll,
    Save(String, Option<Vec<String>>),
    Delete(String),
}

/// In-memory remote with scripted failures and a call log.
#[derive(Clone, Default)]
pub(crate) struct FakeRemote {
    records: Arc<Mutex<Vec<ContentRecord>>>,
    failures: Arc<Mutex<VecDeque<StoreError>>>,
    calls: Arc<Mutex<Vec<RemoteCall>>>,
    in_flight: Arc<Mutex<usize>>,
    max_in_flight: Arc<Mutex<usize>>,
    gate: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
}

impl FakeRemote {
    pub fn with_records(records: Vec<ContentRecord>) -> Self {
        let remote = Self::default();
        *remote.records.lock().expect("remote lock") = records;
        remote
    }

    /// The next calls fail with these errors, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.failures.lock().expect("remote lock").extend(errors);
    }

    /// Park the next `save` until the returned sender fires or is dropped.
    pub fn hold_next_save(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().expect("remote lock") = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().expect("remote lock").clone()
    }

    pub fn saves(&self) -> Vec<(String, Option<Vec<String>>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RemoteCall::Save(id, content) => Some((id, content)),
                _ => None,
            })
            .collect()
    }

    pub fn load_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == RemoteCall::LoadAll)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        *self.max_in_flight.lock().expect("remote lock")
    }

    pub fn records(&self) -> HashMap<String, Option<Vec<String>>> {
        self.records
            .lock()
            .expect("remote lock")
            .iter()
            .map(|r| (r.id.clone(), r.content.clone()))
            .collect()
    }

    fn enter(&self, call: RemoteCall) -> StoreResult<()> {
        self.calls.lock().expect("remote lock").push(call);
        let mut n = self.in_flight.lock().expect("remote lock");
        *n += 1;
        let mut max = self.max_in_flight.lock().expect("remote lock");
        *max = (*max).max(*n);
        match self.failures.lock().expect("remote lock").pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn leave(&self) {
        *self.in_flight.lock().expect("remote lock") -= 1;
    }
}

impl RemoteStore for FakeRemote {
    async fn load_all(&self) -> StoreResult<Vec<ContentRecord>> {
        let res = self.enter(RemoteCall::LoadAll);
        self.leave();
        res?;
        Ok(self.records.lock().expect("remote lock").clone())
    }

    async fn save(&self, id: &str, content: Option<&[String]>) -> StoreResult<()> {
        let content = content.map(<[String]>::to_vec);
        let res = self.enter(RemoteCall::Save(id.to_string(), content.clone()));
        let gate = self.gate.lock().expect("remote lock").take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        self.leave();
        res?;
        let mut records = self.records.lock().expect("remote lock");
        match records.iter_mut().find(|r| r.id == id) {
            Some(r) => r.content = content,
            None => records.push(ContentRecord::new(id, content)),
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let res = self.enter(RemoteCall::Delete(id.to_string()));
        self.leave();
        res?;
        self.records.lock().expect("remote lock").retain(|r| r.id != id);
        Ok(())
    }
}
