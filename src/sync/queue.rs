use crate::api::{StoreError, StoreResult};
use futures::channel::oneshot;
use std::collections::{HashMap, VecDeque};

pub(crate) type Waiter = oneshot::Sender<StoreResult<()>>;

/// One coalesced write: the latest content for an id plus everyone awaiting it.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    pub id: String,
    pub content: Option<Vec<String>>,
    pub waiters: Vec<Waiter>,
}

impl PendingWrite {
    pub fn settle(self, result: StoreResult<()>) {
        for waiter in self.waiters {
            // A dropped receiver just means nobody is listening any more.
            let _ = waiter.send(result.clone());
        }
    }
}

/// Pending writes keyed by id, drained in first-queued order.
#[derive(Debug, Default)]
pub(crate) struct PendingWrites {
    order: VecDeque<String>,
    entries: HashMap<String, (Option<Vec<String>>, Vec<Waiter>)>,
}

impl PendingWrites {
    /// Replace the content queued for `id` and add a waiter. An id already queued keeps its
    /// place in line.
    pub fn upsert(&mut self, id: &str, content: Option<Vec<String>>, waiter: Waiter) {
        match self.entries.get_mut(id) {
            Some((queued, waiters)) => {
                *queued = content;
                waiters.push(waiter);
            }
            None => {
                self.order.push_back(id.to_string());
                self.entries.insert(id.to_string(), (content, vec![waiter]));
            }
        }
    }

    pub fn pop(&mut self) -> Option<PendingWrite> {
        while let Some(id) = self.order.pop_front() {
            if let Some((content, waiters)) = self.entries.remove(&id) {
                return Some(PendingWrite {
                    id,
                    content,
                    waiters,
                });
            }
        }
        None
    }

    pub fn ids(&self) -> Vec<String> {
        self.order.clone().into()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Take `id` out of line; its place in the order is skipped by `pop`.
    pub fn remove(&mut self, id: &str) -> Option<PendingWrite> {
        let (content, waiters) = self.entries.remove(id)?;
        self.order.retain(|queued| queued != id);
        Some(PendingWrite {
            id: id.to_string(),
            content,
            waiters,
        })
    }

    /// Drop everything, settling each waiter with `result`.
    pub fn settle_all(&mut self, result: StoreResult<()>) {
        self.order.clear();
        for (id, (content, waiters)) in self.entries.drain() {
            PendingWrite {
                id,
                content,
                waiters,
            }
            .settle(result.clone());
        }
    }

    pub fn cancel_all(&mut self) {
        self.settle_all(Err(StoreError::cancelled()));
    }
}
