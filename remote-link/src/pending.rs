//! Table of requests awaiting their correlated response.
//!
//! Every entry is resolved exactly once. Whoever removes the entry first
//! (a matching response, the caller's timeout, or a teardown) owns the
//! resolution; anyone arriving later finds nothing and does nothing.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::LinkError;

pub(crate) type Outcome = Result<Value, LinkError>;

#[derive(Default)]
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<String, oneshot::Sender<Outcome>>>,
}

impl PendingTable {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Outcome>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `id` and hand back the receiving half.
    pub(crate) fn register(&self, id: &str) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.entries().insert(id.to_owned(), tx);
        rx
    }

    /// Resolve `id` if it is still pending. Returns `false` for unknown ids.
    pub(crate) fn resolve(&self, id: &str, outcome: Outcome) -> bool {
        let Some(tx) = self.entries().remove(id) else {
            return false;
        };
        if tx.send(outcome).is_err() {
            debug!(%id, "response arrived after caller stopped waiting");
        }
        true
    }

    /// Forget `id` without resolving it. Returns `true` if it was present.
    pub(crate) fn remove(&self, id: &str) -> bool {
        self.entries().remove(id).is_some()
    }

    /// Fail every pending entry. Returns how many were failed.
    pub(crate) fn fail_all(&self, err: &LinkError) -> usize {
        let drained: Vec<_> = self.entries().drain().collect();
        let count = drained.len();
        for (id, tx) in drained {
            if tx.send(Err(err.clone())).is_err() {
                debug!(%id, "pending caller already gone");
            }
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }
}

#[cfg(test)]
#[path = "pending_test.rs"]
mod tests;
