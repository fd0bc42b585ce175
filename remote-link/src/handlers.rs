//! Notification subscribers.
//!
//! An ordered observer list: every handler sees every notification, in
//! registration order. Handlers run outside the list lock, so a handler may
//! subscribe or unsubscribe from inside its own callback. A handler that
//! panics is contained and logged; the rest still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rpc_frames::Notification;
use tracing::warn;

/// Callback invoked for each incoming notification.
pub type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Ticket returned by `on_notification`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(HandlerId, NotificationHandler)>>,
}

impl HandlerRegistry {
    fn handlers(&self) -> MutexGuard<'_, Vec<(HandlerId, NotificationHandler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(&self, handler: NotificationHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers().push((id, handler));
        id
    }

    pub(crate) fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers().len()
    }

    /// Fan `note` out to a snapshot of the current handlers.
    ///
    /// Returns the number of handlers that panicked.
    pub(crate) fn dispatch(&self, note: &Notification) -> usize {
        let snapshot: Vec<(HandlerId, NotificationHandler)> = self.handlers().clone();
        let mut failed = 0;
        for (id, handler) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(note))).is_err() {
                failed += 1;
                warn!(handler = ?id, method = %note.method, "notification handler panicked");
            }
        }
        failed
    }
}

#[cfg(test)]
#[path = "handlers_test.rs"]
mod tests;
