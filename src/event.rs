//! Notification stream
//!
//! Tables publish readiness and debug notifications here. Any number of
//! subscribers may attach; each gets its own unbounded channel and dropped
//! receivers are pruned on the next publish.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

/// A notification emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A table finished `connect()` and serves requests
    TableReady { table: String, loaded: usize },

    /// Every table of the database is ready
    DatabaseReady,

    /// A batch of pending mutations reached disk
    Flushed {
        table: String,
        kind: FlushKind,
        shards: usize,
    },

    /// Free-form diagnostics
    Debug { table: String, message: String },
}

/// Which batch a [`Event::Flushed`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    Set,
    Delete,
}

/// Fan-out publisher shared by a database and its tables
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscriber
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Publish to every live subscriber
    pub fn emit(&self, event: Event) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn debug(&self, table: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(table, "{}", message);
        self.emit(Event::Debug {
            table: table.to_string(),
            message,
        });
    }
}
