// Write events: synchronous in-process fan-out with listener isolation.
//
// Delivery happens inside the ingest serialization, so listeners observe
// events in exactly the order writes were accepted. A panicking listener
// is logged and skipped; it never unwinds into the store or starves the
// other listeners.

use std::panic::{catch_unwind, AssertUnwindSafe};

use driftwood_common::document::Document;
use serde::{Deserialize, Serialize};

/// Published after every accepted write (never for ignored or failed ones).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename = "DOCUMENT_WRITE", rename_all = "camelCase")]
pub struct DocumentWriteEvent {
    /// Whether the write came from this process (`set`) or a remote ingest.
    pub is_local: bool,
    /// Whether the written document is now the latest live one at its path.
    pub is_latest: bool,
    pub document: Document,
}

/// Handle returned by `Store::on_write`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type WriteListener = Box<dyn Fn(&DocumentWriteEvent) + Send>;

/// Registry of write listeners. Lives under the store's mutex, so
/// registration and delivery serialize with writes.
pub(crate) struct WriteListeners {
    next_id: u64,
    entries: Vec<(ListenerId, WriteListener)>,
}

impl WriteListeners {
    pub(crate) fn new() -> Self {
        Self { next_id: 0, entries: Vec::new() }
    }

    pub(crate) fn add(&mut self, listener: WriteListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn publish(&self, event: &DocumentWriteEvent) {
        for (id, listener) in &self.entries {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(listener = id.0, "write listener panicked; skipping it");
            }
        }
    }
}
