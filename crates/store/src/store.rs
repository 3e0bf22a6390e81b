// The workspace-scoped store engine.
//
// One store owns one driver and a set of format validators, all bound to
// a single workspace address. The ingestion merge rule is last-write-wins
// per (path, author) slot with a deterministic (timestamp, signature)
// tiebreak, so every peer that ingests the same set of signed documents
// converges to the same observable state regardless of arrival order.
//
// The predecessor read, the upsert, and the latest check form one atomic
// step under the store mutex; write events are delivered under the same
// mutex, in the order writes are accepted. Listeners therefore must not
// call back into the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use chrono::Utc;
use driftwood_common::document::{AuthorKeypair, Document};
use driftwood_common::error::ValidationError;
use driftwood_common::hash::content_hash;
use driftwood_common::query::{HistoryMode, Query};
use driftwood_common::validator::Validator;

use crate::driver::StorageDriver;
use crate::error::{StoreError, WriteOutcome};
use crate::events::{DocumentWriteEvent, ListenerId, WriteListeners};

/// Caller's input to `set`: the fields of a document the store doesn't
/// fill in itself.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocToSet {
    pub format: String,
    pub path: String,
    pub content: String,
    /// Microseconds. `None` (or `0`) means "now", bumped above the
    /// current latest at the path so this write wins its slot.
    pub timestamp: Option<i64>,
    /// Expiry instant in microseconds. Under a bumped timestamp the
    /// duration `delete_after - now` is preserved, not the instant.
    pub delete_after: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CloseOptions {
    /// Also destroy the backing storage.
    pub delete: bool,
}

struct StoreInner {
    driver: Box<dyn StorageDriver>,
    listeners: WriteListeners,
}

pub struct Store {
    workspace: String,
    validators: HashMap<String, Arc<dyn Validator + Send + Sync>>,
    inner: Mutex<StoreInner>,
    /// Test override for "now" in microseconds; `None` means wall clock.
    clock: Mutex<Option<i64>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("workspace", &self.workspace)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Bind a driver and validators to one workspace and initialize the
    /// driver. Fails if no validator is given, if every validator rejects
    /// the workspace address (first rejection message wins), on duplicate
    /// formats, or if driver initialization fails.
    pub fn new(
        driver: Box<dyn StorageDriver>,
        validators: Vec<Arc<dyn Validator + Send + Sync>>,
        workspace: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let workspace = workspace.into();

        if validators.is_empty() {
            return Err(ValidationError::new("at least one validator is required").into());
        }

        let mut accepted = false;
        let mut first_rejection: Option<ValidationError> = None;
        for validator in &validators {
            match validator.check_workspace_is_valid(&workspace) {
                Ok(()) => accepted = true,
                Err(err) => {
                    if first_rejection.is_none() {
                        first_rejection = Some(err);
                    }
                }
            }
        }
        if !accepted {
            let err = first_rejection.unwrap_or_else(|| {
                ValidationError::new("workspace address was not accepted by any validator")
            });
            return Err(err.into());
        }

        let mut by_format: HashMap<String, Arc<dyn Validator + Send + Sync>> = HashMap::new();
        for validator in validators {
            let format = validator.format().to_string();
            if by_format.insert(format.clone(), validator).is_some() {
                return Err(ValidationError::new(format!(
                    "duplicate validator for format `{format}`"
                ))
                .into());
            }
        }

        let mut driver = driver;
        driver.begin(&workspace, Utc::now().timestamp_micros())?;

        Ok(Self {
            workspace,
            validators: by_format,
            inner: Mutex::new(StoreInner { driver, listeners: WriteListeners::new() }),
            clock: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Override the store's clock (microseconds) for tests; `None`
    /// restores the wall clock.
    pub fn set_clock(&self, now: Option<i64>) {
        let mut clock = match self.clock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *clock = now;
    }

    fn now(&self) -> i64 {
        let clock = match self.clock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        clock.unwrap_or_else(|| Utc::now().timestamp_micros())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend(anyhow!("store state poisoned by an earlier panic")))
    }

    fn validator_for(
        &self,
        format: &str,
    ) -> Result<&Arc<dyn Validator + Send + Sync>, StoreError> {
        self.validators.get(format).ok_or_else(|| {
            StoreError::Validation(ValidationError::new(format!(
                "no validator registered for format `{format}`"
            )))
        })
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Sorted distinct authors of live documents.
    pub fn authors(&self) -> Result<Vec<String>, StoreError> {
        self.ensure_open()?;
        let now = self.now();
        let mut inner = self.lock_inner()?;
        Ok(inner.driver.authors(now)?)
    }

    /// Sorted unique paths of documents matching the query; `limit`
    /// applies to paths, `limit_bytes` is ignored.
    pub fn paths(&self, query: &Query) -> Result<Vec<String>, StoreError> {
        self.ensure_open()?;
        let now = self.now();
        let mut inner = self.lock_inner()?;
        Ok(inner.driver.query_paths(query, now)?)
    }

    /// Documents matching the query, in history order, limits applied.
    pub fn documents(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.ensure_open()?;
        let now = self.now();
        let mut inner = self.lock_inner()?;
        Ok(inner.driver.query_documents(query, now)?)
    }

    /// The content of each matching document, same order as `documents`.
    pub fn contents(&self, query: &Query) -> Result<Vec<String>, StoreError> {
        Ok(self.documents(query)?.into_iter().map(|doc| doc.content).collect())
    }

    /// The latest live document at a path, if any.
    pub fn get_document(&self, path: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_open()?;
        let now = self.now();
        let mut inner = self.lock_inner()?;
        Ok(inner.driver.query_documents(&Query::latest_at_path(path), now)?.into_iter().next())
    }

    /// The content of the latest live document at a path, if any.
    pub fn get_content(&self, path: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get_document(path)?.map(|doc| doc.content))
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Merge one signed document into the store.
    ///
    /// The document must validate under the validator for its format and
    /// belong to this store's workspace. It is then accepted iff it
    /// strictly supersedes the live document in its `(path, author)`
    /// slot (an expired occupant counts as absent); otherwise the ingest
    /// is `Ignored` and nothing changes. Accepted writes are published to
    /// write listeners before this method returns.
    pub fn ingest_document(
        &self,
        doc: Document,
        is_local: bool,
    ) -> Result<WriteOutcome, StoreError> {
        self.ensure_open()?;
        let validator = self.validator_for(&doc.format)?;
        let now = self.now();

        validator.check_document_is_valid(&doc, now)?;
        if doc.workspace != self.workspace {
            return Err(ValidationError::new(format!(
                "document workspace `{}` does not match store workspace `{}`",
                doc.workspace, self.workspace
            ))
            .into());
        }

        let mut inner = self.lock_inner()?;

        let slot_query = Query {
            path: Some(doc.path.clone()),
            author: Some(doc.author.clone()),
            history: Some(HistoryMode::All),
            ..Query::default()
        };
        let predecessor = inner.driver.query_documents(&slot_query, now)?.into_iter().next();
        if let Some(predecessor) = predecessor {
            if !doc.supersedes(&predecessor) {
                return Ok(WriteOutcome::Ignored);
            }
        }

        inner.driver.upsert_document(doc.clone())?;

        let latest =
            inner.driver.query_documents(&Query::latest_at_path(doc.path.clone()), now)?;
        let is_latest = latest.first() == Some(&doc);

        tracing::debug!(
            path = %doc.path,
            author = %doc.author,
            is_local,
            is_latest,
            "document write accepted"
        );
        let event = DocumentWriteEvent { is_local, is_latest, document: doc };
        inner.listeners.publish(&event);

        Ok(WriteOutcome::Accepted)
    }

    /// Author a document locally: fill in workspace and content hash,
    /// resolve the timestamp, have the validator sign it, and ingest it.
    ///
    /// With an omitted (or zero) timestamp, the write is stamped "now"
    /// and bumped above the current latest at the path, so a local
    /// author's new write always supersedes what they can currently see
    /// even within one clock tick. An explicitly given timestamp is
    /// bounds-checked by the validator instead and never bumped.
    pub fn set(
        &self,
        keypair: &AuthorKeypair,
        input: DocToSet,
    ) -> Result<WriteOutcome, StoreError> {
        self.ensure_open()?;
        let validator = self.validator_for(&input.format)?;
        let now = self.now();

        let should_bump = matches!(input.timestamp, None | Some(0));
        let mut timestamp = match input.timestamp {
            None | Some(0) => now,
            Some(explicit) => explicit,
        };
        let mut delete_after = input.delete_after;

        if should_bump {
            // The caller asked for a duration, not an instant: remember
            // it relative to "now" and re-anchor after the bump.
            let lifespan = delete_after.map(|deadline| deadline - timestamp);
            if let Some(latest) = self.get_document(&input.path)? {
                timestamp = timestamp.max(latest.timestamp + 1);
            }
            if let Some(lifespan) = lifespan {
                delete_after = Some(timestamp + lifespan);
            }
        } else {
            validator.check_timestamp_is_ok(timestamp, delete_after, now)?;
        }

        let unsigned = Document {
            format: input.format,
            workspace: self.workspace.clone(),
            path: input.path,
            content_hash: content_hash(&input.content),
            content: input.content,
            author: keypair.address.clone(),
            timestamp,
            delete_after,
            signature: String::new(),
        };
        let signed = validator.sign_document(keypair, unsigned)?;

        self.ingest_document(signed, true)
    }

    /// Delete every expired document. Returns how many were reclaimed.
    pub fn remove_expired_documents(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let now = self.now();
        let mut inner = self.lock_inner()?;
        Ok(inner.driver.remove_expired_documents(now)?)
    }

    // ── Config pass-through ─────────────────────────────────────────

    pub fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut inner = self.lock_inner()?;
        Ok(inner.driver.set_config(key, value)?)
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_open()?;
        let mut inner = self.lock_inner()?;
        Ok(inner.driver.get_config(key)?)
    }

    pub fn delete_config(&self, key: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let mut inner = self.lock_inner()?;
        Ok(inner.driver.delete_config(key)?)
    }

    pub fn delete_all_config(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut inner = self.lock_inner()?;
        Ok(inner.driver.delete_all_config()?)
    }

    // ── Events ──────────────────────────────────────────────────────

    /// Register a write listener. Delivery is synchronous, in write
    /// order, under the store's serialization; listeners must not call
    /// back into the store.
    pub fn on_write<F>(&self, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(&DocumentWriteEvent) + Send + 'static,
    {
        self.ensure_open()?;
        let mut inner = self.lock_inner()?;
        Ok(inner.listeners.add(Box::new(listener)))
    }

    /// Unsubscribe a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> Result<bool, StoreError> {
        let mut inner = self.lock_inner()?;
        Ok(inner.listeners.remove(id))
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Close the store and release the driver. Closing an already-closed
    /// store is a no-op. With `delete`, the backing storage is destroyed.
    pub fn close(&self, options: CloseOptions) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut inner = self.lock_inner()?;
        inner.driver.close(options.delete)?;
        tracing::info!(workspace = %self.workspace, deleted = options.delete, "store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
