// Error taxonomy of the store surface.

use driftwood_common::error::ValidationError;
use thiserror::Error;

/// Everything a store operation can fail with. The store never retries;
/// every failure surfaces to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A validator rejected the document or workspace, the format had no
    /// validator, or an ingest crossed workspaces.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Operation called after `close`. A caller bug; propagate it.
    #[error("store is closed")]
    Closed,

    /// The driver's backend failed (I/O, schema mismatch). The critical
    /// section is a single driver call, so state stays consistent.
    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Outcome of a write submission that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The document won its `(path, author)` slot and was stored.
    Accepted,
    /// An equal-or-newer document already held the slot; nothing was
    /// written and no event was published.
    Ignored,
}
