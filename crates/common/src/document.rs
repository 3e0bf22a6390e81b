// Core document model: signed, immutable records addressed by (path, author).

use serde::{Deserialize, Serialize};

/// A signed document within a workspace.
///
/// Documents are immutable once signed. A later write to the same
/// `(path, author)` slot supersedes the whole record; nothing is ever
/// edited in place. Empty `content` is a tombstone and participates in
/// ordering like any other value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Short format identifier; selects the validator for this document.
    pub format: String,
    /// Workspace address this document belongs to.
    pub workspace: String,
    /// Hierarchical identifier within the workspace, e.g. `/wiki/shared/garden`.
    pub path: String,
    /// UTF-8 content. Empty string means "deleted".
    pub content: String,
    /// Multibase base32 SHA-256 of `content`, bound by the signature.
    pub content_hash: String,
    /// Public-key address of the author.
    pub author: String,
    /// Microseconds since the Unix epoch.
    pub timestamp: i64,
    /// If set, the document expires strictly after this instant (microseconds).
    pub delete_after: Option<i64>,
    /// Signature over all other fields, computed by the format's validator.
    pub signature: String,
}

impl Document {
    /// An ephemeral document carries a `delete_after` expiry instant.
    pub fn is_ephemeral(&self) -> bool {
        self.delete_after.is_some()
    }

    /// A document is live while `now <= delete_after` and expired thereafter.
    pub fn is_expired(&self, now: i64) -> bool {
        self.delete_after.is_some_and(|deadline| deadline < now)
    }

    /// Whether this document wins the slot against `other` under the
    /// `(timestamp, signature)` lexicographic order.
    ///
    /// Equal documents do not supersede each other, which is what makes
    /// repeated ingestion idempotent.
    pub fn supersedes(&self, other: &Document) -> bool {
        (self.timestamp, self.signature.as_str()) > (other.timestamp, other.signature.as_str())
    }

    /// UTF-8 byte length of `content`.
    pub fn content_size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// An author identity: public address plus signing secret.
///
/// The secret is only ever handed to a validator's `sign_document`; the
/// store itself never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorKeypair {
    pub address: String,
    pub secret: String,
}
