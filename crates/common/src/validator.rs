// The validator capability consumed by the store.
//
// A validator owns one document format: it checks well-formedness of
// documents and workspace addresses, bounds timestamps, and signs
// locally-authored documents. Cryptographic implementations live
// upstream; the store treats validators as black boxes and never looks
// inside signatures itself.

use crate::document::{AuthorKeypair, Document};
use crate::error::ValidationError;

pub trait Validator {
    /// The format identifier this validator accepts, e.g. `dw.1`.
    fn format(&self) -> &'static str;

    /// Check a workspace address, e.g. at store construction.
    fn check_workspace_is_valid(&self, workspace: &str) -> Result<(), ValidationError>;

    /// Bounds-check a timestamp (and expiry instant, if any) against `now`.
    fn check_timestamp_is_ok(
        &self,
        timestamp: i64,
        delete_after: Option<i64>,
        now: i64,
    ) -> Result<(), ValidationError>;

    /// Full document check: shape, hash binding, timestamp, signature.
    /// Every stored document passed this for some validator bound to the
    /// store that holds it.
    fn check_document_is_valid(&self, doc: &Document, now: i64) -> Result<(), ValidationError>;

    /// Sign an unsigned document (empty `signature` field) on behalf of
    /// `keypair`. Returns the signed document; the input is consumed so a
    /// half-signed record can't escape.
    fn sign_document(
        &self,
        keypair: &AuthorKeypair,
        doc: Document,
    ) -> Result<Document, ValidationError>;
}
