// Shared unit-test fixtures: a deterministic, non-cryptographic format
// validator plus document and store builders.

use std::sync::Arc;

use driftwood_common::document::{AuthorKeypair, Document};
use driftwood_common::error::ValidationError;
use driftwood_common::hash::{content_hash, sha256_base32};
use driftwood_common::validator::Validator;

use crate::driver::MemoryDriver;
use crate::store::Store;

pub(crate) const TEST_FORMAT: &str = "dw.test.1";
pub(crate) const WORKSPACE: &str = "+garden.abc123";

const MAX_FUTURE_SKEW_US: i64 = 10 * 60 * 1_000_000;

/// Validator for tests: real shape and hash-binding checks, but the
/// "signature" is a hash over the fields and the keypair secret instead
/// of actual cryptography. Deterministic, so LWW tiebreaks behave the
/// same as with a real signing scheme.
pub(crate) struct TestValidator;

impl TestValidator {
    pub(crate) fn arc() -> Arc<dyn Validator + Send + Sync> {
        Arc::new(TestValidator)
    }
}

impl Validator for TestValidator {
    fn format(&self) -> &'static str {
        TEST_FORMAT
    }

    fn check_workspace_is_valid(&self, workspace: &str) -> Result<(), ValidationError> {
        if workspace.starts_with('+') && workspace.contains('.') {
            Ok(())
        } else {
            Err(ValidationError::new(format!("invalid workspace address `{workspace}`")))
        }
    }

    fn check_timestamp_is_ok(
        &self,
        timestamp: i64,
        delete_after: Option<i64>,
        now: i64,
    ) -> Result<(), ValidationError> {
        if timestamp <= 0 {
            return Err(ValidationError::new("timestamp must be positive"));
        }
        if timestamp > now + MAX_FUTURE_SKEW_US {
            return Err(ValidationError::new("timestamp is too far in the future"));
        }
        if let Some(deadline) = delete_after {
            if deadline < timestamp {
                return Err(ValidationError::new("deleteAfter precedes the document timestamp"));
            }
        }
        Ok(())
    }

    fn check_document_is_valid(&self, doc: &Document, now: i64) -> Result<(), ValidationError> {
        if !doc.path.starts_with('/') {
            return Err(ValidationError::new("path must start with `/`"));
        }
        if !doc.author.starts_with('@') {
            return Err(ValidationError::new("author address must start with `@`"));
        }
        self.check_workspace_is_valid(&doc.workspace)?;
        self.check_timestamp_is_ok(doc.timestamp, doc.delete_after, now)?;
        if doc.is_expired(now) {
            return Err(ValidationError::new("ephemeral document has already expired"));
        }
        if doc.content_hash != content_hash(&doc.content) {
            return Err(ValidationError::new("content hash does not match content"));
        }
        if doc.signature.is_empty() {
            return Err(ValidationError::new("document is unsigned"));
        }
        Ok(())
    }

    fn sign_document(
        &self,
        keypair: &AuthorKeypair,
        mut doc: Document,
    ) -> Result<Document, ValidationError> {
        if doc.author != keypair.address {
            return Err(ValidationError::new("keypair does not match the document author"));
        }
        let material = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}",
            doc.format,
            doc.workspace,
            doc.path,
            doc.content_hash,
            doc.author,
            doc.timestamp,
            doc.delete_after.map(|d| d.to_string()).unwrap_or_default(),
            keypair.secret,
        );
        doc.signature = format!("sig.{}", &sha256_base32(material.as_bytes())[1..]);
        Ok(doc)
    }
}

pub(crate) fn keypair(name: &str) -> AuthorKeypair {
    AuthorKeypair { address: format!("@{name}.key1"), secret: format!("secret-{name}") }
}

/// A bare document for driver-level tests; no validator involved, so the
/// signature is an arbitrary deterministic marker.
pub(crate) fn raw_doc(path: &str, author: &str, timestamp: i64, content: &str) -> Document {
    Document {
        format: TEST_FORMAT.to_string(),
        workspace: WORKSPACE.to_string(),
        path: path.to_string(),
        content: content.to_string(),
        content_hash: content_hash(content),
        author: author.to_string(),
        timestamp,
        delete_after: None,
        signature: format!("sig.raw.{author}.{timestamp}"),
    }
}

/// A fully signed document, as a peer would hand it to `ingest_document`.
pub(crate) fn signed_doc(
    keypair: &AuthorKeypair,
    path: &str,
    timestamp: i64,
    content: &str,
    delete_after: Option<i64>,
) -> Document {
    let unsigned = Document {
        format: TEST_FORMAT.to_string(),
        workspace: WORKSPACE.to_string(),
        path: path.to_string(),
        content: content.to_string(),
        content_hash: content_hash(content),
        author: keypair.address.clone(),
        timestamp,
        delete_after,
        signature: String::new(),
    };
    TestValidator.sign_document(keypair, unsigned).expect("test document should sign")
}

/// A fresh memory-backed store for the test workspace.
pub(crate) fn memory_store() -> Store {
    Store::new(Box::new(MemoryDriver::new()), vec![TestValidator::arc()], WORKSPACE)
        .expect("test store should open")
}
