// Support for the integration suites: a deterministic test validator
// and builders that only go through the public API.

use std::path::Path;
use std::sync::Arc;

use driftwood_common::document::{AuthorKeypair, Document};
use driftwood_common::error::ValidationError;
use driftwood_common::hash::{content_hash, sha256_base32};
use driftwood_common::validator::Validator;
use driftwood_store::driver::{MemoryDriver, SqliteDriver};
use driftwood_store::store::Store;

pub const TEST_FORMAT: &str = "dw.test.1";
pub const WORKSPACE: &str = "+garden.abc123";

const MAX_FUTURE_SKEW_US: i64 = 10 * 60 * 1_000_000;

/// Non-cryptographic validator: full shape and hash-binding checks, with
/// a deterministic fields-plus-secret hash standing in for a signature.
pub struct TestValidator;

impl TestValidator {
    pub fn arc() -> Arc<dyn Validator + Send + Sync> {
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

pub fn keypair(name: &str) -> AuthorKeypair {
    AuthorKeypair { address: format!("@{name}.key1"), secret: format!("secret-{name}") }
}

/// Sign a document the way a remote peer would before handing it to
/// `ingest_document`.
pub fn signed_doc(
    keypair: &AuthorKeypair,
    workspace: &str,
    path: &str,
    timestamp: i64,
    content: &str,
    delete_after: Option<i64>,
) -> Document {
    let unsigned = Document {
        format: TEST_FORMAT.to_string(),
        workspace: workspace.to_string(),
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

pub fn memory_store() -> Store {
    Store::new(Box::new(MemoryDriver::new()), vec![TestValidator::arc()], WORKSPACE)
        .expect("memory store should open")
}

pub fn sqlite_store(db_path: &Path) -> Store {
    let driver = SqliteDriver::open(db_path).expect("sqlite database should open");
    Store::new(Box::new(driver), vec![TestValidator::arc()], WORKSPACE)
        .expect("sqlite store should open")
}

/// Run a scenario against both driver variants.
pub fn with_each_driver(scenario: impl Fn(Store)) {
    scenario(memory_store());

    let tmp = tempfile::TempDir::new().expect("tempdir should be created");
    scenario(sqlite_store(&tmp.path().join("docs.db")));
}
