// Persistence drivers: raw storage for one workspace.
//
// A driver makes no policy decisions. It never validates documents,
// never touches timestamps, never emits events, and never decides
// accept-vs-ignore; all of that lives in the store above it. Its job is
// the primitive query/upsert/sweep/config surface, with expired
// documents excluded from every read.

use anyhow::Result;
use driftwood_common::document::Document;
use driftwood_common::query::Query;

mod memory;
mod sqlite;

pub use memory::MemoryDriver;
pub use sqlite::SqliteDriver;

pub trait StorageDriver: Send {
    /// One-time initialization for a workspace: ensure schema, read
    /// persistent state, reclaim already-expired documents. `now` is the
    /// store's clock in microseconds.
    fn begin(&mut self, workspace: &str, now: i64) -> Result<()>;

    /// Sorted unique authors over live documents.
    fn authors(&mut self, now: i64) -> Result<Vec<String>>;

    /// Sorted unique paths of live documents matching the query. `limit`
    /// applies to paths; `limit_bytes` is ignored here.
    fn query_paths(&mut self, query: &Query, now: i64) -> Result<Vec<String>> {
        let mut doc_query = query.clone();
        let limit = doc_query.limit.take();
        doc_query.limit_bytes = None;

        let docs = self.query_documents(&doc_query, now)?;
        let mut paths: Vec<String> = docs.into_iter().map(|doc| doc.path).collect();
        paths.sort();
        paths.dedup();
        if let Some(limit) = limit {
            paths.truncate(limit);
        }
        Ok(paths)
    }

    /// Live documents matching the query, in history order, limits applied.
    fn query_documents(&mut self, query: &Query, now: i64) -> Result<Vec<Document>>;

    /// Unconditional write for the document's `(path, author)` slot. The
    /// stored record is frozen; reads hand out copies, never references
    /// into mutable state.
    fn upsert_document(&mut self, doc: Document) -> Result<()>;

    /// Delete every document with `delete_after < now`. Returns how many
    /// were reclaimed.
    fn remove_expired_documents(&mut self, now: i64) -> Result<usize>;

    /// Untyped per-workspace key-value metadata, e.g. the schema version.
    fn set_config(&mut self, key: &str, value: &str) -> Result<()>;
    fn get_config(&mut self, key: &str) -> Result<Option<String>>;
    /// Returns whether the key existed.
    fn delete_config(&mut self, key: &str) -> Result<bool>;
    fn delete_all_config(&mut self) -> Result<()>;

    /// Release handles; with `delete`, also destroy the backing storage.
    fn close(&mut self, delete: bool) -> Result<()>;
}
