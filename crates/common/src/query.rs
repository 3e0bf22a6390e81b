// Query language: sparse selector records, canonicalization, and the
// post-filter pipeline shared by every driver.
//
// A query is a record of optional selectors; unset selectors don't
// constrain. Drivers prefilter candidates however their backend allows
// (the expiry bound and path selectors are always safe to push down),
// then hand the live candidates to `finish_query` for the fold, the
// remaining predicate, pagination, and limits.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::order::{cursor_position, history_order};

/// Whether a query folds each path down to its latest live document or
/// returns every stored version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Keep only the winning `(timestamp, signature)` document per path.
    #[default]
    Latest,
    /// Keep every live version (one per author) of every path.
    All,
}

/// Pagination cursor: a position under history order. Results resume at
/// the first document strictly after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub path: String,
    pub timestamp: i64,
    pub signature: String,
}

impl Cursor {
    /// Cursor pointing at an already-returned document; the next page
    /// starts just after it.
    pub fn after(doc: &Document) -> Self {
        Self {
            path: doc.path.clone(),
            timestamp: doc.timestamp,
            signature: doc.signature.clone(),
        }
    }
}

/// A sparse document query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    /// Exact path match.
    pub path: Option<String>,
    /// Path starts with this string.
    pub path_prefix: Option<String>,
    /// Exact timestamp match (microseconds).
    pub timestamp: Option<i64>,
    /// Strict lower timestamp bound.
    pub timestamp_gt: Option<i64>,
    /// Strict upper timestamp bound.
    pub timestamp_lt: Option<i64>,
    /// Exact author match.
    pub author: Option<String>,
    /// Exact UTF-8 byte length of content.
    pub content_size: Option<u64>,
    /// Strict lower bound on content byte length.
    pub content_size_gt: Option<u64>,
    /// Strict upper bound on content byte length.
    pub content_size_lt: Option<u64>,
    /// Latest-per-path fold vs full history. Defaults to `Latest`.
    pub history: Option<HistoryMode>,
    /// Cap on returned documents (or paths, for path listings).
    pub limit: Option<usize>,
    /// Cap on cumulative UTF-8 content bytes of returned documents.
    pub limit_bytes: Option<u64>,
    /// Resume strictly after this position under history order.
    pub continue_after: Option<Cursor>,
}

impl Query {
    /// Query for every version at one path.
    pub fn at_path(path: impl Into<String>) -> Self {
        Self { path: Some(path.into()), history: Some(HistoryMode::All), ..Self::default() }
    }

    /// Query for the single latest live document at one path.
    pub fn latest_at_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            history: Some(HistoryMode::Latest),
            limit: Some(1),
            ..Self::default()
        }
    }

    /// Canonicalize: fill in defaults and detect contradictions.
    pub fn clean_up(&self) -> CleanQuery {
        let mut query = self.clone();
        if query.history.is_none() {
            query.history = Some(HistoryMode::Latest);
        }
        let matches_nothing = query.is_contradictory();
        CleanQuery { query, matches_nothing }
    }

    /// Whether a (live) document satisfies every set selector. Fold,
    /// pagination, and limits are not part of the predicate.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(path) = &self.path {
            if doc.path != *path {
                return false;
            }
        }
        if let Some(prefix) = &self.path_prefix {
            if !doc.path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(timestamp) = self.timestamp {
            if doc.timestamp != timestamp {
                return false;
            }
        }
        if let Some(bound) = self.timestamp_gt {
            if doc.timestamp <= bound {
                return false;
            }
        }
        if let Some(bound) = self.timestamp_lt {
            if doc.timestamp >= bound {
                return false;
            }
        }
        if let Some(author) = &self.author {
            if doc.author != *author {
                return false;
            }
        }
        let size = doc.content_size();
        if let Some(exact) = self.content_size {
            if size != exact {
                return false;
            }
        }
        if let Some(bound) = self.content_size_gt {
            if size <= bound {
                return false;
            }
        }
        if let Some(bound) = self.content_size_lt {
            if size >= bound {
                return false;
            }
        }
        true
    }

    fn is_contradictory(&self) -> bool {
        if self.limit == Some(0) || self.limit_bytes == Some(0) {
            return true;
        }
        if let (Some(path), Some(prefix)) = (&self.path, &self.path_prefix) {
            if !path.starts_with(prefix.as_str()) {
                return true;
            }
        }
        if let (Some(exact), Some(bound)) = (self.timestamp, self.timestamp_gt) {
            if exact <= bound {
                return true;
            }
        }
        if let (Some(exact), Some(bound)) = (self.timestamp, self.timestamp_lt) {
            if exact >= bound {
                return true;
            }
        }
        if let (Some(lower), Some(upper)) = (self.timestamp_gt, self.timestamp_lt) {
            // Strict bounds: empty unless some integer fits between them.
            if lower.saturating_add(1) >= upper {
                return true;
            }
        }
        if let (Some(exact), Some(bound)) = (self.content_size, self.content_size_gt) {
            if exact <= bound {
                return true;
            }
        }
        if let (Some(exact), Some(bound)) = (self.content_size, self.content_size_lt) {
            if exact >= bound {
                return true;
            }
        }
        if let (Some(lower), Some(upper)) = (self.content_size_gt, self.content_size_lt) {
            if lower.saturating_add(1) >= upper {
                return true;
            }
        }
        false
    }
}

/// A canonicalized query: `history` is always set, and contradictory
/// selector combinations are flagged instead of reaching the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanQuery {
    pub query: Query,
    pub matches_nothing: bool,
}

/// Shared tail of every document query.
///
/// `candidates` must already be restricted to live (non-expired)
/// documents; expiry is the driver's side of the contract. Sorts into
/// history order, folds to latest-per-path when requested, applies the
/// remaining predicate, then pagination and both limits.
pub fn finish_query(mut candidates: Vec<Document>, clean: &CleanQuery) -> Vec<Document> {
    if clean.matches_nothing {
        return Vec::new();
    }
    let query = &clean.query;

    candidates.sort_by(history_order);

    if query.history != Some(HistoryMode::All) {
        // Sorted by history order, the first document of each path run is
        // that path's winner.
        let mut heads: Vec<Document> = Vec::with_capacity(candidates.len());
        for doc in candidates {
            if heads.last().map_or(true, |prev| prev.path != doc.path) {
                heads.push(doc);
            }
        }
        candidates = heads;
    }

    candidates.retain(|doc| query.matches(doc));

    if let Some(cursor) = &query.continue_after {
        candidates.retain(|doc| cursor_position(doc, cursor) == Ordering::Greater);
    }

    let mut out = Vec::new();
    let mut content_bytes: u64 = 0;
    for doc in candidates {
        if let Some(limit) = query.limit {
            if out.len() >= limit {
                break;
            }
        }
        if let Some(byte_limit) = query.limit_bytes {
            let size = doc.content_size();
            if content_bytes.saturating_add(size) > byte_limit {
                break;
            }
            // A tombstone exactly at the limit is excluded too, so a full
            // page never trails an unbounded run of empty documents.
            if size == 0 && content_bytes >= byte_limit {
                break;
            }
            content_bytes += size;
        }
        out.push(doc);
    }
    out
}
