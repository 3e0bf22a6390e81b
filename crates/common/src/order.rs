// The two total orders used throughout the store.
//
// Both are deterministic across peers: the signature tiebreak is a pure
// function of document content, so replicas that hold the same documents
// agree on every ordering decision.

use std::cmp::Ordering;

use crate::document::Document;
use crate::query::Cursor;

/// History order: `path ASC, timestamp DESC, signature DESC`.
///
/// Within a path, the winning (latest) version sorts first. This is the
/// order of `documents()` listings and the order pagination cursors walk.
pub fn history_order(a: &Document, b: &Document) -> Ordering {
    a.path
        .cmp(&b.path)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
        .then_with(|| b.signature.cmp(&a.signature))
}

/// Path-then-author order: `path ASC, author ASC`, for multi-path listings
/// keyed by slot.
pub fn path_author_order(a: &Document, b: &Document) -> Ordering {
    a.path.cmp(&b.path).then_with(|| a.author.cmp(&b.author))
}

/// Position of `doc` relative to a pagination cursor under history order.
///
/// `Greater` means the document sorts strictly after the cursor and belongs
/// to the next page.
pub fn cursor_position(doc: &Document, cursor: &Cursor) -> Ordering {
    doc.path
        .cmp(&cursor.path)
        .then_with(|| cursor.timestamp.cmp(&doc.timestamp))
        .then_with(|| cursor.signature.cmp(&doc.signature))
}
