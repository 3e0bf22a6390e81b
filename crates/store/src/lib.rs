// driftwood-store: the per-workspace document store engine.
//
// Layering, leaves first: a driver owns raw persistence for one
// workspace (in-memory map-of-maps or a single-table SQLite backend);
// the store holds a driver plus the format validators and implements
// the last-write-wins merge, the query front-end, and the lifecycle;
// the async facade gives callers one asynchronous surface over the
// synchronous core.

pub mod driver;
pub mod error;
pub mod events;
pub mod facade;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;
