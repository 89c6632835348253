//! In-memory backends, shared across clones via `Arc`.

mod idempotency;
mod store;

pub use idempotency::HashMapIdempotencyStore;
pub use store::HashMapStore;
