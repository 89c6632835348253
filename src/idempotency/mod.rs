//! Idempotency Coordinator - at-most-once command execution per key.
//!
//! ## Example
//!
//! ```ignore
//! let coordinator = IdempotencyCoordinator::new(HashMapIdempotencyStore::new());
//!
//! let first = coordinator.execute("req-42", || create_country())?;
//! let again = coordinator.execute("req-42", || create_country())?; // not invoked
//! assert_eq!(first, again);
//! ```

mod command;
mod coordinator;
mod record;

pub use command::{Command, CommandResult};
pub use coordinator::{IdempotencyCoordinator, IdempotencyError};
pub use record::{BeginOutcome, IdempotencyRecord, IdempotencyStore, RecordState};
