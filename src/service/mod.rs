//! Reference-data service - idempotent commands over tenant repositories.
//!
//! ## Quick Start
//!
//! ```ignore
//! let service = ReferenceService::new(HashMapStore::new(), HashMapIdempotencyStore::new());
//!
//! let result = service.create("acme", "req-42", Country::new("US", "United States"))?;
//! let receipt: Receipt = result.decode()?;
//! assert_eq!(receipt.version, 1);
//! ```

mod reference;

pub use reference::{Receipt, ReferenceService};
