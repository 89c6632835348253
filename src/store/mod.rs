//! Optimistic-concurrency store for reference entities.
//!
//! [`EntityStore`] is the backend seam; [`TenantRepository`] layers
//! validation, version bookkeeping, soft deletes, event emission and error
//! classification on top of it.
//!
//! ## Example
//!
//! ```ignore
//! let store = HashMapStore::new();
//! let countries = store.tenant::<Country>("acme");
//!
//! let us = countries.create(Country::new("US", "United States"))?;
//! let renamed = us.with_data(Country::new("US", "United States of America"));
//! let us = countries.update(&renamed, us.version)?; // version 2
//! ```

mod backend;
mod entity;
mod repository;
pub mod validation;

pub use backend::{EntityStore, RowWrite, StoredRow};
pub use entity::{ReferenceEntity, RowReference, VersionedEntity};
pub use repository::{TenantExt, TenantRepository};
pub use validation::{FieldSpec, Validate};
