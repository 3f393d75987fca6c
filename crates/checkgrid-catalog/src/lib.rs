//! checkgrid-catalog: registry of test set profiles and the eligibility
//! resolver built on top of it.
//!
//! The catalog is read-only between reloads. A reload validates the whole
//! profile set first and then swaps the live snapshot in one step, so
//! readers observe either the old catalog or the new one, never a mix.

pub mod catalog;
pub mod error;
pub mod resolver;

pub use catalog::{Catalog, CatalogSnapshot, ProfileSource};
pub use error::{CatalogError, CatalogResult, DiscoveryError};
pub use resolver::{Resolution, Resolver};
