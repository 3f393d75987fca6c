//! checkgrid-state: durable store for checkgrid.
//!
//! Backed by [redb](https://docs.rs/redb), persists test runs, their
//! per-test records, cluster state snapshots, and catalog load history.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Zero-padded composite keys (`{run_id:020}:{position:05}`) keep related
//! records adjacent and in declaration order for range scans.
//!
//! The schema evolves through a strictly linear chain of additive
//! migrations (see [`migrations`]); [`StateStore::open`] upgrades to head.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StateError::$variant(e.to_string())
    };
}

pub mod error;
pub mod migrations;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
