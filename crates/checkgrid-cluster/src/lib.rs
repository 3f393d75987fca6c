//! checkgrid-cluster: per-cluster deployment metadata.
//!
//! The [`ClusterStateCache`] refreshes snapshots from a [`MetadataSource`]
//! and keeps the last good snapshot of every cluster, both in memory and in
//! the state store, so a failed refresh never erases what was known.

pub mod cache;
pub mod error;
pub mod source;

pub use cache::ClusterStateCache;
pub use error::{ClusterStateFetchError, FetchResult};
pub use source::{ClusterMetadata, HttpMetadataSource, MetadataSource, StaticMetadataSource};
