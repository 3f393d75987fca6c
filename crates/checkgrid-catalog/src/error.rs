//! Catalog error types.

use std::path::PathBuf;

use thiserror::Error;

/// A profile source failed validation. The previous catalog stays live.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("malformed profile {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid {kind} id: {id:?}")]
    InvalidId { kind: &'static str, id: String },

    #[error("duplicate test set id: {0}")]
    DuplicateTestSet(String),

    #[error("duplicate test id {test} in test set {set}")]
    DuplicateTest { set: String, test: String },

    #[error("test set {0} has an empty test_path")]
    EmptyTestPath(String),

    #[error("test set {set} excludes unknown test set {target}")]
    UnknownExclusion { set: String, target: String },

    #[error("test set {0} excludes itself")]
    SelfExclusion(String),

    #[error("invalid id pattern: {0}")]
    Pattern(String),

    #[error("failed to fingerprint catalog: {0}")]
    Fingerprint(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("test set not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
