pub mod config;
pub mod tags;
pub mod types;
pub mod version;

pub use config::{parse_duration, CheckgridConfig};
pub use tags::{DeploymentTags, TagExpr};
pub use types::*;
pub use version::{compare_releases, release_at_least};
