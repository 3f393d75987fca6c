//! Deployment tag expressions.
//!
//! A profile declares an ordered list of expressions. Every expression must
//! be satisfied (AND), and an expression is satisfied when at least one of
//! its `|`-separated alternatives is present in the cluster's tag set (OR).
//! Tags compare case-insensitively.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("empty tag expression")]
    Empty,
    #[error("empty alternative in tag expression {0:?}")]
    EmptyAlternative(String),
}

/// One `a|b|c` expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagExpr {
    alternatives: Vec<String>,
}

impl TagExpr {
    pub fn parse(raw: &str) -> Result<Self, TagError> {
        if raw.trim().is_empty() {
            return Err(TagError::Empty);
        }
        let mut alternatives = Vec::new();
        for alt in raw.split('|') {
            let alt = normalize_tag(alt);
            if alt.is_empty() {
                return Err(TagError::EmptyAlternative(raw.to_string()));
            }
            alternatives.push(alt);
        }
        Ok(Self { alternatives })
    }

    pub fn alternatives(&self) -> &[String] {
        &self.alternatives
    }

    pub fn is_satisfied_by(&self, tags: &DeploymentTags) -> bool {
        self.alternatives.iter().any(|alt| tags.contains(alt))
    }
}

impl TryFrom<String> for TagExpr {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TagExpr> for String {
    fn from(expr: TagExpr) -> Self {
        expr.to_string()
    }
}

impl fmt::Display for TagExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alternatives.join("|"))
    }
}

/// Whether every expression in `exprs` is satisfied. An empty list matches.
pub fn all_satisfied(exprs: &[TagExpr], tags: &DeploymentTags) -> bool {
    exprs.iter().all(|expr| expr.is_satisfied_by(tags))
}

/// Normalized tag set derived from a cluster state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentTags(BTreeSet<String>);

impl DeploymentTags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            tags.into_iter()
                .map(|t| normalize_tag(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}
