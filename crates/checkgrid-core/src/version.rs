//! Release version ordering for `available_since_release` gates.
//!
//! Versions are split on `.` and `-`. Numeric components compare
//! numerically, non-numeric components lexicographically, and a numeric
//! component orders before a non-numeric one so the ordering stays total.
//! A missing component compares as `0`, which makes `9.0` equal `9.0.0`.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Component<'a> {
    Number(u64),
    Text(&'a str),
}

impl Ord for Component<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Number(a), Component::Number(b)) => a.cmp(b),
            (Component::Text(a), Component::Text(b)) => a.cmp(b),
            (Component::Number(_), Component::Text(_)) => Ordering::Less,
            (Component::Text(_), Component::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Component<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn components(version: &str) -> Vec<Component<'_>> {
    version
        .trim()
        .split(['.', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<u64>() {
            Ok(n) => Component::Number(n),
            Err(_) => Component::Text(part),
        })
        .collect()
}

/// Compare two release strings component-wise.
pub fn compare_releases(a: &str, b: &str) -> Ordering {
    let left = components(a);
    let right = components(b);
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).unwrap_or(&Component::Number(0));
        let r = right.get(i).unwrap_or(&Component::Number(0));
        match l.cmp(r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Whether `release` satisfies a minimum release gate.
pub fn release_at_least(release: &str, minimum: Option<&str>) -> bool {
    match minimum {
        Some(min) => compare_releases(release, min) != Ordering::Less,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_components_compare_numerically() {
        assert_eq!(compare_releases("9.0", "10.0"), Ordering::Less);
        assert_eq!(compare_releases("2014.2-6.1", "2014.2-6.0"), Ordering::Greater);
        assert_eq!(compare_releases("6.10", "6.9"), Ordering::Greater);
    }

    #[test]
    fn missing_components_are_zero() {
        assert_eq!(compare_releases("9.0", "9.0.0"), Ordering::Equal);
        assert_eq!(compare_releases("9", "9.0.1"), Ordering::Less);
    }

    #[test]
    fn text_components_compare_lexicographically() {
        assert_eq!(compare_releases("liberty-8.0", "mitaka-9.0"), Ordering::Less);
        assert_eq!(compare_releases("9.0.rc1", "9.0.rc2"), Ordering::Less);
    }

    #[test]
    fn numbers_order_before_text() {
        assert_eq!(compare_releases("9.0.1", "9.0.rc1"), Ordering::Less);
        // Stays transitive where a purely lexicographic fallback would cycle.
        assert_eq!(compare_releases("2", "10"), Ordering::Less);
        assert_eq!(compare_releases("10", "1a"), Ordering::Less);
        assert_eq!(compare_releases("2", "1a"), Ordering::Less);
    }

    #[test]
    fn gate_checks() {
        assert!(release_at_least("8.0", None));
        assert!(release_at_least("8.0", Some("8.0")));
        assert!(release_at_least("9.1", Some("8.0")));
        assert!(!release_at_least("7.0", Some("8.0")));
    }
}
