//! Structural differences between two JSON values.
//!
//! Differences are keyed by a JSON path such as `$.items[2].name`, so a report
//! points straight at the part of the payload that moved.

use std::fmt::Display;

use serde_json::Value as JsonValue;

/// One difference between an expected and an actual value
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Present in the expected value only
    Missing { path: String, expected: JsonValue },

    /// Present in the actual value only
    Unexpected { path: String, actual: JsonValue },

    /// Present in both with different values
    Changed {
        path: String,
        expected: JsonValue,
        actual: JsonValue,
    },
}

impl Diff {
    pub fn path(&self) -> &str {
        match self {
            Diff::Missing { path, .. } | Diff::Unexpected { path, .. } | Diff::Changed { path, .. } => {
                path
            }
        }
    }
}

impl Display for Diff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diff::Missing { path, expected } => write!(f, "- {}: {}", path, expected),
            Diff::Unexpected { path, actual } => write!(f, "+ {}: {}", path, actual),
            Diff::Changed {
                path,
                expected,
                actual,
            } => write!(f, "~ {}: {} -> {}", path, expected, actual),
        }
    }
}

/// Every difference between `expected` and `actual`, in document order
///
/// Object key order is not a difference.
pub fn diff(expected: &JsonValue, actual: &JsonValue) -> Vec<Diff> {
    let mut diffs = Vec::new();
    collect("$".to_string(), expected, actual, &mut diffs);
    diffs
}

fn collect(path: String, expected: &JsonValue, actual: &JsonValue, diffs: &mut Vec<Diff>) {
    match (expected, actual) {
        (JsonValue::Object(left), JsonValue::Object(right)) => {
            for (key, value) in left {
                let child = format!("{}.{}", path, key);
                match right.get(key) {
                    Some(other) => collect(child, value, other, diffs),
                    None => diffs.push(Diff::Missing {
                        path: child,
                        expected: value.clone(),
                    }),
                }
            }
            for (key, value) in right.iter().filter(|(key, _)| !left.contains_key(*key)) {
                diffs.push(Diff::Unexpected {
                    path: format!("{}.{}", path, key),
                    actual: value.clone(),
                });
            }
        }
        (JsonValue::Array(left), JsonValue::Array(right)) => {
            for index in 0..left.len().max(right.len()) {
                let child = format!("{}[{}]", path, index);
                match (left.get(index), right.get(index)) {
                    (Some(a), Some(b)) => collect(child, a, b, diffs),
                    (Some(a), None) => diffs.push(Diff::Missing {
                        path: child,
                        expected: a.clone(),
                    }),
                    (None, Some(b)) => diffs.push(Diff::Unexpected {
                        path: child,
                        actual: b.clone(),
                    }),
                    (None, None) => {}
                }
            }
        }
        _ if expected != actual => diffs.push(Diff::Changed {
            path,
            expected: expected.clone(),
            actual: actual.clone(),
        }),
        _ => {}
    }
}
