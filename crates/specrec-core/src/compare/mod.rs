//! Response comparison.
//!
//! A live payload is compared with a recorded fixture in one of three modes:
//! by value (ignoring the response's ignore-paths), by type (every leaf
//! replaced with its type name), or against the response schema declared in
//! the document. [`classify`] chains the first two to grade how far a new
//! recording drifted from the fixture it would replace.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use specrec_core::compare::{classify, MatchKind};
//!
//! let fixture = json!({ "a": "abc", "b": { "c": "random-key" } });
//! let live = json!({ "b": { "c": "another-random-key" }, "a": "abc" });
//! assert_eq!(classify(&fixture, &live, &["b.c".to_string()]), MatchKind::Inexact);
//! ```

pub mod diff;

pub use diff::{diff, Diff};

// Internal imports (std, crate)
use std::fmt::Display;

use crate::openapi::{to_json_schema, ValidatedSpec};

// External imports (alphabetized)
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

static PATH_SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^.\[\]]+)|\[(\d+)\]").unwrap());

/// How `compare` judges a live payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Equal values, ignoring the ignore-paths
    #[default]
    Value,
    /// Same shape and leaf types
    Type,
    /// Valid against the declared response schema
    Schema,
}

impl Display for CompareMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareMode::Value => write!(f, "value"),
            CompareMode::Type => write!(f, "type"),
            CompareMode::Schema => write!(f, "schema"),
        }
    }
}

/// How closely a new payload matches a fixture, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Inexact,
    Type,
    NoMatch,
}

impl Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "exact"),
            MatchKind::Inexact => write!(f, "inexact"),
            MatchKind::Type => write!(f, "type"),
            MatchKind::NoMatch => write!(f, "nomatch"),
        }
    }
}

/// Deep equality; object key order does not matter
pub fn compare_by_value(expected: &JsonValue, actual: &JsonValue) -> bool {
    expected == actual
}

/// Deep equality after removing `ignore_paths` from both sides
pub fn compare_by_value_ignoring_paths(
    expected: &JsonValue,
    actual: &JsonValue,
    ignore_paths: &[String],
) -> bool {
    omit_paths(expected, ignore_paths) == omit_paths(actual, ignore_paths)
}

/// Equality of shape and leaf types after removing `ignore_paths`
pub fn compare_by_type(expected: &JsonValue, actual: &JsonValue, ignore_paths: &[String]) -> bool {
    to_type_shape(&omit_paths(expected, ignore_paths)) == to_type_shape(&omit_paths(actual, ignore_paths))
}

/// Validate `actual` against the schema of the operation serving `method url`
///
/// Returns the problems found; an empty list means the payload conforms. A
/// response that declares no JSON body accepts any payload.
pub fn compare_to_schema(
    spec: &ValidatedSpec,
    method: &str,
    url: &str,
    status: u16,
    actual: &JsonValue,
) -> Vec<String> {
    let schema = match spec
        .find_operation(method, url)
        .and_then(|matched| matched.response_schema(status).map(|schema| schema.cloned()))
    {
        Ok(Some(schema)) => with_components(to_json_schema(&schema), spec),
        Ok(None) => return Vec::new(),
        Err(e) => return vec![e.to_string()],
    };

    let compiled = match JSONSchema::options()
        .with_draft(Draft::Draft4)
        .compile(&schema)
    {
        Ok(compiled) => compiled,
        Err(e) => return vec![format!("Invalid response schema: {}", e)],
    };

    let problems = match compiled.validate(actual) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect(),
    };
    problems
}

/// Carry the document's `components` so references left in recursive schemas resolve
fn with_components(mut schema: JsonValue, spec: &ValidatedSpec) -> JsonValue {
    if let (Some(root), Some(components)) = (schema.as_object_mut(), spec.as_json().get("components")) {
        if !root.contains_key("components") {
            root.insert("components".to_string(), to_json_schema(components));
        }
    }
    schema
}

/// Grade a new payload against the fixture it would replace
pub fn classify(expected: &JsonValue, actual: &JsonValue, ignore_paths: &[String]) -> MatchKind {
    if compare_by_value(expected, actual) {
        MatchKind::Exact
    } else if compare_by_value_ignoring_paths(expected, actual, ignore_paths) {
        MatchKind::Inexact
    } else if compare_by_type(expected, actual, ignore_paths) {
        MatchKind::Type
    } else {
        MatchKind::NoMatch
    }
}

/// Replace every non-null leaf with its type name, keeping the structure
pub fn to_type_shape(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Null => JsonValue::Null,
        JsonValue::Bool(_) => JsonValue::String("boolean".into()),
        JsonValue::Number(_) => JsonValue::String("number".into()),
        JsonValue::String(_) => JsonValue::String("string".into()),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(to_type_shape).collect()),
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), to_type_shape(value)))
                .collect::<Map<_, _>>(),
        ),
    }
}

/// Copy of `value` without the given paths
///
/// Paths use dots for keys and `[n]` for array indexes (`items[0].id`). A
/// removed array element becomes `null` so later indexes keep their position.
pub fn omit_paths(value: &JsonValue, paths: &[String]) -> JsonValue {
    let mut copy = value.clone();
    for path in paths {
        let segments: Vec<Segment> = PATH_SEGMENT_RE
            .captures_iter(path)
            .filter_map(|caps| match (caps.get(1), caps.get(2)) {
                (Some(key), _) => Some(Segment::Key(key.as_str())),
                (None, Some(index)) => index.as_str().parse().ok().map(Segment::Index),
                (None, None) => None,
            })
            .collect();
        remove_path(&mut copy, &segments);
    }
    copy
}

#[derive(Debug, Clone, Copy)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn remove_path(value: &mut JsonValue, segments: &[Segment<'_>]) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut node = value;
    for segment in parents {
        let next = match (node, segment) {
            (JsonValue::Object(map), Segment::Key(key)) => map.get_mut(*key),
            (JsonValue::Array(items), Segment::Index(index)) => items.get_mut(*index),
            (JsonValue::Array(items), Segment::Key(key)) => {
                key.parse::<usize>().ok().and_then(|index| items.get_mut(index))
            }
            _ => None,
        };
        match next {
            Some(child) => node = child,
            None => return,
        }
    }

    match (node, last) {
        (JsonValue::Object(map), Segment::Key(key)) => {
            map.shift_remove(*key);
        }
        (JsonValue::Array(items), Segment::Index(index)) => {
            if let Some(item) = items.get_mut(*index) {
                *item = JsonValue::Null;
            }
        }
        (JsonValue::Array(items), Segment::Key(key)) => {
            if let Some(item) = key.parse::<usize>().ok().and_then(|index| items.get_mut(index)) {
                *item = JsonValue::Null;
            }
        }
        _ => {}
    }
}
