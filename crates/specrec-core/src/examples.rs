//! Named examples stored under a response's `x-examples` extension.
//!
//! A named example drives one concrete request: its `parameters` entries line
//! up with the operation's `parameters` array, `requestBody` supplies the body,
//! and `responseFile` points at the fixture recorded for it. These helpers work
//! on a response object in place and perform no I/O.

use serde_json::{Map, Value as JsonValue};

/// Extension holding the named examples of a response
pub const EXAMPLES_KEY: &str = "x-examples";
/// Extension listing response paths that value comparisons disregard
pub const IGNORE_PATHS_KEY: &str = "x-test-ignore-paths";
/// Extension that removes an operation or a response from enumeration
pub const IGNORE_KEY: &str = "x-ignore";
/// Name used when a response declares no examples
pub const DEFAULT_EXAMPLE: &str = "default";

/// Get a named example, or the first one when `name` is `None`
pub fn get_example<'a>(response: &'a JsonValue, name: Option<&str>) -> Option<&'a JsonValue> {
    let examples = response.get(EXAMPLES_KEY)?.as_object()?;
    match name {
        Some(name) => examples.get(name),
        None => examples.values().next(),
    }
}

/// Get a named example, creating it (and the `x-examples` map) when missing
///
/// Returns `None` only when `response` is not a JSON object.
pub fn get_or_create_example<'a>(
    response: &'a mut JsonValue,
    name: &str,
) -> Option<&'a mut Map<String, JsonValue>> {
    let examples = response
        .as_object_mut()?
        .entry(EXAMPLES_KEY)
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if !examples.is_object() {
        *examples = JsonValue::Object(Map::new());
    }
    let example = examples
        .as_object_mut()?
        .entry(name)
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if !example.is_object() {
        *example = JsonValue::Object(Map::new());
    }
    example.as_object_mut()
}

/// Set `key` on a named example, creating the example first if needed
pub fn update_example(response: &mut JsonValue, name: &str, key: &str, value: JsonValue) -> bool {
    match get_or_create_example(response, name) {
        Some(example) => {
            example.insert(key.to_string(), value);
            true
        }
        None => false,
    }
}

/// Example names in document order, or the synthetic `default` when there are none
pub fn example_names(response: &JsonValue) -> Vec<String> {
    let names: Vec<String> = response
        .get(EXAMPLES_KEY)
        .and_then(JsonValue::as_object)
        .map(|examples| examples.keys().cloned().collect())
        .unwrap_or_default();

    if names.is_empty() {
        vec![DEFAULT_EXAMPLE.to_string()]
    } else {
        names
    }
}

/// The ignore-path list declared on a response
pub fn ignore_paths(response: Option<&JsonValue>) -> Vec<String> {
    response
        .and_then(|r| r.get(IGNORE_PATHS_KEY))
        .and_then(JsonValue::as_array)
        .map(|paths| {
            paths
                .iter()
                .filter_map(JsonValue::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Whether an operation or response carries a truthy `x-ignore`
pub fn is_ignored(node: &JsonValue) -> bool {
    match node.get(IGNORE_KEY) {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(flag)) => *flag,
        Some(JsonValue::Number(n)) => n.as_f64() != Some(0.0),
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
