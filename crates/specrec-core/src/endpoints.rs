//! Enumeration of callable endpoints.
//!
//! Walks `paths → method → status → example` in document order and produces one
//! [`RequestDescriptor`] for every combination that can actually be requested.
//! An operation without parameters or a request body can only be told apart by
//! calling it, so only its `200` response is kept. Anything else needs a named
//! example that supplies the parameters and body the operation declares.

// Internal imports (std, crate)
use crate::examples::{self, DEFAULT_EXAMPLE};
use crate::openapi::{SpecDocument, HTTP_METHODS};

// External imports (alphabetized)
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Locates the response a descriptor was built from
///
/// Descriptors never hold references into the document. Writes that must be
/// visible in the spec, such as stamping `responseFile` on an example, go
/// through [`SpecDocument::response_mut`] with this locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EndpointRef {
    pub path: String,
    /// Lowercase method key, as it appears in the path item
    pub method: String,
    /// Status key, as it appears in `responses`
    pub status: String,
}

/// Method, body and headers of a request
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RequestConfig {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
}

/// A concrete request derived from one (path, method, status, example)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDescriptor {
    /// Path template, e.g. `/posts/{id}`
    pub path: String,
    pub method: String,
    /// Starts as `path`; receives path values and finally the query string
    pub url: String,
    /// Query values staged until the URL is finalized
    pub query: Map<String, JsonValue>,
    pub request: RequestConfig,
    pub endpoint: EndpointRef,
    pub expected_status: u16,
    pub example_name: String,
    /// Position of the example among the response's examples
    pub example_index: usize,
    /// `responseFile` of the example when the descriptor was built
    pub existing_response_file: Option<String>,
    pub ignore_paths: Vec<String>,
    /// Resolved parameter values, parallel to the operation's `parameters`
    pub resolved_params: Option<Vec<JsonValue>>,
    pub resolved_request_body: Option<JsonValue>,
}

impl RequestDescriptor {
    /// `GET /posts/{id}` style label for logs
    pub fn short_name(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.path)
    }

    /// Label including the example, used in error locations
    pub fn location(&self) -> String {
        format!(
            "{} {} \"{}\"",
            self.short_name(),
            self.expected_status,
            self.example_name
        )
    }
}

/// Build the request descriptors for every eligible endpoint of the document
///
/// The document is not modified, so enumerating twice yields the same sequence.
pub fn enumerate(spec: &SpecDocument) -> Vec<RequestDescriptor> {
    let Some(paths) = spec.json.get("paths").and_then(JsonValue::as_object) else {
        return Vec::new();
    };

    let descriptors: Vec<_> = paths
        .iter()
        .flat_map(|(path, item)| enumerate_path(path, item))
        .collect();

    log::debug!("Enumerated {} request descriptors", descriptors.len());
    descriptors
}

fn enumerate_path(path: &str, item: &JsonValue) -> Vec<RequestDescriptor> {
    let Some(item) = item.as_object() else {
        return Vec::new();
    };

    item.iter()
        .filter(|(method, _)| HTTP_METHODS.contains(&method.as_str()))
        .filter(|(_, operation)| !examples::is_ignored(operation))
        .flat_map(|(method, operation)| enumerate_method(path, method, operation))
        .collect()
}

fn enumerate_method(path: &str, method: &str, operation: &JsonValue) -> Vec<RequestDescriptor> {
    let Some(responses) = operation.get("responses").and_then(JsonValue::as_object) else {
        return Vec::new();
    };

    let mut descriptors = Vec::new();
    for (status, response) in responses {
        if examples::is_ignored(response) {
            continue;
        }
        let Ok(expected_status) = status.parse::<u16>() else {
            log::debug!(
                "Ignore (status '{}' is not a concrete code) - {} {}",
                status,
                method,
                path
            );
            continue;
        };

        let endpoint = EndpointRef {
            path: path.to_string(),
            method: method.to_string(),
            status: status.clone(),
        };
        for (example_index, example_name) in examples::example_names(response).into_iter().enumerate() {
            if let Some(descriptor) = build_descriptor(
                &endpoint,
                expected_status,
                example_name,
                example_index,
                operation,
                response,
            ) {
                descriptors.push(descriptor);
            }
        }
    }
    descriptors
}

/// Apply the eligibility rule to one (status, example) of an operation
fn build_descriptor(
    endpoint: &EndpointRef,
    expected_status: u16,
    example_name: String,
    example_index: usize,
    operation: &JsonValue,
    response: &JsonValue,
) -> Option<RequestDescriptor> {
    let example = examples::get_example(response, Some(&example_name));
    let has_params = operation
        .get("parameters")
        .and_then(JsonValue::as_array)
        .is_some_and(|params| !params.is_empty());
    let has_request_body = operation
        .get("requestBody")
        .is_some_and(|body| !body.is_null());

    if !has_params && !has_request_body {
        if expected_status != 200 {
            log::debug!(
                "Ignore (no params) - {} {} {}",
                expected_status,
                endpoint.method,
                endpoint.path
            );
            return None;
        }
    } else {
        let example_params = example
            .and_then(|e| e.get("parameters"))
            .and_then(JsonValue::as_array);
        if has_params && example_params.is_none() {
            log::warn!(
                "Ignore (no {} parameters) - {} {} {}",
                examples::EXAMPLES_KEY,
                expected_status,
                endpoint.method,
                endpoint.path
            );
            return None;
        }
        let example_body = example
            .and_then(|e| e.get("requestBody"))
            .filter(|body| !body.is_null());
        if has_request_body && example_body.is_none() {
            log::warn!(
                "Ignore (no {} requestBody) - {} {} {}",
                examples::EXAMPLES_KEY,
                expected_status,
                endpoint.method,
                endpoint.path
            );
            return None;
        }
    }

    Some(RequestDescriptor {
        path: endpoint.path.clone(),
        method: endpoint.method.clone(),
        url: endpoint.path.clone(),
        query: Map::new(),
        request: RequestConfig {
            method: endpoint.method.clone(),
            ..RequestConfig::default()
        },
        endpoint: endpoint.clone(),
        expected_status,
        existing_response_file: example
            .and_then(|e| e.get("responseFile"))
            .and_then(JsonValue::as_str)
            .map(String::from),
        ignore_paths: examples::ignore_paths(Some(response)),
        example_name,
        example_index,
        resolved_params: None,
        resolved_request_body: None,
    })
}

/// Whether `example_name` is the synthetic example of a response without examples
pub fn is_default_example(name: &str) -> bool {
    name == DEFAULT_EXAMPLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec(paths: JsonValue) -> SpecDocument {
        SpecDocument::new(json!({ "openapi": "3.0.0", "paths": paths }))
    }

    fn path_param() -> JsonValue {
        json!({ "name": "p1", "in": "path", "required": true, "schema": { "type": "string" } })
    }

    #[test]
    fn test_parameterless_get_only_yields_200() {
        let spec = spec(json!({
            "/api": { "get": { "responses": {
                "200": { "description": "Successful Operation" },
                "400": { "description": "The request is invalid" },
                "500": { "description": "Boom" }
            } } }
        }));

        let descriptors = enumerate(&spec);
        assert_eq!(
            descriptors,
            vec![RequestDescriptor {
                path: "/api".into(),
                method: "get".into(),
                url: "/api".into(),
                query: Map::new(),
                request: RequestConfig {
                    method: "get".into(),
                    ..RequestConfig::default()
                },
                endpoint: EndpointRef {
                    path: "/api".into(),
                    method: "get".into(),
                    status: "200".into(),
                },
                expected_status: 200,
                example_name: "default".into(),
                example_index: 0,
                existing_response_file: None,
                ignore_paths: vec![],
                resolved_params: None,
                resolved_request_body: None,
            }]
        );
    }

    #[test]
    fn test_path_param_without_examples_is_dropped() {
        let spec = spec(json!({
            "/api/{p1}": { "get": {
                "parameters": [path_param()],
                "responses": {
                    "200": { "description": "Successful Operation" },
                    "400": { "description": "The request is invalid" }
                }
            } }
        }));
        assert!(enumerate(&spec).is_empty());
    }

    #[test]
    fn test_multiple_examples_get_ordinal_indexes() {
        let spec = spec(json!({
            "/api/{p1}": { "get": {
                "parameters": [path_param()],
                "responses": {
                    "200": {
                        "description": "Successful Operation",
                        "x-examples": {
                            "myExample": { "parameters": [{ "value": { "js": "object" } }] },
                            "example2": { "parameters": [{ "value": { "js": "function" } }], "responseFile": "r.json" }
                        }
                    },
                    "404": {
                        "description": "Missing",
                        "x-test-ignore-paths": ["b.c"],
                        "x-examples": {
                            "notFound": { "parameters": [{ "value": "nope" }] },
                            "noParams": {}
                        }
                    }
                }
            } }
        }));

        let descriptors = enumerate(&spec);
        let summary: Vec<_> = descriptors
            .iter()
            .map(|d| (d.expected_status, d.example_name.as_str(), d.example_index))
            .collect();
        assert_eq!(
            summary,
            vec![(200, "myExample", 0), (200, "example2", 1), (404, "notFound", 0)]
        );
        assert_eq!(descriptors[1].existing_response_file.as_deref(), Some("r.json"));
        assert_eq!(descriptors[2].ignore_paths, vec!["b.c".to_string()]);
        assert_eq!(descriptors[2].endpoint.status, "404");
    }

    #[test]
    fn test_request_body_requires_example_body() {
        let spec = spec(json!({
            "/api": { "post": {
                "requestBody": { "content": { "application/json": { "schema": { "type": "object" } } } },
                "responses": {
                    "201": {
                        "description": "Created",
                        "x-examples": { "withBody": { "requestBody": { "value": { "a": 1 } } } }
                    },
                    "400": {
                        "description": "Bad",
                        "x-examples": { "withoutBody": {} }
                    }
                }
            } }
        }));

        let descriptors = enumerate(&spec);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].expected_status, 201);
        assert_eq!(descriptors[0].example_name, "withBody");
        assert_eq!(descriptors[0].request.method, "post");
    }

    #[test]
    fn test_unusable_example_data_is_dropped() {
        let spec = spec(json!({
            "/api/{p1}": { "put": {
                "parameters": [path_param()],
                "requestBody": { "content": { "application/json": { "schema": { "type": "object" } } } },
                "responses": {
                    "200": {
                        "description": "ok",
                        "x-examples": {
                            "nullParams": { "parameters": null, "requestBody": { "value": {} } },
                            "objectParams": { "parameters": {}, "requestBody": { "value": {} } },
                            "nullBody": { "parameters": [{ "value": "1" }], "requestBody": null },
                            "usable": { "parameters": [{ "value": "1" }], "requestBody": { "value": {} } }
                        }
                    }
                }
            } }
        }));

        let names: Vec<_> = enumerate(&spec).into_iter().map(|d| d.example_name).collect();
        assert_eq!(names, vec!["usable".to_string()]);
    }

    #[test]
    fn test_ignore_flags_and_non_method_keys() {
        let spec = spec(json!({
            "/a": {
                "summary": "not an operation",
                "parameters": [],
                "get": { "x-ignore": true, "responses": { "200": { "description": "ok" } } },
                "delete": { "responses": {
                    "200": { "description": "ok", "x-ignore": true },
                    "default": { "description": "err" }
                } }
            },
            "/b": { "put": { "responses": { "200": { "description": "ok" } } } }
        }));

        let names: Vec<_> = enumerate(&spec).iter().map(RequestDescriptor::short_name).collect();
        assert_eq!(names, vec!["PUT /b".to_string()]);
    }

    #[test]
    fn test_enumeration_is_idempotent() {
        let spec = spec(json!({
            "/z": { "get": { "responses": { "200": { "description": "ok" } } } },
            "/a/{p1}": { "get": {
                "parameters": [path_param()],
                "responses": { "200": { "description": "ok", "x-examples": {
                    "one": { "parameters": [{ "value": 1 }] },
                    "two": { "parameters": [{ "value": 2 }] }
                } } }
            } }
        }));
        let before = spec.json.clone();

        let first = enumerate(&spec);
        let second = enumerate(&spec);
        assert_eq!(first, second);
        assert_eq!(spec.json, before);
        assert_eq!(first[0].path, "/z");
    }

    #[test]
    fn test_location_label() {
        let spec = spec(json!({
            "/api": { "get": { "responses": { "200": { "description": "ok" } } } }
        }));
        let descriptor = &enumerate(&spec)[0];
        assert_eq!(descriptor.location(), "GET /api 200 \"default\"");
        assert!(is_default_example(&descriptor.example_name));
    }
}
