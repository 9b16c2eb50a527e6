//! OpenAPI document loading, validation and lookup.
//!
//! [`SpecDocument`] wraps the document as a mutable JSON tree. Key order is
//! preserved on load and on write, since path order drives the order of the
//! generated requests and of the written spec. [`SpecDocument::validate`] turns
//! it into a [`ValidatedSpec`], a fully dereferenced copy that can match a
//! concrete request URL back to its operation.
//!
//! # Examples
//!
//! ```no_run
//! use specrec_core::openapi::SpecDocument;
//! use specrec_core::error::Result;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let spec = SpecDocument::from_file("openapi.json").await?;
//! let validated = spec.validate()?;
//!
//! if let Some(title) = spec.title() {
//!     println!("API Title: {}", title);
//! }
//! let matched = validated.find_operation("get", "/pets/42?verbose=true")?;
//! println!("{} matched {}", "/pets/42", matched.path);
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::Path;

use crate::endpoints::EndpointRef;
use crate::Error;

// External imports (alphabetized)
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::fs;

/// Operation keys of a path item, in the order OpenAPI lists them
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

static PATH_PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^/{}]+\}").unwrap());

/// Represents an OpenAPI document being processed
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct SpecDocument {
    /// The raw JSON value of the OpenAPI spec
    pub json: JsonValue,
}

impl SpecDocument {
    pub fn new(json: JsonValue) -> Self {
        Self { json }
    }

    /// Load a document from a file or URL (supports both YAML and JSON)
    pub async fn from_file_or_url<P: AsRef<str>>(location: P) -> crate::Result<Self> {
        let location = location.as_ref();

        if location.starts_with("http://") || location.starts_with("https://") {
            return Self::from_url(location).await;
        }

        Self::from_file(location).await
    }

    /// Load a document from a file (supports both YAML and JSON)
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        Self::parse_content(&content).map_err(|e| {
            Error::openapi(format!(
                "Failed to parse OpenAPI spec at {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load a document from a URL (supports both YAML and JSON)
    pub async fn from_url(url: &str) -> crate::Result<Self> {
        let response = reqwest::get(url).await.map_err(|e| {
            Error::openapi(format!("Failed to fetch OpenAPI spec from {}: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(Error::openapi(format!(
                "Failed to fetch OpenAPI spec from {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let content = response.text().await.map_err(|e| {
            Error::openapi(format!("Failed to read response from {}: {}", url, e))
        })?;

        Self::parse_content(&content).map_err(|e| {
            Error::openapi(format!("Failed to parse OpenAPI spec from {}: {}", url, e))
        })
    }

    /// Parse content as either JSON or YAML
    fn parse_content(content: &str) -> Result<Self, String> {
        if let Ok(json) = serde_json::from_str(content) {
            return Ok(Self { json });
        }

        if let Ok(json) = serde_yaml::from_str(content) {
            return Ok(Self { json });
        }

        Err("content is neither valid JSON nor YAML".to_string())
    }

    /// Get a reference to the raw JSON value
    pub fn as_json(&self) -> &JsonValue {
        &self.json
    }

    /// Get the title of the API
    pub fn title(&self) -> Option<&str> {
        self.json.get("info")?.get("title")?.as_str()
    }

    /// Get the version of the API
    pub fn version(&self) -> Option<&str> {
        self.json.get("info")?.get("version")?.as_str()
    }

    /// URL of the first entry in `servers`
    pub fn server_url(&self) -> Option<&str> {
        self.json
            .get("servers")?
            .as_array()?
            .first()?
            .get("url")?
            .as_str()
    }

    /// The document-wide `security` requirement, if declared
    pub fn global_security(&self) -> Option<&Vec<JsonValue>> {
        self.json.get("security").and_then(JsonValue::as_array)
    }

    /// Look up a `components.securitySchemes` entry, following a local `$ref`
    pub fn security_scheme(&self, name: &str) -> Option<&JsonValue> {
        let scheme = self
            .json
            .get("components")?
            .get("securitySchemes")?
            .get(name)?;
        self.follow_ref(scheme)
    }

    /// Resolve a local reference such as `#/components/requestBodies/Pet`
    pub fn resolve_ref(&self, reference: &str) -> Option<&JsonValue> {
        reference
            .strip_prefix('#')
            .and_then(|pointer| self.json.pointer(pointer))
    }

    /// Return `value` itself, or its target when it is a local `$ref` object
    pub fn follow_ref<'a>(&'a self, value: &'a JsonValue) -> Option<&'a JsonValue> {
        match value.get("$ref").and_then(JsonValue::as_str) {
            Some(reference) => self.resolve_ref(reference),
            None => Some(value),
        }
    }

    /// The operation object an endpoint reference points at
    pub fn operation(&self, endpoint: &EndpointRef) -> Option<&JsonValue> {
        self.json
            .get("paths")?
            .get(&endpoint.path)?
            .get(&endpoint.method)
    }

    pub fn operation_mut(&mut self, endpoint: &EndpointRef) -> Option<&mut JsonValue> {
        self.json
            .get_mut("paths")?
            .get_mut(&endpoint.path)?
            .get_mut(&endpoint.method)
    }

    /// The response object an endpoint reference points at
    pub fn response(&self, endpoint: &EndpointRef) -> Option<&JsonValue> {
        self.operation(endpoint)?
            .get("responses")?
            .get(&endpoint.status)
    }

    /// Mutable access to the response object, for stamping example metadata
    pub fn response_mut(&mut self, endpoint: &EndpointRef) -> Option<&mut JsonValue> {
        self.operation_mut(endpoint)?
            .get_mut("responses")?
            .get_mut(&endpoint.status)
    }

    /// Parse the `parameters` of an operation, following local `$ref`s
    pub fn operation_parameters(&self, operation: &JsonValue) -> crate::Result<Vec<OpenApiParameter>> {
        let Some(params) = operation.get("parameters").and_then(JsonValue::as_array) else {
            return Ok(Vec::new());
        };
        params
            .iter()
            .map(|param| {
                let resolved = self.follow_ref(param).ok_or_else(|| {
                    Error::openapi(format!("Unresolvable parameter reference: {}", param))
                })?;
                serde_json::from_value(resolved.clone()).map_err(|e| {
                    Error::openapi(format!("Invalid parameter definition {}: {}", resolved, e))
                })
            })
            .collect()
    }

    /// Validate the document and produce its dereferenced form
    pub fn validate(&self) -> crate::Result<ValidatedSpec> {
        let version = self
            .json
            .get("openapi")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::spec_invalid("missing 'openapi' version field"))?;
        if !version.starts_with("3.") {
            return Err(Error::spec_invalid(format!(
                "unsupported OpenAPI version '{}', expected 3.x",
                version
            )));
        }

        serde_json::from_value::<openapiv3::OpenAPI>(self.json.clone())
            .map_err(|e| Error::spec_invalid(e.to_string()))?;

        let dereferenced = dereference(&self.json, &self.json, &mut Vec::new())?;
        ValidatedSpec::new(dereferenced)
    }
}

/// Location of a parameter, from its `in` field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

/// The parts of an OpenAPI parameter needed to build a request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OpenApiParameter {
    /// The name of the parameter. Parameter names are case sensitive.
    pub name: String,
    /// The location of the parameter.
    #[serde(rename = "in")]
    pub location: ParamLocation,
    /// Determines whether this parameter is mandatory.
    #[serde(default)]
    pub required: Option<bool>,
    /// The schema defining the type used for the parameter.
    #[serde(default)]
    pub schema: Option<JsonValue>,
}

/// A validated, fully dereferenced OpenAPI document
#[derive(Debug, Clone)]
pub struct ValidatedSpec {
    json: JsonValue,
    routes: Vec<PathRoute>,
}

#[derive(Debug, Clone)]
struct PathRoute {
    template: String,
    pattern: Regex,
    param_count: usize,
}

/// An operation matched from a concrete request
#[derive(Debug, Clone, Copy)]
pub struct OperationMatch<'a> {
    /// The path template that matched, e.g. `/pets/{petId}`
    pub path: &'a str,
    pub operation: &'a JsonValue,
}

impl ValidatedSpec {
    fn new(json: JsonValue) -> crate::Result<Self> {
        let mut routes = Vec::new();
        if let Some(paths) = json.get("paths").and_then(JsonValue::as_object) {
            for template in paths.keys() {
                routes.push(PathRoute {
                    template: template.clone(),
                    pattern: template_regex(template)?,
                    param_count: PATH_PARAM_RE.find_iter(template).count(),
                });
            }
        }
        Ok(Self { json, routes })
    }

    pub fn as_json(&self) -> &JsonValue {
        &self.json
    }

    /// Find the operation serving `method` at a concrete `url`
    ///
    /// The query string is ignored. When several templates match, the one with
    /// the fewest path parameters wins, so `/pets/mine` beats `/pets/{id}`.
    pub fn find_operation(&self, method: &str, url: &str) -> crate::Result<OperationMatch<'_>> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let route = self
            .routes
            .iter()
            .filter(|route| route.pattern.is_match(path))
            .min_by_key(|route| route.param_count)
            .ok_or_else(|| Error::openapi(format!("No path matches {}", path)))?;

        let method = method.to_lowercase();
        let operation = self
            .json
            .get("paths")
            .and_then(|paths| paths.get(&route.template))
            .and_then(|item| item.get(&method))
            .ok_or_else(|| {
                Error::openapi(format!(
                    "Path {} has no {} operation",
                    route.template,
                    method.to_uppercase()
                ))
            })?;

        Ok(OperationMatch {
            path: &route.template,
            operation,
        })
    }
}

impl OperationMatch<'_> {
    /// The JSON schema declared for `status`, falling back to the `default` response
    ///
    /// `Ok(None)` means the response exists but declares no JSON body.
    pub fn response_schema(&self, status: u16) -> crate::Result<Option<&JsonValue>> {
        let responses = self.operation.get("responses");
        let response = responses
            .and_then(|r| r.get(status.to_string()))
            .or_else(|| responses.and_then(|r| r.get("default")))
            .ok_or_else(|| {
                Error::openapi(format!(
                    "{} declares no response for status {}",
                    self.path, status
                ))
            })?;

        let Some(content) = response.get("content").and_then(JsonValue::as_object) else {
            return Ok(None);
        };
        let media = content.get("application/json").or_else(|| {
            content
                .iter()
                .find(|(media_type, _)| media_type.ends_with("+json"))
                .map(|(_, media)| media)
        });
        Ok(media.and_then(|m| m.get("schema")))
    }
}

/// Convert an OpenAPI 3.0 schema object to plain JSON Schema
///
/// Only `nullable` needs translating; other OpenAPI keywords are unknown to
/// the validator and ignored by it.
pub fn to_json_schema(schema: &JsonValue) -> JsonValue {
    match schema {
        JsonValue::Object(map) => {
            let nullable = map.get("nullable").and_then(JsonValue::as_bool) == Some(true);
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                if key == "nullable" {
                    continue;
                }
                out.insert(key.clone(), to_json_schema(value));
            }
            if nullable {
                if let Some(JsonValue::String(ty)) = out.get("type").cloned() {
                    out.insert("type".into(), serde_json::json!([ty, "null"]));
                }
                if let Some(JsonValue::Array(values)) = out.get_mut("enum") {
                    if !values.contains(&JsonValue::Null) {
                        values.push(JsonValue::Null);
                    }
                }
            }
            JsonValue::Object(out)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(to_json_schema).collect()),
        other => other.clone(),
    }
}

fn template_regex(template: &str) -> crate::Result<Regex> {
    let mut pattern = String::from("^");
    let mut last = 0;
    for param in PATH_PARAM_RE.find_iter(template) {
        pattern.push_str(&regex::escape(&template[last..param.start()]));
        pattern.push_str("[^/]+");
        last = param.end();
    }
    pattern.push_str(&regex::escape(&template[last..]));
    pattern.push('$');
    Regex::new(&pattern)
        .map_err(|e| Error::spec_invalid(format!("Invalid path template '{}': {}", template, e)))
}

fn dereference(
    node: &JsonValue,
    root: &JsonValue,
    stack: &mut Vec<String>,
) -> crate::Result<JsonValue> {
    match node {
        JsonValue::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(JsonValue::as_str) {
                // A schema that contains itself keeps its inner reference
                if stack.iter().any(|seen| seen == reference) {
                    return Ok(node.clone());
                }
                let pointer = reference.strip_prefix('#').ok_or_else(|| {
                    Error::spec_invalid(format!("external reference '{}' is not supported", reference))
                })?;
                let target = root.pointer(pointer).ok_or_else(|| {
                    Error::spec_invalid(format!("unresolvable reference '{}'", reference))
                })?;
                stack.push(reference.to_string());
                let resolved = dereference(target, root, stack);
                stack.pop();
                return resolved;
            }
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), dereference(value, root, stack)?);
            }
            Ok(JsonValue::Object(out))
        }
        JsonValue::Array(items) => items
            .iter()
            .map(|item| dereference(item, root, stack))
            .collect::<crate::Result<Vec<_>>>()
            .map(JsonValue::Array),
        other => Ok(other.clone()),
    }
}
