//! Security schemes and how their values land on a request.

// Internal imports (std, crate)
use crate::endpoints::RequestDescriptor;
use crate::openapi::SpecDocument;
use crate::Error;

// External imports (alphabetized)
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// The `components.securitySchemes` entries requests can be built for
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum SecurityScheme {
    #[serde(rename = "http")]
    Http { scheme: String },
    #[serde(rename = "apiKey")]
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: String,
    },
    #[serde(other)]
    Other,
}

/// Where a resolved security value goes
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityBinding {
    Header { name: String, value: String },
    Query { name: String, value: JsonValue },
}

impl SecurityScheme {
    /// Parse the definition of scheme `name`
    pub fn from_definition(name: &str, definition: &JsonValue) -> crate::Result<Self> {
        serde_json::from_value(definition.clone()).map_err(|e| {
            Error::openapi(format!("Invalid security scheme \"{}\": {}", name, e))
        })
    }

    /// Decide where `value` goes for this scheme
    pub fn bind(&self, name: &str, value: &JsonValue) -> crate::Result<SecurityBinding> {
        match self {
            Self::Http { scheme } => {
                let prefix = match scheme.to_lowercase().as_str() {
                    "bearer" => "Bearer",
                    "basic" => "Basic",
                    other => {
                        return Err(Error::unsupported(format!(
                            "http security scheme \"{}\" ({})",
                            name, other
                        )))
                    }
                };
                Ok(SecurityBinding::Header {
                    name: "Authorization".to_string(),
                    value: format!("{} {}", prefix, value_to_string(value)),
                })
            }
            Self::ApiKey { name: key, location } => match location.as_str() {
                "header" => Ok(SecurityBinding::Header {
                    name: key.clone(),
                    value: value_to_string(value),
                }),
                "query" => Ok(SecurityBinding::Query {
                    name: key.clone(),
                    value: value.clone(),
                }),
                other => Err(Error::unsupported(format!(
                    "apiKey security scheme \"{}\" in {}",
                    name, other
                ))),
            },
            Self::Other => Err(Error::unsupported(format!(
                "security scheme \"{}\" is neither http nor apiKey",
                name
            ))),
        }
    }
}

impl SecurityBinding {
    /// Write the binding into the request
    ///
    /// Query bindings are staged after the parameters, so they follow them in
    /// the final URL.
    pub fn apply(self, descriptor: &mut RequestDescriptor) {
        match self {
            Self::Header { name, value } => {
                descriptor.request.headers.insert(name, value);
            }
            Self::Query { name, value } => {
                descriptor.query.insert(name, value);
            }
        }
    }
}

/// Scheme names of the first security requirement that applies to `operation`
///
/// An operation-level `security` replaces the document-wide one, and an empty
/// list means the operation needs no credentials.
pub fn required_schemes(spec: &SpecDocument, operation: &JsonValue) -> Vec<String> {
    operation
        .get("security")
        .and_then(JsonValue::as_array)
        .or_else(|| spec.global_security())
        .and_then(|requirements| requirements.first())
        .and_then(JsonValue::as_object)
        .map(|requirement| requirement.keys().cloned().collect())
        .unwrap_or_default()
}

/// Render a value the way it appears in a header or URL
pub fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
