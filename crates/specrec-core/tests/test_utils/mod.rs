//! Test utilities for specrec integration tests

#![allow(dead_code)]

// Internal imports (std, crate)
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// External imports (alphabetized)
use futures::future::BoxFuture;
use serde_json::{json, Value as JsonValue};
use specrec_core::endpoints::RequestConfig;
use specrec_core::http::{HttpInvoker, HttpResponse};
use specrec_core::resolver::{ProviderContext, ValueProvider};
use specrec_core::Error;
use tempfile::TempDir;

pub const SERVER_URL: &str = "http://localhost:8080/api";

/// Creates a temporary directory for test outputs
pub fn create_temp_dir() -> anyhow::Result<(TempDir, PathBuf)> {
    let temp_dir = tempfile::tempdir()?;
    let temp_path = temp_dir.path().to_path_buf();
    Ok((temp_dir, temp_path))
}

/// The pet store used by the workflow tests
pub fn test_openapi_spec() -> JsonValue {
    json!({
        "openapi": "3.0.0",
        "info": { "title": "Test API", "version": "1.0.0" },
        "servers": [{ "url": SERVER_URL }],
        "paths": {
            "/zoo": {
                "get": {
                    "responses": {
                        "200": {
                            "description": "The zoo",
                            "content": { "application/json": { "schema": {
                                "type": "object",
                                "properties": { "animals": { "type": "array", "items": { "type": "string" } } }
                            } } }
                        },
                        "500": { "description": "Unreachable without an example" }
                    }
                }
            },
            "/pets/{petId}": {
                "get": {
                    "parameters": [
                        { "name": "petId", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "responses": {
                        "200": {
                            "description": "A pet",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } },
                            "x-test-ignore-paths": ["fetchedAt"],
                            "x-examples": { "default": { "parameters": [{ "value": "1" }] } }
                        },
                        "404": {
                            "description": "No such pet",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } },
                            "x-examples": { "missing": { "parameters": [{ "value": "999" }] } }
                        }
                    }
                }
            },
            "/pets": {
                "post": {
                    "security": [{ "apiKey": [] }],
                    "requestBody": {
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } }
                    },
                    "responses": {
                        "201": {
                            "description": "Created",
                            "x-examples": { "create": { "requestBody": { "value": { "name": "rex" } } } }
                        }
                    }
                }
            }
        },
        "components": {
            "securitySchemes": {
                "apiKey": { "type": "apiKey", "in": "header", "name": "X-Api-Key" }
            },
            "schemas": {
                "Pet": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "id": { "type": "integer" },
                        "name": { "type": "string" },
                        "fetchedAt": { "type": "string" }
                    }
                },
                "Error": {
                    "type": "object",
                    "properties": { "message": { "type": "string" } }
                }
            }
        }
    })
}

/// Writes the test spec as `openapi.json` in the given directory
pub fn create_test_openapi_spec(dir: &Path) -> anyhow::Result<PathBuf> {
    let spec_path = dir.join("openapi.json");
    std::fs::write(&spec_path, serde_json::to_string_pretty(&test_openapi_spec())?)?;
    Ok(spec_path)
}

/// Reads a JSON file written by a workflow
pub fn read_json(path: &Path) -> anyhow::Result<JsonValue> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

/// Answers requests from a fixed table and remembers what it was sent
#[derive(Default)]
pub struct StubServer {
    routes: HashMap<(String, String), HttpResponse>,
    pub requests: Mutex<Vec<(String, RequestConfig)>>,
}

impl StubServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` with `status` and `body`
    pub fn route(mut self, method: &str, path: &str, status: u16, body: JsonValue) -> Self {
        self.routes.insert(
            (method.to_uppercase(), format!("{}{}", SERVER_URL, path)),
            HttpResponse { status, body },
        );
        self
    }

    /// The canned answers of the test spec
    pub fn pet_store(fetched_at: &str) -> Self {
        Self::new()
            .route("GET", "/zoo", 200, json!({ "animals": ["lion", "zebra"] }))
            .route(
                "GET",
                "/pets/1",
                200,
                json!({ "id": 1, "name": "rex", "fetchedAt": fetched_at }),
            )
            .route("GET", "/pets/999", 404, json!({ "message": "not found" }))
            .route("POST", "/pets", 201, json!({ "id": 2, "name": "rex" }))
    }

    pub fn recorded(&self) -> Vec<(String, RequestConfig)> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpInvoker for StubServer {
    fn invoke<'a>(
        &'a self,
        url: &'a str,
        request: &'a RequestConfig,
    ) -> BoxFuture<'a, specrec_core::Result<HttpResponse>> {
        Box::pin(async move {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), request.clone()));
            self.routes
                .get(&(request.method.to_uppercase(), url.to_string()))
                .cloned()
                .ok_or_else(|| Error::openapi(format!("connection refused: {}", url)))
        })
    }
}

/// Value provider that fails on any script; the test spec only uses literal values
pub struct NoScripts;

impl ValueProvider for NoScripts {
    fn provide<'a>(
        &'a self,
        script: &'a str,
        _context: &'a ProviderContext,
    ) -> BoxFuture<'a, specrec_core::Result<JsonValue>> {
        Box::pin(async move { Err(Error::resolution(script, "scripts are not available in tests")) })
    }
}
