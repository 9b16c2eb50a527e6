//! `specrec compare`: check a live server against the recorded fixtures.

// Internal imports (std, crate)
use std::path::Path;

use super::{output_path, resolve_requests, resolve_server_url, spec_dir};
use crate::compare::{
    compare_by_type, compare_by_value_ignoring_paths, compare_to_schema, diff, omit_paths,
    to_type_shape, CompareMode,
};
use crate::config::Config;
use crate::endpoints::RequestDescriptor;
use crate::fixtures::read_fixture;
use crate::http::{fetch_responses, HttpInvoker};
use crate::openapi::{SpecDocument, ValidatedSpec};
use crate::resolver::ValueProvider;

// External imports (alphabetized)
use serde_json::Value as JsonValue;

/// One request whose response did not match
#[derive(Debug, Clone, PartialEq)]
pub struct CompareFailure {
    /// `GET /pets/{id} 200 "default"` style label
    pub location: String,
    pub url: String,
    /// Human-readable problems, one per line
    pub details: Vec<String>,
}

/// Outcome of a compare run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompareReport {
    pub mode: CompareMode,
    /// Number of requests that were checked
    pub compared: usize,
    pub failures: Vec<CompareFailure>,
}

impl CompareReport {
    pub fn has_differences(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Process exit code: 1 when any comparison failed
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_differences())
    }
}

/// Compare every callable example of `spec_file` against `server`
///
/// Fixtures are read relative to the output spec's directory, which is where
/// `record` wrote them.
pub async fn compare(
    spec_file: &Path,
    server: Option<&str>,
    config: &Config,
    provider: &dyn ValueProvider,
    invoker: &dyn HttpInvoker,
) -> crate::Result<CompareReport> {
    let spec = SpecDocument::from_file(spec_file).await?;
    let validated = spec.validate()?;
    let server_url = resolve_server_url(server, &spec)?;
    let dest_dir = spec_dir(&output_path(spec_file, config));
    let mode = config.compare.compare_mode;

    let requests = resolve_requests(&spec, provider, &server_url, &spec_dir(spec_file), config).await?;
    let fetched = fetch_responses(invoker, &server_url, requests, config.concurrency()).await;

    log::info!("Comparing by {}", mode.to_string().to_uppercase());
    let mut report = CompareReport {
        mode,
        compared: fetched.len(),
        failures: Vec::new(),
    };

    for response in &fetched {
        let descriptor = &response.descriptor;
        let mut details = Vec::new();

        match &response.outcome {
            Err(message) => details.push(format!("Request failed: {}", message)),
            Ok(http) => {
                if http.status != descriptor.expected_status {
                    log::error!(
                        "Expected {} but received {}: {}",
                        descriptor.expected_status,
                        http.status,
                        descriptor.url
                    );
                    details.push(format!(
                        "Expected {} but received {}",
                        descriptor.expected_status, http.status
                    ));
                }
                let fixture = match &descriptor.existing_response_file {
                    Some(file) => read_fixture(dest_dir.join(file)).await,
                    None => None,
                };
                details.extend(compare_payload(
                    mode,
                    &validated,
                    descriptor,
                    http.status,
                    fixture.as_ref(),
                    &http.body,
                ));
            }
        }

        if !details.is_empty() {
            log::error!("{}\n{}\n", descriptor.url, details.join("\n"));
            report.failures.push(CompareFailure {
                location: descriptor.location(),
                url: descriptor.url.clone(),
                details,
            });
        }
    }

    if report.has_differences() {
        log::error!("Differences were detected");
    } else {
        log::info!("No differences detected");
    }
    Ok(report)
}

/// Problems with one payload under `mode`; empty when it matches
fn compare_payload(
    mode: CompareMode,
    validated: &ValidatedSpec,
    descriptor: &RequestDescriptor,
    status: u16,
    fixture: Option<&JsonValue>,
    actual: &JsonValue,
) -> Vec<String> {
    let ignore = &descriptor.ignore_paths;
    match (mode, fixture) {
        (CompareMode::Schema, _) => {
            compare_to_schema(validated, &descriptor.method, &descriptor.url, status, actual)
        }
        (_, None) => vec![format!(
            "No recorded response for {}; run `specrec record` first",
            descriptor.location()
        )],
        (CompareMode::Value, Some(expected)) => {
            if compare_by_value_ignoring_paths(expected, actual, ignore) {
                Vec::new()
            } else {
                diff(&omit_paths(expected, ignore), &omit_paths(actual, ignore))
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            }
        }
        (CompareMode::Type, Some(expected)) => {
            if compare_by_type(expected, actual, ignore) {
                Vec::new()
            } else {
                diff(
                    &to_type_shape(&omit_paths(expected, ignore)),
                    &to_type_shape(&omit_paths(actual, ignore)),
                )
                .iter()
                .map(ToString::to_string)
                .collect()
            }
        }
    }
}
