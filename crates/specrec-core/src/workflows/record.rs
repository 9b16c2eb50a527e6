//! `specrec record`: call every example and keep the answers as fixtures.

// Internal imports (std, crate)
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{load_spec, output_path, resolve_requests, resolve_server_url, spec_dir, write_spec};
use crate::config::Config;
use crate::examples;
use crate::fixtures::{
    plan_fixture, read_fixture, remove_unused, response_file_name, response_file_ref,
    write_json_file, FixtureAction,
};
use crate::http::{fetch_responses, HttpInvoker};
use crate::resolver::ValueProvider;
use crate::workflows::lint::lint_spec;

// External imports (alphabetized)
use serde_json::Value as JsonValue;

/// What a recording run did, as `responseFile` references
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    /// Requests that failed or answered with an unexpected status
    pub skipped: Vec<String>,
    /// Files deleted from the response directory
    pub removed: Vec<PathBuf>,
    /// Where the spec was written
    pub output_file: PathBuf,
}

/// Record the responses of every callable example of `spec_file`
///
/// Fixtures are written under the configured response directory next to the
/// output spec, each example's `responseFile` is pointed at its fixture, and
/// the spec is linted (when enabled) and written out.
pub async fn record(
    spec_file: &Path,
    server: Option<&str>,
    config: &Config,
    provider: &dyn ValueProvider,
    invoker: &dyn HttpInvoker,
) -> crate::Result<RecordReport> {
    let mut spec = load_spec(spec_file).await?;
    let server_url = resolve_server_url(server, &spec)?;
    let output = output_path(spec_file, config);
    let dest_dir = spec_dir(&output);
    let base_path = config.record.response_base_path.as_str();

    let requests = resolve_requests(&spec, provider, &server_url, &spec_dir(spec_file), config).await?;
    let fetched = fetch_responses(invoker, &server_url, requests.clone(), config.concurrency()).await;

    let mut report = RecordReport {
        output_file: output.clone(),
        ..RecordReport::default()
    };
    let mut used_files = HashSet::new();

    for response in fetched {
        let descriptor = &response.descriptor;
        let file_name = response_file_name(descriptor);
        let file_ref = response_file_ref(base_path, &file_name);
        // Keep the fixture of a request that could not be recorded this time
        used_files.insert(file_name.clone());

        let body: JsonValue = match response.outcome {
            Ok(ref http) if http.status == descriptor.expected_status => http.body.clone(),
            Ok(ref http) => {
                log::warn!(
                    "{} returned {}, expected {}",
                    descriptor.url,
                    http.status,
                    descriptor.expected_status
                );
                report.skipped.push(file_ref);
                continue;
            }
            Err(ref message) => {
                log::warn!("{} could not be recorded: {}", descriptor.url, message);
                report.skipped.push(file_ref);
                continue;
            }
        };

        let previous = match &descriptor.existing_response_file {
            Some(existing) => read_fixture(dest_dir.join(existing)).await,
            None => None,
        };

        let renamed_from = descriptor
            .existing_response_file
            .as_deref()
            .filter(|existing| *existing != file_ref);
        let mut contents = body;

        match plan_fixture(previous.as_ref(), &contents, &descriptor.ignore_paths, &config.record) {
            FixtureAction::Unchanged => match (renamed_from, previous) {
                // The fixture keeps its contents but moves to its current name
                (Some(existing), Some(previous)) => {
                    log::info!("Moving response file {} to {}", existing, file_ref);
                    report.updated.push(file_ref.clone());
                    contents = previous;
                }
                _ => {
                    log::info!("Response file unchanged: {}", file_name);
                    report.unchanged.push(file_ref);
                    continue;
                }
            },
            FixtureAction::Create => {
                log::info!("Creating response file {}", file_name);
                report.created.push(file_ref.clone());
            }
            FixtureAction::Update => {
                log::info!("Updating response file {}", file_name);
                report.updated.push(file_ref.clone());
            }
        }

        write_json_file(dest_dir.join(&file_ref), &contents, config.dry_run).await?;
        if let Some(target) = spec.response_mut(&descriptor.endpoint) {
            examples::update_example(
                target,
                &descriptor.example_name,
                "responseFile",
                JsonValue::String(file_ref),
            );
        }
    }

    if config.record.remove_unused_responses && !base_path.trim_matches('/').is_empty() {
        report.removed = remove_unused(dest_dir.join(base_path), &used_files, config.dry_run).await?;
    }

    if config.record.and_lint {
        lint_spec(&mut spec, &requests, &config.lint);
    }

    write_spec(&output, &spec, config.dry_run).await?;
    log::info!(
        "Recording complete: {} created, {} updated, {} unchanged, {} skipped",
        report.created.len(),
        report.updated.len(),
        report.unchanged.len(),
        report.skipped.len()
    );
    Ok(report)
}
