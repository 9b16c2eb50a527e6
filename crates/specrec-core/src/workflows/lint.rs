//! Tidying a spec: sorted paths and schemas, and examples synced from `x-examples`.
//!
//! Syncing copies the values each 2xx example resolves to into the standard
//! OpenAPI `examples` of the parameters and the JSON request body, so
//! documentation tools show the same requests the fixtures were recorded with.

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

use super::{load_spec, output_path, resolve_requests, resolve_server_url, spec_dir, write_spec};
use crate::config::{Config, LintConfig};
use crate::endpoints::RequestDescriptor;
use crate::examples;
use crate::openapi::SpecDocument;
use crate::resolver::ValueProvider;

// External imports (alphabetized)
use serde_json::{Map, Value as JsonValue};

/// Run every enabled lint step
pub fn lint_spec(spec: &mut SpecDocument, descriptors: &[RequestDescriptor], config: &LintConfig) {
    sort_paths(spec, config);
    sort_components(spec, config);
    sync_examples(spec, descriptors, config);
}

/// Sort `paths` alphabetically
pub fn sort_paths(spec: &mut SpecDocument, config: &LintConfig) {
    if !config.sort_paths_alphabetically {
        return;
    }
    if let Some(paths) = spec.json.get_mut("paths") {
        log::info!("Sorting \"paths\"");
        sort_keys(paths);
    }
}

/// Sort `components.schemas` alphabetically
pub fn sort_components(spec: &mut SpecDocument, config: &LintConfig) {
    if !config.sort_components_alphabetically {
        return;
    }
    if let Some(schemas) = spec
        .json
        .get_mut("components")
        .and_then(|components| components.get_mut("schemas"))
    {
        log::info!("Sorting \"components\"");
        sort_keys(schemas);
    }
}

fn sort_keys(value: &mut JsonValue) {
    if let JsonValue::Object(map) = value {
        let mut entries: Vec<_> = std::mem::take(map).into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        *map = entries.into_iter().collect::<Map<_, _>>();
    }
}

/// Copy resolved parameter and body values into the OpenAPI `examples` objects
///
/// Only descriptors of 2xx responses whose named example exists are synced.
/// Parameters and request bodies given as local `$ref`s are updated at their
/// target.
pub fn sync_examples(spec: &mut SpecDocument, descriptors: &[RequestDescriptor], config: &LintConfig) {
    if !config.sync_examples {
        return;
    }

    for descriptor in descriptors {
        if !(200..300).contains(&descriptor.expected_status) {
            continue;
        }
        let Some(example) = spec
            .response(&descriptor.endpoint)
            .and_then(|response| examples::get_example(response, Some(&descriptor.example_name)))
        else {
            continue;
        };
        let has_params = example.get("parameters").is_some();
        let has_body = example.get("requestBody").is_some();

        if has_params {
            if let Some(values) = &descriptor.resolved_params {
                for (index, value) in values.iter().enumerate() {
                    let pointer = parameter_pointer(spec, descriptor, index);
                    if let Some(param) = pointer.and_then(|p| spec.json.pointer_mut(&p)) {
                        set_example_value(param, &descriptor.example_name, value.clone());
                    }
                }
            }
        }

        if has_body {
            if let Some(body) = &descriptor.resolved_request_body {
                let media = request_body_pointer(spec, descriptor)
                    .map(|pointer| format!("{}/content/application~1json", pointer))
                    .and_then(|pointer| spec.json.pointer_mut(&pointer));
                if let Some(media) = media {
                    set_example_value(media, &descriptor.example_name, body.clone());
                }
            }
        }
    }
}

/// JSON pointer to an operation, with `/` and `~` escaped
fn operation_pointer(descriptor: &RequestDescriptor) -> String {
    format!(
        "/paths/{}/{}",
        escape_pointer(&descriptor.endpoint.path),
        escape_pointer(&descriptor.endpoint.method)
    )
}

fn parameter_pointer(spec: &SpecDocument, descriptor: &RequestDescriptor, index: usize) -> Option<String> {
    let pointer = format!("{}/parameters/{}", operation_pointer(descriptor), index);
    ref_target(spec, pointer)
}

fn request_body_pointer(spec: &SpecDocument, descriptor: &RequestDescriptor) -> Option<String> {
    ref_target(spec, format!("{}/requestBody", operation_pointer(descriptor)))
}

/// Follow a local `$ref` at `pointer`, returning the pointer of its target
fn ref_target(spec: &SpecDocument, pointer: String) -> Option<String> {
    let node = spec.json.pointer(&pointer)?;
    match node.get("$ref").and_then(JsonValue::as_str) {
        Some(reference) => reference.strip_prefix('#').map(String::from),
        None => Some(pointer),
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn set_example_value(node: &mut JsonValue, name: &str, value: JsonValue) {
    let Some(node) = node.as_object_mut() else {
        return;
    };
    let examples = node
        .entry("examples")
        .or_insert_with(|| JsonValue::Object(Map::new()));
    let Some(examples) = examples.as_object_mut() else {
        return;
    };
    let example = examples
        .entry(name)
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if let Some(example) = example.as_object_mut() {
        example.insert("value".to_string(), value);
    }
}

/// `specrec lint`: tidy the spec file and write it out
///
/// Returns the path the spec was written to.
pub async fn lint(
    spec_file: &Path,
    server: Option<&str>,
    config: &Config,
    provider: &dyn ValueProvider,
) -> crate::Result<PathBuf> {
    let mut spec = load_spec(spec_file).await?;

    let descriptors = if config.lint.sync_examples {
        let server_url = resolve_server_url(server, &spec)?;
        resolve_requests(&spec, provider, &server_url, &spec_dir(spec_file), config).await?
    } else {
        Vec::new()
    };
    lint_spec(&mut spec, &descriptors, &config.lint);

    let output = output_path(spec_file, config);
    write_spec(&output, &spec, config.dry_run).await?;
    log::info!("Linting complete.");
    Ok(output)
}
