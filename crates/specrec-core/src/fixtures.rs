//! Fixture files: naming, the create/update decision, and JSON file I/O.
//!
//! A fixture is the recorded body of one (path, method, status, example). Its
//! file name is derived from the request, and the example's `responseFile`
//! points at it relative to the output spec's directory.

// Internal imports (std, crate)
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::compare::{classify, MatchKind};
use crate::config::RecordConfig;
use crate::endpoints::{is_default_example, RequestDescriptor};

// External imports (alphabetized)
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::fs;

/// What to do with the fixture of a fresh response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureAction {
    Create,
    Update,
    Unchanged,
}

/// File name for the fixture of `descriptor`
///
/// `GET /api/users/{id}`, status 200, first example `default` becomes
/// `GET_api_users_{id}-200_DEFAULT.json`. The first example of a response is
/// always marked `DEFAULT` so that naming the example later does not orphan
/// the file.
pub fn response_file_name(descriptor: &RequestDescriptor) -> String {
    let suffix = if descriptor.example_index == 0 {
        if is_default_example(&descriptor.example_name) {
            "DEFAULT".to_string()
        } else {
            format!("DEFAULT_{}", descriptor.example_name)
        }
    } else {
        descriptor.example_name.clone()
    };
    let path = descriptor.path.strip_prefix('/').unwrap_or(&descriptor.path);

    format!(
        "{}_{}-{}_{}.json",
        descriptor.method.to_uppercase(),
        path.replace('/', "_"),
        descriptor.expected_status,
        suffix
    )
}

/// `responseFile` value for a fixture: `base_path` joined with the file name
pub fn response_file_ref(base_path: &str, file_name: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", base, file_name)
    }
}

/// Decide whether a fresh response replaces the previous fixture
pub fn plan_fixture(
    previous: Option<&JsonValue>,
    actual: &JsonValue,
    ignore_paths: &[String],
    config: &RecordConfig,
) -> FixtureAction {
    let Some(previous) = previous else {
        return FixtureAction::Create;
    };

    let update = match classify(previous, actual, ignore_paths) {
        MatchKind::Exact => false,
        MatchKind::Inexact => {
            log::debug!("Response has not changed (except ignored paths)");
            config.update_response_when_inexact_match
        }
        MatchKind::Type => {
            log::debug!("Response types match, but values have changed");
            config.update_response_when_types_match
        }
        MatchKind::NoMatch => true,
    };

    if update {
        FixtureAction::Update
    } else {
        FixtureAction::Unchanged
    }
}

/// Read a fixture, or `None` when it is missing or not JSON
pub async fn read_fixture<P: AsRef<Path>>(path: P) -> Option<JsonValue> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            log::debug!("Response file \"{}\" could not be loaded: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Response file \"{}\" is not valid JSON: {}", path.display(), e);
            None
        }
    }
}

/// Write `value` as pretty-printed JSON, creating parent directories
///
/// Nothing is written when `dry_run` is set.
pub async fn write_json_file<P: AsRef<Path>, T: Serialize + ?Sized>(
    path: P,
    value: &T,
    dry_run: bool,
) -> crate::Result<()> {
    let path = path.as_ref();
    if !dry_run {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, serde_json::to_string_pretty(value)?).await?;
    }
    log::debug!("Written {} successfully", path.display());
    Ok(())
}

/// Delete the files in `dir` whose names are not in `keep`
///
/// Subdirectories are left alone and a missing `dir` is not an error. Returns
/// the files that were (or, with `dry_run`, would have been) deleted.
pub async fn remove_unused<P: AsRef<Path>>(
    dir: P,
    keep: &HashSet<String>,
    dry_run: bool,
) -> crate::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    log::debug!("Searching {} for unused responses...", dir.display());

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut unused = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !keep.contains(&name) {
            unused.push(entry.path());
        }
    }
    unused.sort();

    for path in &unused {
        log::info!("Removing unused response file {}", path.display());
        if !dry_run {
            fs::remove_file(path).await?;
        }
    }
    Ok(unused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::{EndpointRef, RequestConfig};
    use serde_json::json;
    use tempfile::tempdir;

    fn descriptor(path: &str, method: &str, status: u16, name: &str, index: usize) -> RequestDescriptor {
        RequestDescriptor {
            path: path.into(),
            method: method.into(),
            url: path.into(),
            query: Default::default(),
            request: RequestConfig {
                method: method.into(),
                ..RequestConfig::default()
            },
            endpoint: EndpointRef {
                path: path.into(),
                method: method.into(),
                status: status.to_string(),
            },
            expected_status: status,
            example_name: name.into(),
            example_index: index,
            existing_response_file: None,
            ignore_paths: vec![],
            resolved_params: None,
            resolved_request_body: None,
        }
    }

    #[test]
    fn test_response_file_name() {
        assert_eq!(
            response_file_name(&descriptor("/api/users/{id}", "get", 200, "default", 0)),
            "GET_api_users_{id}-200_DEFAULT.json"
        );
        assert_eq!(
            response_file_name(&descriptor("/api", "post", 201, "created", 0)),
            "POST_api-201_DEFAULT_created.json"
        );
        assert_eq!(
            response_file_name(&descriptor("/api", "post", 400, "invalid", 2)),
            "POST_api-400_invalid.json"
        );
    }

    #[test]
    fn test_response_file_ref() {
        assert_eq!(response_file_ref("responses/", "a.json"), "responses/a.json");
        assert_eq!(response_file_ref("fixtures", "a.json"), "fixtures/a.json");
        assert_eq!(response_file_ref("", "a.json"), "a.json");
    }

    #[test]
    fn test_plan_fixture() {
        let config = RecordConfig::default();
        let ignore = vec!["ts".to_string()];
        let old = json!({ "id": 1, "ts": "a" });

        assert_eq!(plan_fixture(None, &old, &ignore, &config), FixtureAction::Create);
        assert_eq!(plan_fixture(Some(&old), &old, &ignore, &config), FixtureAction::Unchanged);
        assert_eq!(
            plan_fixture(Some(&old), &json!({ "id": 1, "ts": "b" }), &ignore, &config),
            FixtureAction::Update
        );
        assert_eq!(
            plan_fixture(Some(&old), &json!({ "id": "1" }), &ignore, &config),
            FixtureAction::Update
        );

        let keep_stable = RecordConfig {
            update_response_when_inexact_match: false,
            update_response_when_types_match: false,
            ..RecordConfig::default()
        };
        assert_eq!(
            plan_fixture(Some(&old), &json!({ "id": 1, "ts": "b" }), &ignore, &keep_stable),
            FixtureAction::Unchanged
        );
        assert_eq!(
            plan_fixture(Some(&old), &json!({ "id": 2, "ts": "b" }), &ignore, &keep_stable),
            FixtureAction::Unchanged
        );
        assert_eq!(
            plan_fixture(Some(&old), &json!([1]), &ignore, &keep_stable),
            FixtureAction::Update
        );
    }

    #[tokio::test]
    async fn test_write_and_read_fixture() -> crate::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("responses/nested/GET_api-200_DEFAULT.json");

        write_json_file(&path, &json!({ "a": 1 }), true).await?;
        assert!(!path.exists());
        assert_eq!(read_fixture(&path).await, None);

        write_json_file(&path, &json!({ "a": 1 }), false).await?;
        assert_eq!(read_fixture(&path).await, Some(json!({ "a": 1 })));
        assert_eq!(tokio::fs::read_to_string(&path).await?, "{\n  \"a\": 1\n}");

        tokio::fs::write(&path, "not json").await?;
        assert_eq!(read_fixture(&path).await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_unused() -> crate::Result<()> {
        let dir = tempdir()?;
        let responses = dir.path().join("responses");
        tokio::fs::create_dir_all(responses.join("keep-dir")).await?;
        for name in ["used.json", "stale.json", "old.txt"] {
            tokio::fs::write(responses.join(name), "{}").await?;
        }
        let keep: HashSet<String> = ["used.json".to_string()].into_iter().collect();

        let dry = remove_unused(&responses, &keep, true).await?;
        assert_eq!(dry, vec![responses.join("old.txt"), responses.join("stale.json")]);
        assert!(responses.join("stale.json").exists());

        remove_unused(&responses, &keep, false).await?;
        assert!(!responses.join("stale.json").exists());
        assert!(!responses.join("old.txt").exists());
        assert!(responses.join("used.json").exists());
        assert!(responses.join("keep-dir").exists());

        assert!(remove_unused(dir.path().join("missing"), &keep, false).await?.is_empty());
        Ok(())
    }
}
