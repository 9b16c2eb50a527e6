//! The commands: record, compare, lint and validate.
//!
//! Each workflow loads the spec file, validates it, and then drives the
//! enumerate → resolve → fetch pipeline as far as it needs. The HTTP client and
//! the script runner are passed in, so tests can run every workflow without a
//! network or a shell.

pub mod compare;
pub mod lint;
pub mod record;
pub mod validate;

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::endpoints::{enumerate, RequestDescriptor};
use crate::openapi::SpecDocument;
use crate::resolver::{ParameterResolver, ProviderContext, ValueProvider};
use crate::Error;

// External imports (alphabetized)
use tokio::fs;
use url::Url;

/// Directory holding `file`, `.` for a bare file name
pub fn spec_dir(file: &Path) -> PathBuf {
    file.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Where the processed spec is written: the configured output file, or the input
pub fn output_path(spec_file: &Path, config: &Config) -> PathBuf {
    config
        .output_file
        .clone()
        .unwrap_or_else(|| spec_file.to_path_buf())
}

/// The server to send requests to: `server` if given, else the first of `servers`
pub fn resolve_server_url(server: Option<&str>, spec: &SpecDocument) -> crate::Result<String> {
    let server_url = server.or_else(|| spec.server_url()).ok_or_else(|| {
        Error::config("No server URL was given and the document declares no servers")
    })?;
    Url::parse(server_url)
        .map_err(|e| Error::config(format!("Invalid server URL '{}': {}", server_url, e)))?;
    Ok(server_url.to_string())
}

/// Load a spec file and check that it is a valid OpenAPI 3 document
pub async fn load_spec(spec_file: &Path) -> crate::Result<SpecDocument> {
    let spec = SpecDocument::from_file(spec_file).await?;
    spec.validate()?;
    Ok(spec)
}

/// Enumerate and resolve every request the document describes
pub async fn resolve_requests(
    spec: &SpecDocument,
    provider: &dyn ValueProvider,
    server_url: &str,
    base_dir: &Path,
    config: &Config,
) -> crate::Result<Vec<RequestDescriptor>> {
    let context = ProviderContext {
        server_url: server_url.to_string(),
        base_dir: base_dir.to_path_buf(),
    };
    ParameterResolver::new(spec, provider, context, &config.global)
        .resolve_all(enumerate(spec))
        .await
}

/// Write the spec as YAML for `.yaml`/`.yml` files and as JSON otherwise
pub async fn write_spec(path: &Path, spec: &SpecDocument, dry_run: bool) -> crate::Result<()> {
    let content = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::to_string(spec)?,
        _ => serde_json::to_string_pretty(spec)?,
    };
    if dry_run {
        log::info!("Dry run: {} was not written", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    log::debug!("Written {} successfully", path.display());
    Ok(())
}
