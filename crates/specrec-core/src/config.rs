//! Configuration management for specrec commands.
//!
//! This module defines the `Config` struct and its per-command sections. Every
//! field has a default, so a config file only needs to name the values it wants
//! to change. Files are read as TOML or JSON based on their extension and as
//! YAML otherwise.
//!
//! # Examples
//!
//! ```no_run
//! use specrec_core::config::Config;
//!
//! # #[tokio::main]
//! # async fn main() -> specrec_core::Result<()> {
//! let mut config = Config::from_file("specrec.yaml").await?;
//! config.apply_security_tokens("bearerAuth=abc123,apiKey=xyz")?;
//! config.dry_run = true;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

use crate::compare::CompareMode;
use crate::resolver::ValueSource;
use crate::Error;

// External imports (alphabetized)
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Configuration for all specrec commands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Settings shared by every command
    #[serde(default)]
    pub global: GlobalConfig,

    /// Settings for `record`
    #[serde(default)]
    pub record: RecordConfig,

    /// Settings for `compare`
    #[serde(default)]
    pub compare: CompareConfig,

    /// Settings for `lint` (and the lint step of `record`)
    #[serde(default)]
    pub lint: LintConfig,

    /// Log decisions without touching the file system
    #[serde(skip)]
    pub dry_run: bool,

    /// Write the spec here instead of back to the input file
    #[serde(skip)]
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Ceiling on in-flight requests and value-provider invocations
    pub simultaneous_requests: usize,

    /// Values for security schemes, keyed by scheme name
    pub security_schemes: IndexMap<String, ValueSource>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            simultaneous_requests: 15,
            security_schemes: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// Directory, relative to the output spec, that fixtures are written to
    pub response_base_path: String,

    /// Delete files in the response directory that this run did not produce
    pub remove_unused_responses: bool,

    /// Rewrite a fixture that only differs at ignored paths
    pub update_response_when_inexact_match: bool,

    /// Rewrite a fixture whose values changed but whose types did not
    pub update_response_when_types_match: bool,

    /// Lint the spec before writing it
    pub and_lint: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            response_base_path: "responses/".to_string(),
            remove_unused_responses: true,
            update_response_when_inexact_match: true,
            update_response_when_types_match: true,
            and_lint: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    pub compare_mode: CompareMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    pub sort_paths_alphabetically: bool,
    pub sort_components_alphabetically: bool,
    pub sync_examples: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            sort_paths_alphabetically: true,
            sort_components_alphabetically: true,
            sync_examples: true,
        }
    }
}

impl Config {
    /// Load configuration from a file, filling unset fields with defaults
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        log::debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Merge `name=value,name2=value2` security tokens over the configured schemes
    pub fn apply_security_tokens(&mut self, tokens: &str) -> crate::Result<()> {
        for pair in tokens.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                Error::config(format!(
                    "Security token '{}' must have the form name=value",
                    pair
                ))
            })?;
            self.global.security_schemes.insert(
                name.trim().to_string(),
                ValueSource::Value(value.trim().into()),
            );
        }
        Ok(())
    }

    /// Ceiling for the scheduler, never below one
    pub fn concurrency(&self) -> usize {
        self.global.simultaneous_requests.max(1)
    }
}
