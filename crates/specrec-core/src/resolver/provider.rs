//! Sources of parameter, body and security values.
//!
//! An example entry either carries a literal `value` or names a `script` that
//! produces one. Scripts are located relative to the spec file and run through a
//! [`ValueProvider`], so the host decides how they are executed.

// Internal imports (std, crate)
use std::collections::HashMap;
use std::path::PathBuf;

use crate::Error;

// External imports (alphabetized)
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::process::Command;
use tokio::sync::Mutex;

/// Where a value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub enum ValueSource {
    /// A literal value; `null` is a value too
    Value(JsonValue),
    /// Path of a script, relative to the spec file's directory
    Script(String),
}

impl ValueSource {
    /// Read a `{script}` or `{value}` entry, `script` taking precedence
    pub fn from_entry(entry: &JsonValue) -> Option<Self> {
        let entry = entry.as_object()?;
        if let Some(script) = entry.get("script").and_then(JsonValue::as_str) {
            return Some(Self::Script(script.to_string()));
        }
        entry.get("value").cloned().map(Self::Value)
    }
}

impl TryFrom<JsonValue> for ValueSource {
    type Error = String;

    fn try_from(entry: JsonValue) -> Result<Self, Self::Error> {
        Self::from_entry(&entry)
            .ok_or_else(|| format!("expected an object with `script` or `value`, got {}", entry))
    }
}

impl From<ValueSource> for JsonValue {
    fn from(source: ValueSource) -> Self {
        let mut entry = Map::new();
        match source {
            ValueSource::Value(value) => entry.insert("value".into(), value),
            ValueSource::Script(script) => entry.insert("script".into(), JsonValue::String(script)),
        };
        JsonValue::Object(entry)
    }
}

/// What a script gets to know about the run
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderContext {
    pub server_url: String,
    /// Directory of the spec file; script paths are relative to it
    pub base_dir: PathBuf,
}

/// Produces the value of a script entry
pub trait ValueProvider: Send + Sync {
    fn provide<'a>(
        &'a self,
        script: &'a str,
        context: &'a ProviderContext,
    ) -> BoxFuture<'a, crate::Result<JsonValue>>;
}

/// Resolve a source, invoking the provider for scripts
pub async fn resolve_source<P: ValueProvider + ?Sized>(
    provider: &P,
    source: &ValueSource,
    context: &ProviderContext,
) -> crate::Result<JsonValue> {
    match source {
        ValueSource::Value(value) => Ok(value.clone()),
        ValueSource::Script(script) => provider.provide(script, context).await,
    }
}

/// Runs scripts as subprocesses
///
/// The script receives the server URL as its first argument and in
/// `SERVER_URL`. Its trimmed stdout is parsed as JSON, or kept as a string when
/// it is not JSON. Callers asking for a script that is already running share
/// that run; once it has finished, the next call runs the script again.
#[derive(Default)]
pub struct ScriptProvider {
    running: Mutex<HashMap<PathBuf, ScriptRun>>,
}

type ScriptRun = Shared<BoxFuture<'static, Result<JsonValue, String>>>;

impl ScriptProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ValueProvider for ScriptProvider {
    fn provide<'a>(
        &'a self,
        script: &'a str,
        context: &'a ProviderContext,
    ) -> BoxFuture<'a, crate::Result<JsonValue>> {
        Box::pin(async move {
            let path = context.base_dir.join(script);
            let run = {
                let mut running = self.running.lock().await;
                running
                    .entry(path.clone())
                    .or_insert_with(|| {
                        run_script(path.clone(), context.server_url.clone())
                            .boxed()
                            .shared()
                    })
                    .clone()
            };
            let result = run.clone().await;

            let mut running = self.running.lock().await;
            if running.get(&path).is_some_and(|current| current.ptr_eq(&run)) {
                running.remove(&path);
            }
            drop(running);

            result.map_err(|message| Error::resolution(format!("script {}", path.display()), message))
        })
    }
}

async fn run_script(path: PathBuf, server_url: String) -> Result<JsonValue, String> {
    let program = tokio::fs::canonicalize(&path)
        .await
        .map_err(|e| format!("cannot locate {}: {}", path.display(), e))?;
    log::debug!("Running value script {}", program.display());

    let output = Command::new(&program)
        .arg(&server_url)
        .env("SERVER_URL", &server_url)
        .output()
        .await
        .map_err(|e| format!("failed to run {}: {}", program.display(), e))?;

    if !output.status.success() {
        return Err(format!(
            "exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = stdout.trim();
    Ok(serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    #[cfg(unix)]
    use std::path::Path;

    #[test]
    fn test_from_entry() {
        assert_eq!(
            ValueSource::from_entry(&json!({ "value": 3 })),
            Some(ValueSource::Value(json!(3)))
        );
        assert_eq!(
            ValueSource::from_entry(&json!({ "value": null })),
            Some(ValueSource::Value(JsonValue::Null))
        );
        assert_eq!(
            ValueSource::from_entry(&json!({ "script": "./a.sh", "value": 1 })),
            Some(ValueSource::Script("./a.sh".into()))
        );
        assert_eq!(ValueSource::from_entry(&json!({ "other": 1 })), None);
        assert_eq!(ValueSource::from_entry(&json!("value")), None);
    }

    #[test]
    fn test_serde_shape() -> crate::Result<()> {
        let source: ValueSource = serde_json::from_value(json!({ "script": "token.sh" }))?;
        assert_eq!(source, ValueSource::Script("token.sh".into()));
        assert_eq!(serde_json::to_value(&source)?, json!({ "script": "token.sh" }));
        assert!(serde_json::from_value::<ValueSource>(json!({ "nope": 1 })).is_err());
        Ok(())
    }

    #[cfg(unix)]
    async fn counting_script(dir: &Path) -> crate::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let counter = dir.join("count");
        let script = dir.join("token.sh");
        tokio::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho run >> \"{}\"\nsleep 0.2\necho \"{{\\\"server\\\": \\\"$1\\\", \\\"env\\\": \\\"$SERVER_URL\\\"}}\"\n",
                counter.display()
            ),
        )
        .await?;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
        Ok(counter)
    }

    #[cfg(unix)]
    async fn run_count(counter: &Path) -> crate::Result<usize> {
        Ok(tokio::fs::read_to_string(counter).await?.lines().count())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_provider_shares_overlapping_runs() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let counter = counting_script(dir.path()).await?;

        let provider = ScriptProvider::new();
        let context = ProviderContext {
            server_url: "https://example.com".into(),
            base_dir: dir.path().to_path_buf(),
        };
        let (a, b) = tokio::join!(
            provider.provide("token.sh", &context),
            provider.provide("token.sh", &context)
        );
        let expected = json!({ "server": "https://example.com", "env": "https://example.com" });
        assert_eq!(a?, expected);
        assert_eq!(b?, expected);
        assert_eq!(run_count(&counter).await?, 1);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_provider_reruns_sequential_calls() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let counter = counting_script(dir.path()).await?;

        let provider = ScriptProvider::new();
        let context = ProviderContext {
            server_url: "http://localhost".into(),
            base_dir: dir.path().to_path_buf(),
        };
        provider.provide("token.sh", &context).await?;
        provider.provide("token.sh", &context).await?;
        assert_eq!(run_count(&counter).await?, 2);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_provider_plain_text_and_failure() -> crate::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let text = dir.path().join("text.sh");
        tokio::fs::write(&text, "#!/bin/sh\necho 'async value 1'\n").await?;
        std::fs::set_permissions(&text, std::fs::Permissions::from_mode(0o755))?;
        let failing = dir.path().join("fail.sh");
        tokio::fs::write(&failing, "#!/bin/sh\necho broken >&2\nexit 3\n").await?;
        std::fs::set_permissions(&failing, std::fs::Permissions::from_mode(0o755))?;

        let provider = ScriptProvider::new();
        let context = ProviderContext {
            server_url: "http://localhost".into(),
            base_dir: dir.path().to_path_buf(),
        };
        assert_eq!(provider.provide("text.sh", &context).await?, json!("async value 1"));

        let err = provider.provide("fail.sh", &context).await.unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(provider.provide("missing.sh", &context).await.is_err());
        Ok(())
    }
}
