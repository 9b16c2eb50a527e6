//! specrec CLI entrypoint
//! Parses command-line arguments, installs logging and dispatches to the core workflows.

// Internal imports (std, crate)
use std::path::PathBuf;

// External imports (alphabetized)
use anyhow::Context;
use clap::{Args, Parser};
use specrec_core::workflows::{compare, lint, record, validate};
use specrec_core::{CompareMode, Config, ReqwestInvoker, ScriptProvider};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "specrec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// No logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Record the responses of the spec's examples as fixtures
    Record {
        /// Spec file (JSON or YAML)
        spec_file: PathBuf,
        /// Server to send requests to (defaults to the first of `servers`)
        server_url: Option<String>,
        #[command(flatten)]
        options: CommonOptions,
        /// Log what would change without writing anything
        #[arg(short, long)]
        dry_run: bool,
    },
    /// Compare a server's responses with the recorded fixtures
    Compare {
        /// Spec file (JSON or YAML)
        spec_file: PathBuf,
        /// Server to send requests to (defaults to the first of `servers`)
        server_url: Option<String>,
        #[command(flatten)]
        options: CommonOptions,
        /// Override the configured comparison mode
        #[arg(short = 'm', long, value_enum)]
        compare_mode: Option<CompareMode>,
    },
    /// Sort the spec and sync its examples
    Lint {
        /// Spec file (JSON or YAML)
        spec_file: PathBuf,
        /// Server passed to value scripts (defaults to the first of `servers`)
        server_url: Option<String>,
        #[command(flatten)]
        options: CommonOptions,
        /// Log what would change without writing anything
        #[arg(short, long)]
        dry_run: bool,
    },
    /// Check that a spec is a valid OpenAPI 3 document
    Validate {
        /// Path or URL of the spec (JSON or YAML)
        spec: String,
    },
}

#[derive(Args, Debug)]
pub struct CommonOptions {
    /// Config file (YAML, JSON or TOML) overriding the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Output file (if different to the spec file)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Security values as `scheme=value,scheme2=value2`
    #[arg(long)]
    sec_tokens: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Record {
            spec_file,
            server_url,
            options,
            dry_run,
        } => {
            let mut config = load_config(&options).await?;
            config.dry_run = dry_run;
            record::record(
                &spec_file,
                server_url.as_deref(),
                &config,
                &ScriptProvider::new(),
                &ReqwestInvoker::new(),
            )
            .await
            .with_context(|| format!("Failed to record {}", spec_file.display()))?;
        }
        Commands::Compare {
            spec_file,
            server_url,
            options,
            compare_mode,
        } => {
            let mut config = load_config(&options).await?;
            if let Some(mode) = compare_mode {
                config.compare.compare_mode = mode;
            }
            let report = compare::compare(
                &spec_file,
                server_url.as_deref(),
                &config,
                &ScriptProvider::new(),
                &ReqwestInvoker::new(),
            )
            .await
            .with_context(|| format!("Failed to compare {}", spec_file.display()))?;
            if report.has_differences() {
                std::process::exit(report.exit_code());
            }
        }
        Commands::Lint {
            spec_file,
            server_url,
            options,
            dry_run,
        } => {
            let mut config = load_config(&options).await?;
            config.dry_run = dry_run;
            lint::lint(
                &spec_file,
                server_url.as_deref(),
                &config,
                &ScriptProvider::new(),
            )
            .await
            .with_context(|| format!("Failed to lint {}", spec_file.display()))?;
        }
        Commands::Validate { spec } => {
            validate::validate(&spec).await?;
        }
    }

    Ok(())
}

/// Install the log sink; `RUST_LOG` wins over the flags
fn init_logging(quiet: bool, verbose: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "off",
        (_, true) => "debug",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    tracing::debug!("Logging initialised at {}", level);
}

async fn load_config(options: &CommonOptions) -> anyhow::Result<Config> {
    let mut config = match &options.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(tokens) = &options.sec_tokens {
        config.apply_security_tokens(tokens)?;
    }
    config.output_file = options.output.clone();
    Ok(config)
}
