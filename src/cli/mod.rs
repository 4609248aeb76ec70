//! CLI command definitions and handlers

mod analyze;
mod rules;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use craftcheck::config::{AnalysisConfig, ThresholdValue, CONFIG_FILE_NAME};
use craftcheck::Severity;
use std::path::{Path, PathBuf};

/// Parse and validate workers count (1-16)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > craftcheck::config::MAX_WORKERS {
        Err(format!(
            "workers cannot exceed {}",
            craftcheck::config::MAX_WORKERS
        ))
    } else {
        Ok(n)
    }
}

/// craftcheck - clean-code rules over language-neutral structural models
#[derive(Parser, Debug)]
#[command(name = "craftcheck")]
#[command(
    version,
    about = "Rule-based code quality analysis over structural models",
    after_help = "\
Examples:
  craftcheck analyze src/*.ir.json             Analyze model files
  craftcheck analyze . --fail-on medium        Exit 1 on medium+ findings
  craftcheck rules                             List the rule catalog"
)]
pub struct Cli {
    /// Config file (default: ./craftcheck.toml when present)
    #[arg(long, global = true, env = "CRAFTCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG wins when set
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze files or directories
    Analyze {
        /// Files or directories to analyze
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Number of parallel workers (1-16); overrides the config file
        #[arg(long, value_parser = parse_workers)]
        workers: Option<usize>,

        /// Output format
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Exit with status 1 when a diagnostic at or above this severity remains
        #[arg(long, value_enum)]
        fail_on: Option<FailOn>,
    },

    /// List the rule catalog with thresholds and defaults
    Rules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailOn {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl From<FailOn> for Severity {
    fn from(f: FailOn) -> Self {
        match f {
            FailOn::Info => Severity::Info,
            FailOn::Low => Severity::Low,
            FailOn::Medium => Severity::Medium,
            FailOn::High => Severity::High,
            FailOn::Critical => Severity::Critical,
        }
    }
}

/// Explicit config path, else `craftcheck.toml` in the working directory,
/// else defaults
fn load_config(explicit: Option<&Path>) -> Result<AnalysisConfig> {
    if let Some(path) = explicit {
        return AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    let default_path = Path::new(CONFIG_FILE_NAME);
    if default_path.is_file() {
        return AnalysisConfig::load(default_path)
            .with_context(|| format!("Failed to load config {}", default_path.display()));
    }
    Ok(AnalysisConfig::default())
}

/// Run the selected command, returning the process exit code
pub fn run(cli: Cli) -> Result<i32> {
    let mut config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Analyze {
            paths,
            workers,
            format,
            fail_on,
        } => {
            if let Some(n) = workers {
                config.workers = Some(ThresholdValue::Integer(n as i64));
            }
            analyze::run(&paths, &config, format, fail_on.map(Severity::from))
        }
        Commands::Rules => {
            rules::run(&config)?;
            Ok(0)
        }
    }
}
