// # docaudit - Audit-eligible model scanner
//
// The docaudit binary is a THIN layer over docaudit-core. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging
// 3. Running the startup scanner against a project root
// 4. Printing the models that would be audited
//
// No audit logic lives here; everything it reports comes from
// `docaudit_core::Scanner`.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `DOCAUDIT_SCAN_ROOT`: Project root (default: nearest Cargo.toml upward)
// - `DOCAUDIT_EXCLUDE`: Comma-separated root-relative prefixes to skip
//   (default: src/bin,target,vendor,.git)
// - `DOCAUDIT_MARKER`: Marker type name (default: AuditMarker)
// - `DOCAUDIT_OUTPUT`: Output format, text or json (default: text)
// - `DOCAUDIT_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export DOCAUDIT_SCAN_ROOT=/srv/app
// export DOCAUDIT_EXCLUDE=target,tests/fixtures
// export DOCAUDIT_OUTPUT=json
//
// docaudit
// ```

use anyhow::Result;
use docaudit_core::{ModelRegistry, ScanConfig, ScanReport, Scanner};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Scan completed (directory-level errors are reported, not fatal)
/// - 1: Configuration error
/// - 2: Runtime error (scan could not run)
#[derive(Debug, Clone, Copy)]
enum DocauditExitCode {
    /// Scan completed
    Clean = 0,
    /// Configuration error
    ConfigError = 1,
    /// Scan failed
    RuntimeError = 2,
}

impl From<DocauditExitCode> for ExitCode {
    fn from(code: DocauditExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

/// Application configuration
struct Config {
    scan_root: Option<PathBuf>,
    exclude: Option<Vec<String>>,
    marker: Option<String>,
    output: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self {
            scan_root: env::var("DOCAUDIT_SCAN_ROOT").ok().map(PathBuf::from),
            exclude: env::var("DOCAUDIT_EXCLUDE").ok().map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            }),
            marker: env::var("DOCAUDIT_MARKER").ok(),
            output: env::var("DOCAUDIT_OUTPUT").unwrap_or_else(|_| "text".to_string()),
            log_level: env::var("DOCAUDIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if let Some(ref root) = self.scan_root {
            if root.as_os_str().is_empty() {
                anyhow::bail!("DOCAUDIT_SCAN_ROOT cannot be empty");
            }
            if !root.is_dir() {
                anyhow::bail!(
                    "DOCAUDIT_SCAN_ROOT is not a directory: {}",
                    root.display()
                );
            }
        }

        self.output_format()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DOCAUDIT_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.scan_config().validate()?;
        Ok(())
    }

    fn output_format(&self) -> Result<OutputFormat> {
        match self.output.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => anyhow::bail!(
                "DOCAUDIT_OUTPUT '{}' is not supported. Supported formats: text, json",
                self.output
            ),
        }
    }

    fn scan_config(&self) -> ScanConfig {
        let mut config = ScanConfig {
            root: self.scan_root.clone(),
            ..ScanConfig::default()
        };
        if let Some(ref exclude) = self.exclude {
            config.exclude_prefixes = exclude.clone();
        }
        if let Some(ref marker) = self.marker {
            config.marker_type = marker.trim().to_string();
        }
        config
    }
}

fn main() -> ExitCode {
    let config = Config::from_env();

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DocauditExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout carries only the report
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DocauditExitCode::ConfigError.into();
    }

    match run(&config) {
        Ok(()) => DocauditExitCode::Clean.into(),
        Err(e) => {
            error!("Scan failed: {}", e);
            DocauditExitCode::RuntimeError.into()
        }
    }
}

/// Run one scan and print the report
fn run(config: &Config) -> Result<()> {
    let format = config.output_format()?;
    let scanner = Scanner::new(config.scan_config());
    let registry = ModelRegistry::new();

    info!("Starting docaudit scan");
    let report = scanner.scan(&registry)?;
    registry.seal();

    for e in &report.errors {
        warn!("{}", e);
    }

    match format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

fn print_text(report: &ScanReport) {
    println!("root: {}", report.root.display());
    println!("directories scanned: {}", report.directories_scanned);
    println!("audit-eligible models: {}", report.registered.len());
    for model in &report.registered {
        println!("  {}", model);
    }
    if !report.errors.is_empty() {
        println!("errors: {}", report.errors.len());
        for e in &report.errors {
            println!("  {}", e);
        }
    }
}

fn print_json(report: &ScanReport) -> Result<()> {
    let errors: Vec<String> = report.errors.iter().map(|e| e.to_string()).collect();
    let value = serde_json::json!({
        "root": report.root.display().to_string(),
        "directories_scanned": report.directories_scanned,
        "models": report.registered,
        "errors": errors,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
