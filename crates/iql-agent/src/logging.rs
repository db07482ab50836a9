//! Structured logging for the IQL agent
//!
//! Features:
//! - Structured JSON logging for production
//! - Human-readable console logging for development
//! - File rotation with daily log files
//! - Configurable log levels per module

use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE: &str = "iql-agent.log";

/// Directives appended to whatever `RUST_LOG` selects
const DIRECTIVES: &[&str] = &[
    "iql_agent=debug",
    "hyper=warn",
    "reqwest=warn",
    "h2=warn",
    "rustls=warn",
];

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// JSON format for production (structured logging)
    Json,
    /// Compact format for testing
    Compact,
}

impl LogFormat {
    /// Parse from environment variable
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            Ok(_) | Err(_) => LogFormat::Pretty,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to the console only (stderr, keeping stdout for results)
    Stdout,
    /// Log to file only
    File,
    /// Log to both console and file
    Both,
}

impl LogOutput {
    /// Parse from environment variable
    pub fn from_env() -> Self {
        match std::env::var("LOG_OUTPUT").as_deref() {
            Ok("file") => LogOutput::File,
            Ok("both") => LogOutput::Both,
            Ok(_) | Err(_) => LogOutput::Stdout,
        }
    }
}

fn env_filter() -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    DIRECTIVES
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(filter, |filter, directive| filter.add_directive(directive))
}

fn file_layer<S>() -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&log_dir).ok();
    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE);
    fmt::layer().with_writer(appender).with_ansi(false).boxed()
}

fn console_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
    }
}

/// Initialize the logging system
///
/// Environment variables:
/// - `RUST_LOG`: Log level (e.g., "debug", "info", "iql_ast=debug")
/// - `LOG_FORMAT`: Output format ("pretty", "json", "compact")
/// - `LOG_OUTPUT`: Where to write logs ("stdout", "file", "both")
/// - `LOG_DIR`: Directory for log files (default: "./logs")
///
/// Examples:
/// ```bash
/// # Development: pretty console output with parser internals
/// RUST_LOG=info,iql_ast=debug LOG_FORMAT=pretty iql-agent --catalog catalog.yaml "..."
///
/// # Production: JSON to file
/// LOG_FORMAT=json LOG_OUTPUT=file LOG_DIR=/var/log/iql iql-agent --catalog catalog.yaml "..."
/// ```
pub fn init() {
    let format = LogFormat::from_env();
    let output = LogOutput::from_env();

    match output {
        LogOutput::Stdout => tracing_subscriber::registry()
            .with(env_filter())
            .with(console_layer(format))
            .init(),
        LogOutput::File => tracing_subscriber::registry()
            .with(env_filter())
            .with(file_layer())
            .init(),
        LogOutput::Both => tracing_subscriber::registry()
            .with(env_filter())
            .with(console_layer(format))
            .with(file_layer())
            .init(),
    }

    tracing::info!(format = ?format, output = ?output, "Logging system initialized");
    if matches!(output, LogOutput::File | LogOutput::Both) {
        let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
        tracing::debug!(log_dir = %log_dir, "Writing log files");
    }
}
