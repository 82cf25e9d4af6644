//! Logging setup shared by the omnicast binaries
//!
//! All log output goes to stderr so stdout stays clean for piped command
//! output. The daemon picks a format with `--log-format`; the one-shot CLIs
//! use the quiet text setup from [`init_cli`]. `RUST_LOG` overrides the
//! level wherever it is set.

use std::io;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text, no colors
    Text,
    /// One JSON object per line, with file/line and span fields
    Json,
    /// Multi-line colored output for development
    Pretty,
}

impl LogFormat {
    /// Format named by `OMNICAST_LOG_FORMAT`, falling back to text
    pub fn from_env() -> Self {
        std::env::var("OMNICAST_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text)
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!(
                "unknown log format '{}' (expected text, json, or pretty)",
                other
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        })
    }
}

/// Level resolution: `--verbose` wins, then `RUST_LOG`, then
/// `OMNICAST_LOG_LEVEL`, then the caller's default.
fn resolve_filter(default_level: &str, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level =
        std::env::var("OMNICAST_LOG_LEVEL").unwrap_or_else(|_| default_level.to_string());
    EnvFilter::new(level)
}

/// Install the global subscriber. Call once, before any logging happens;
/// panics on a second call.
pub fn init(format: LogFormat, default_level: &str, verbose: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(default_level, verbose))
        .with_writer(io::stderr);

    match format {
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .with_file(true)
            .with_line_number(true)
            .init(),
        LogFormat::Pretty => builder.pretty().with_file(true).with_line_number(true).init(),
        LogFormat::Text => builder.with_target(false).init(),
    }
}

/// Setup for the one-shot CLIs: text to stderr, errors only, unless
/// `--verbose` or the environment asks for more.
pub fn init_cli(verbose: bool) {
    init(LogFormat::from_env(), "error", verbose);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_format_parsing() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!(" Json ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);

        let err = "yaml".parse::<LogFormat>().unwrap_err();
        assert!(err.contains("unknown log format 'yaml'"));
    }

    #[test]
    fn test_format_display_round_trips() {
        for format in [LogFormat::Text, LogFormat::Json, LogFormat::Pretty] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }

    #[test]
    #[serial]
    fn test_format_from_env() {
        std::env::set_var("OMNICAST_LOG_FORMAT", "json");
        assert_eq!(LogFormat::from_env(), LogFormat::Json);

        std::env::set_var("OMNICAST_LOG_FORMAT", "not-a-format");
        assert_eq!(LogFormat::from_env(), LogFormat::Text);

        std::env::remove_var("OMNICAST_LOG_FORMAT");
        assert_eq!(LogFormat::from_env(), LogFormat::Text);
    }
}
