//! Logging setup
//!
//! The bridge logs through `tracing`. Applications embedding it usually
//! install their own subscriber; these helpers cover the common cases for
//! binaries and examples.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable selecting the [`LoggingMode`]
pub const LOG_MODE_ENV: &str = "CEC_BRIDGE_LOG_MODE";

/// Environment variable overriding the filter, in `EnvFilter` syntax
pub const LOG_LEVEL_ENV: &str = "CEC_BRIDGE_LOG_LEVEL";

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Verbose output with threads and source locations at `debug`
    Debug,
}

impl LoggingMode {
    /// Parse a mode name; unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "silent" => Some(LoggingMode::Silent),
            "development" | "dev" => Some(LoggingMode::Development),
            "debug" => Some(LoggingMode::Debug),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
}

/// Initialize logging with the specified mode
///
/// Call once, early. Every raw cec-client line is logged at `trace`, state
/// transitions at `debug`, faults at `warn`.
///
/// # Examples
///
/// ```rust,ignore
/// cec_bridge::logging::init_logging(LoggingMode::Development)?;
///
/// // Only the reader loop, verbosely
/// std::env::set_var("CEC_BRIDGE_LOG_LEVEL", "bridge_session=trace");
/// cec_bridge::logging::init_logging(LoggingMode::Debug)?;
/// ```
///
/// # Environment Variables
///
/// - `CEC_BRIDGE_LOG_LEVEL`: filter override (e.g. `debug`,
///   `cec_protocol=trace`)
/// - `RUST_LOG`: used when `CEC_BRIDGE_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;
            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_names(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;
            Registry::default()
                .with(
                    fmt::layer()
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `CEC_BRIDGE_LOG_MODE`
///
/// `silent`, `development` or `debug`; anything else means silent.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var(LOG_MODE_ENV)
        .ok()
        .and_then(|name| LoggingMode::from_name(&name))
        .unwrap_or(LoggingMode::Silent);
    init_logging(mode)
}

/// `CEC_BRIDGE_LOG_LEVEL`, then `RUST_LOG`, then `default_level`.
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var(LOG_LEVEL_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());
    parse_filter(&directives)
}

fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
}

/// Whether a global subscriber is already installed.
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(LoggingMode::from_name("Debug"), Some(LoggingMode::Debug));
        assert_eq!(LoggingMode::from_name("dev"), Some(LoggingMode::Development));
        assert_eq!(LoggingMode::from_name("loud"), None);
    }

    #[test]
    fn test_filter_parsing() {
        assert!(parse_filter("bridge_session=trace,info").is_ok());
        assert!(matches!(
            parse_filter("bridge_session=loudest"),
            Err(LoggingError::InvalidFilter(_))
        ));
    }
}
