//! Bridge configuration
//!
//! [`BridgeConfig`] is the shape of the host's configuration map: camelCase
//! keys, every field optional, pattern overrides at the top level. Values
//! written as strings (`"true"`, `"8000"`) are accepted wherever a boolean or
//! number is expected, since property maps often carry everything as text.

use std::path::Path;
use std::time::Duration;

use bridge_session::{ReconnectPolicy, SessionConfig, MAX_TIMING};
use cec_protocol::{PatternConfig, PatternSet};
use line_transport::{ProcessConfig, TcpConfig, TransportConfig};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

pub const DEFAULT_CEC_CLIENT_PATH: &str = "/usr/bin/cec-client";

/// Configuration for a [`CecBridge`](crate::CecBridge)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Path to the cec-client executable
    /// Default: `/usr/bin/cec-client`
    pub cec_client_path: String,

    /// Adapter port passed to cec-client after `client_args`
    /// Default: none, cec-client picks the first adapter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub com_port: Option<String>,

    /// Leading cec-client arguments
    /// Default: `--log-level 1`
    pub client_args: Vec<String>,

    /// Talk to a TCP peer instead of spawning cec-client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::port"
    )]
    pub port: Option<u16>,

    /// Wall-clock ceiling for one discovery capture
    /// Default: 20 seconds
    #[serde(deserialize_with = "lenient::number")]
    pub discovery_timeout_secs: u64,

    /// Reconnect with backoff after the connection fails
    /// Default: false
    #[serde(deserialize_with = "lenient::flag")]
    pub reconnect: bool,

    #[serde(flatten)]
    pub patterns: PatternConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cec_client_path: DEFAULT_CEC_CLIENT_PATH.to_string(),
            com_port: None,
            client_args: vec!["--log-level".to_string(), "1".to_string()],
            host: None,
            port: None,
            discovery_timeout_secs: 20,
            reconnect: false,
            patterns: PatternConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the host's configuration map. Unknown keys are ignored.
    pub fn from_properties(properties: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(properties))?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_cec_client_path(mut self, path: impl Into<String>) -> Self {
        self.cec_client_path = path.into();
        self
    }

    pub fn with_com_port(mut self, port: impl Into<String>) -> Self {
        self.com_port = Some(port.into());
        self
    }

    pub fn with_client_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Use a TCP peer at `host:port`.
    pub fn with_socket(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn with_discovery_timeout_secs(mut self, secs: u64) -> Self {
        self.discovery_timeout_secs = secs;
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_patterns(mut self, patterns: PatternConfig) -> Self {
        self.patterns = patterns;
        self
    }

    /// Whether this configures a TCP peer rather than a subprocess.
    pub fn is_socket(&self) -> bool {
        self.host.is_some()
    }

    /// Validate the configuration and return any issues
    ///
    /// Runs before anything is spawned, so a bad path or pattern is reported
    /// as a configuration error rather than a failed connection.
    pub fn validate(&self) -> Result<()> {
        match (&self.host, self.port) {
            (Some(host), _) if host.trim().is_empty() => {
                return Err(BridgeError::Config("Host must not be empty".to_string()));
            }
            (Some(_), None) => {
                return Err(BridgeError::Config(
                    "A port is required when a host is configured".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(BridgeError::Config(
                    "A host is required when a port is configured".to_string(),
                ));
            }
            (None, None) => self.validate_executable()?,
            _ => {}
        }

        if self.discovery_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "Discovery timeout must be greater than 0".to_string(),
            ));
        }
        if self.discovery_timeout_secs > MAX_TIMING.as_secs() {
            return Err(BridgeError::Config(format!(
                "Discovery timeout must not exceed {}s",
                MAX_TIMING.as_secs()
            )));
        }

        self.patterns.compile()?;
        Ok(())
    }

    /// Explicit paths must exist; bare names are left to `PATH` lookup.
    fn validate_executable(&self) -> Result<()> {
        let path = self.cec_client_path.trim();
        if path.is_empty() {
            return Err(BridgeError::Config(
                "cec-client executable not found: no path configured".to_string(),
            ));
        }
        let path = Path::new(path);
        if path.components().count() > 1 && !path.exists() {
            return Err(BridgeError::Config(format!(
                "cec-client executable not found: {}",
                path.display()
            )));
        }
        Ok(())
    }

    /// Compile the effective line patterns.
    pub fn pattern_set(&self) -> Result<PatternSet> {
        Ok(self.patterns.compile()?)
    }

    /// Which transport to open.
    pub fn to_transport_config(&self) -> TransportConfig {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => TransportConfig::Tcp(TcpConfig::new(host.clone(), port)),
            _ => TransportConfig::Process(
                ProcessConfig::new(self.cec_client_path.trim())
                    .with_args(self.client_args.iter().cloned())
                    .with_args(self.com_port.iter().cloned()),
            ),
        }
    }

    pub fn to_session_config(&self) -> SessionConfig {
        let reconnect = if self.reconnect {
            ReconnectPolicy::backoff()
        } else {
            ReconnectPolicy::Disabled
        };
        SessionConfig::default()
            .with_discovery_timeout(Duration::from_secs(self.discovery_timeout_secs))
            .with_reconnect(reconnect)
    }
}

/// Deserializers accepting both native JSON values and their string spelling.
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Text(String),
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Flag::deserialize(deserializer)? {
            Flag::Bool(value) => Ok(value),
            Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" | "" => Ok(false),
                other => Err(D::Error::custom(format!("expected a boolean, got {other:?}"))),
            },
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Number::deserialize(deserializer)? {
            Number::Int(value) => Ok(value),
            Number::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected a number, got {text:?}"))),
        }
    }

    pub fn port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
        let value = match Option::<Number>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(Number::Text(text)) if text.trim().is_empty() => return Ok(None),
            Some(Number::Int(value)) => value,
            Some(Number::Text(text)) => text
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected a port, got {text:?}")))?,
        };
        u16::try_from(value)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("port out of range: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn properties(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.cec_client_path, "/usr/bin/cec-client");
        assert_eq!(config.client_args, vec!["--log-level", "1"]);
        assert_eq!(config.discovery_timeout_secs, 20);
        assert!(!config.reconnect);
        assert!(!config.is_socket());
    }

    #[test]
    fn test_from_properties() {
        let config = BridgeConfig::from_properties(properties(json!({
            "cecClientPath": "/opt/cec/bin/cec-client",
            "comPort": "RPI",
            "reconnect": "true",
            "discoveryTimeoutSecs": "5",
            "powerOnRegex": ".*: power on (.)",
            "ActiveSourceOffRegex": ".*inactive (.)",
            "deviceIndex": "0"
        })))
        .unwrap();

        assert_eq!(config.cec_client_path, "/opt/cec/bin/cec-client");
        assert_eq!(config.com_port.as_deref(), Some("RPI"));
        assert!(config.reconnect);
        assert_eq!(config.discovery_timeout_secs, 5);
        assert_eq!(config.patterns.power_on_regex.as_deref(), Some(".*: power on (.)"));
        assert_eq!(config.patterns.active_source_off_regex.as_deref(), Some(".*inactive (.)"));
    }

    #[rstest]
    #[case(json!(true), true)]
    #[case(json!("true"), true)]
    #[case(json!("TRUE"), true)]
    #[case(json!(false), false)]
    #[case(json!("false"), false)]
    fn test_reconnect_flag_spellings(#[case] value: serde_json::Value, #[case] expected: bool) {
        let config = BridgeConfig::from_properties(properties(json!({ "reconnect": value }))).unwrap();
        assert_eq!(config.reconnect, expected);
    }

    #[test]
    fn test_bad_flag_is_rejected() {
        let result = BridgeConfig::from_json_str(r#"{"reconnect": "sometimes"}"#);
        assert!(matches!(result, Err(BridgeError::Json(_))));
    }

    #[test]
    fn test_socket_config() {
        let config = BridgeConfig::from_json_str(r#"{"host": "10.0.0.2", "port": "9526"}"#).unwrap();
        assert!(config.is_socket());
        assert!(config.validate().is_ok());
        match config.to_transport_config() {
            TransportConfig::Tcp(tcp) => assert_eq!(tcp.address(), "10.0.0.2:9526"),
            other => panic!("expected tcp, got {other:?}"),
        }
    }

    #[rstest]
    #[case(r#"{"host": "10.0.0.2"}"#)]
    #[case(r#"{"port": 9526}"#)]
    #[case(r#"{"host": " ", "port": 9526}"#)]
    #[case(r#"{"host": "10.0.0.2", "port": 9526, "discoveryTimeoutSecs": 0}"#)]
    #[case(r#"{"host": "10.0.0.2", "port": 9526, "discoveryTimeoutSecs": 86401}"#)]
    #[case(r#"{"host": "10.0.0.2", "port": 9526, "discoveryTimeoutSecs": 18446744073709551615}"#)]
    #[case(r#"{"cecClientPath": ""}"#)]
    #[case(r#"{"cecClientPath": "/nonexistent/bin/cec-client"}"#)]
    fn test_invalid_configs(#[case] json: &str) {
        let config = BridgeConfig::from_json_str(json).unwrap();
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let config = BridgeConfig::new()
            .with_socket("localhost", 9526)
            .with_patterns(PatternConfig::new().with_power_on("(unclosed"));
        assert!(matches!(config.validate(), Err(BridgeError::Protocol(_))));
    }

    #[test]
    fn test_process_arguments() {
        let config = BridgeConfig::new()
            .with_cec_client_path("cec-client")
            .with_com_port("/dev/ttyACM0");
        assert!(config.validate().is_ok());
        match config.to_transport_config() {
            TransportConfig::Process(process) => {
                assert_eq!(process.program, std::path::PathBuf::from("cec-client"));
                assert_eq!(process.args, vec!["--log-level", "1", "/dev/ttyACM0"]);
            }
            other => panic!("expected process, got {other:?}"),
        }
    }

    #[test]
    fn test_session_config() {
        let session = BridgeConfig::new()
            .with_discovery_timeout_secs(7)
            .with_reconnect(true)
            .to_session_config();
        assert_eq!(session.discovery_timeout, Duration::from_secs(7));
        assert!(session.reconnect.is_enabled());
        assert!(session.validate().is_ok());
    }
}
