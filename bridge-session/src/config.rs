//! Configuration types for bridge sessions
//!
//! Timings for the reader loop, discovery capture and the start/stop
//! handshakes, plus the reconnect policy.

use std::time::Duration;

use crate::error::{Result, SessionError};
use crate::supervisor::ReconnectPolicy;

/// Upper bound for every timing, so deadlines stay representable.
pub const MAX_TIMING: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for a [`Session`](crate::Session)
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Backoff between empty reads
    /// Default: 150 milliseconds
    pub poll_interval: Duration,

    /// Wall-clock ceiling for one discovery capture
    /// Default: 20 seconds
    pub discovery_timeout: Duration,

    /// Extra time a blocking `discover` waits on top of `discovery_timeout`
    /// for the capture to begin
    /// Default: 5 seconds
    pub discovery_grace: Duration,

    /// How long a (re)start waits for the previous reader to finish
    /// Default: 5 seconds
    pub restart_grace: Duration,

    /// How long `stop` lets the peer exit after the quit command
    /// Default: 1 second
    pub shutdown_grace: Duration,

    /// How long `stop` waits for the reader thread to finish
    /// Default: 5 seconds
    pub stop_timeout: Duration,

    /// What to do after the connection fails
    /// Default: no automatic reconnect
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(150),
            discovery_timeout: Duration::from_secs(20),
            discovery_grace: Duration::from_secs(5),
            restart_grace: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::Disabled,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short timings for tests and in-process peers
    pub fn low_latency() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            discovery_timeout: Duration::from_secs(2),
            discovery_grace: Duration::from_secs(1),
            restart_grace: Duration::from_secs(1),
            shutdown_grace: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(SessionError::Configuration(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.discovery_timeout.is_zero() {
            return Err(SessionError::Configuration(
                "Discovery timeout must be greater than 0".to_string(),
            ));
        }

        if self.stop_timeout.is_zero() {
            return Err(SessionError::Configuration(
                "Stop timeout must be greater than 0".to_string(),
            ));
        }

        let timings = [
            ("Poll interval", self.poll_interval),
            ("Discovery timeout", self.discovery_timeout),
            ("Discovery grace", self.discovery_grace),
            ("Restart grace", self.restart_grace),
            ("Shutdown grace", self.shutdown_grace),
            ("Stop timeout", self.stop_timeout),
        ];
        for (name, value) in timings {
            if value > MAX_TIMING {
                return Err(SessionError::Configuration(format!(
                    "{name} must not exceed {}s, got {value:?}",
                    MAX_TIMING.as_secs()
                )));
            }
        }

        self.reconnect.validate()
    }

    /// How long a blocking `discover` waits for its result.
    pub fn discovery_wait(&self) -> Duration {
        self.discovery_timeout.saturating_add(self.discovery_grace)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn with_discovery_grace(mut self, grace: Duration) -> Self {
        self.discovery_grace = grace;
        self
    }

    pub fn with_restart_grace(mut self, grace: Duration) -> Self {
        self.restart_grace = grace;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
