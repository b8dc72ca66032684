//! Reconnect supervision
//!
//! When enabled, a faulted session gets a supervisor thread that retries the
//! connection with bounded exponential backoff. The supervisor restarts
//! through the same lifecycle guard as an explicit `start`, so a retry can
//! never produce a second reader. It gives up as soon as the session is
//! stopped or restarted by someone else.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::MAX_TIMING;
use crate::error::{Result, SessionError};
use crate::session::{Shared, StartOutcome};

/// What a session does after its connection fails.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Stay offline until restarted explicitly
    #[default]
    Disabled,
    /// Retry after `initial`, multiplying the delay by `factor` up to `max`,
    /// at most `max_attempts` times
    Backoff {
        initial: Duration,
        max: Duration,
        factor: u32,
        max_attempts: u32,
    },
}

impl ReconnectPolicy {
    /// 1 s, 2 s, 4 s, 8 s, 16 s
    pub fn backoff() -> Self {
        ReconnectPolicy::Backoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            factor: 2,
            max_attempts: 5,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ReconnectPolicy::Backoff { max_attempts, .. } if *max_attempts > 0)
    }

    /// Delay before each attempt.
    pub fn delays(&self) -> Vec<Duration> {
        match *self {
            ReconnectPolicy::Disabled => Vec::new(),
            ReconnectPolicy::Backoff {
                initial,
                max,
                factor,
                max_attempts,
            } => (0..max_attempts)
                .map(|attempt| {
                    initial
                        .checked_mul(factor.saturating_pow(attempt))
                        .unwrap_or(max)
                        .min(max)
                })
                .collect(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let ReconnectPolicy::Backoff {
            initial,
            max,
            factor,
            ..
        } = self
        {
            if initial.is_zero() {
                return Err(SessionError::Configuration(
                    "Reconnect delay must be greater than 0".to_string(),
                ));
            }
            if initial > max {
                return Err(SessionError::Configuration(
                    "Invalid reconnect delay: initial must not exceed max".to_string(),
                ));
            }
            if *max > MAX_TIMING {
                return Err(SessionError::Configuration(format!(
                    "Reconnect delay must not exceed {}s",
                    MAX_TIMING.as_secs()
                )));
            }
            if *factor == 0 {
                return Err(SessionError::Configuration(
                    "Reconnect factor must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Spawn a supervisor for the connection that faulted in `generation`.
pub(crate) fn spawn(shared: Arc<Shared>, generation: u64) {
    let delays = shared.config.reconnect.delays();
    let spawned = thread::Builder::new()
        .name("cec-bridge-supervisor".to_string())
        .spawn(move || run(&shared, generation, delays));
    if let Err(e) = spawned {
        tracing::warn!("Failed to spawn reconnect supervisor: {}", e);
    }
}

fn run(shared: &Arc<Shared>, generation: u64, delays: Vec<Duration>) {
    let attempts = delays.len();
    for (attempt, delay) in delays.into_iter().enumerate() {
        if !sleep_unless_superseded(shared, generation, delay) {
            tracing::debug!("Reconnect abandoned: session stopped or restarted");
            return;
        }

        tracing::info!(attempt = attempt + 1, attempts, "Reconnecting bridge session");
        match shared.reconnect(generation) {
            Ok(StartOutcome::Started) => {
                tracing::info!(attempt = attempt + 1, "Bridge session reconnected");
                return;
            }
            Ok(StartOutcome::Superseded) => {
                tracing::debug!("Reconnect abandoned: session stopped or restarted");
                return;
            }
            Err(e) => tracing::warn!(attempt = attempt + 1, "Reconnect failed: {}", e),
        }
    }
    tracing::warn!("Giving up reconnecting after {} attempts", attempts);
}

fn sleep_unless_superseded(shared: &Shared, generation: u64, delay: Duration) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if shared.is_superseded(generation) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(shared.config.poll_interval.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = ReconnectPolicy::Backoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
            factor: 2,
            max_attempts: 5,
        };
        assert_eq!(
            policy.delays(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
                Duration::from_secs(5),
            ]
        );
    }

    #[test]
    fn test_disabled_policy() {
        assert!(!ReconnectPolicy::Disabled.is_enabled());
        assert!(ReconnectPolicy::Disabled.delays().is_empty());
        assert!(ReconnectPolicy::backoff().is_enabled());
    }

    #[test]
    fn test_schedule_saturates() {
        let policy = ReconnectPolicy::Backoff {
            initial: Duration::from_secs(30),
            max: Duration::from_secs(60),
            factor: u32::MAX,
            max_attempts: 40,
        };
        assert!(policy.delays().iter().all(|d| *d <= Duration::from_secs(60)));
    }
}
