//! Bounded-retry wait for a TCP listener to appear on a port.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::ProbeSettings;

use super::listeners::ListenerProbe;

/// How many times to poll and how long to wait between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    /// Upper bound on total wall time spent polling one port.
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            poll_interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(30, Duration::from_secs(2))
    }
}

impl From<&ProbeSettings> for RetryPolicy {
    fn from(settings: &ProbeSettings) -> Self {
        let policy = Self::new(
            settings.max_attempts,
            Duration::from_secs(settings.poll_interval_secs),
        );
        match settings.deadline_secs {
            Some(secs) => policy.with_deadline(Duration::from_secs(secs)),
            None => policy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub attempts: u32,
    pub cancelled: bool,
}

pub struct PortProber<P> {
    probe: P,
    policy: RetryPolicy,
}

impl<P: ListenerProbe> PortProber<P> {
    pub fn new(probe: P, policy: RetryPolicy) -> Self {
        Self { probe, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Poll `port` until a listener shows up or the policy is exhausted.
    ///
    /// `on_attempt` is called once per completed poll with the 1-based attempt
    /// number. A failing inspection counts as "not bound" for that attempt.
    /// Cancellation interrupts both the inspection and the sleep.
    pub async fn wait_for_port<F>(
        &self,
        port: u16,
        cancel: &CancellationToken,
        mut on_attempt: F,
    ) -> ProbeOutcome
    where
        F: FnMut(u32),
    {
        let started = Instant::now();
        let mut attempts = 0;

        while attempts < self.policy.max_attempts {
            let inspection = tokio::select! {
                biased;
                result = self.probe.is_listening(port) => result,
                _ = cancel.cancelled() => {
                    tracing::info!(port, attempts, "probe cancelled during inspection");
                    return ProbeOutcome {
                        reachable: false,
                        attempts,
                        cancelled: true,
                    };
                }
            };
            attempts += 1;
            let bound = match inspection {
                Ok(bound) => bound,
                Err(e) => {
                    tracing::warn!(port, attempt = attempts, error = %e, "listener inspection failed");
                    false
                }
            };
            on_attempt(attempts);

            if bound {
                tracing::debug!(port, attempts, "port is listening");
                return ProbeOutcome {
                    reachable: true,
                    attempts,
                    cancelled: false,
                };
            }
            if attempts == self.policy.max_attempts {
                break;
            }
            if let Some(deadline) = self.policy.deadline {
                if started.elapsed() + self.policy.poll_interval > deadline {
                    tracing::debug!(port, attempts, "probe deadline reached");
                    break;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(port, attempts, "probe cancelled");
                    return ProbeOutcome {
                        reachable: false,
                        attempts,
                        cancelled: true,
                    };
                }
                _ = tokio::time::sleep(self.policy.poll_interval) => {}
            }
        }

        tracing::debug!(port, attempts, "port never became reachable");
        ProbeOutcome {
            reachable: false,
            attempts,
            cancelled: false,
        }
    }
}
