use crate::client_defaults::{
    DEFAULT_POLL_DEADLINE, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_MAX_ATTEMPTS,
    DEFAULT_POLL_MAX_INTERVAL,
};
use crate::error::Error;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// Wait strategy between retrieval attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential { factor: u32, max_interval: Duration },
}

impl Backoff {
    fn next(&self, current: Duration) -> Duration {
        match *self {
            Backoff::Fixed => current,
            Backoff::Exponential {
                factor,
                max_interval,
            } => current
                .checked_mul(factor.max(1))
                .unwrap_or(max_interval)
                .min(max_interval),
        }
    }
}

/// Attempt and time budget for polling a pending certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub backoff: Backoff,
    pub max_attempts: u32,
    /// Wall-clock budget measured from the first attempt.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            backoff: Backoff::Exponential {
                factor: 2,
                max_interval: DEFAULT_POLL_MAX_INTERVAL,
            },
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            deadline: Some(DEFAULT_POLL_DEADLINE),
        }
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            backoff: Backoff::Fixed,
            max_attempts,
            deadline: None,
        }
    }

    pub fn exponential(interval: Duration, factor: u32, max_interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            backoff: Backoff::Exponential {
                factor,
                max_interval,
            },
            max_attempts,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Lifecycle of one retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Pending,
    Issued,
    Failed,
    TimedOut,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollState::Submitted => "submitted",
            PollState::Pending => "pending",
            PollState::Issued => "issued",
            PollState::Failed => "failed",
            PollState::TimedOut => "timed out",
        };
        f.write_str(name)
    }
}

/// What one retrieval attempt observed at the authority.
#[derive(Debug)]
pub enum PollOutcome<T> {
    Issued(T),
    /// Not ready yet; carries the authority's status text when it sends one.
    Pending(Option<String>),
    /// Permanent denial with the authority's reason.
    Failed(String),
}

/// Drives retrieval attempts until the certificate is issued, denied, or the
/// policy's budget runs out.
///
/// Only pending answers and transport errors are retried; any other error
/// returned by an attempt ends polling immediately.
#[derive(Debug, Clone)]
pub struct RetrievalPoller {
    policy: PollPolicy,
}

impl RetrievalPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn run<T, F>(&self, key_id: &str, mut attempt: F) -> Result<T, Error>
    where
        F: FnMut(u32) -> Result<PollOutcome<T>, Error>,
    {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut interval = self.policy.interval;
        let mut state = PollState::Submitted;
        let mut attempts = 0;
        let mut last_transport_error = None;

        loop {
            attempts += 1;
            match attempt(attempts) {
                Ok(PollOutcome::Issued(value)) => {
                    log::info!("certificate for key id {key_id} {state} -> {}", PollState::Issued);
                    return Ok(value);
                }
                Ok(PollOutcome::Failed(reason)) => {
                    log::debug!("certificate for key id {key_id} {state} -> {}", PollState::Failed);
                    return Err(Error::IncompleteIssuance {
                        key_id: key_id.to_string(),
                        reason,
                    });
                }
                Ok(PollOutcome::Pending(status)) => {
                    state = PollState::Pending;
                    last_transport_error = None;
                    log::debug!(
                        "certificate for key id {key_id} pending (attempt {attempts}/{max_attempts}, status {})",
                        status.as_deref().unwrap_or("unknown")
                    );
                }
                Err(err) if err.is_transport() => {
                    log::warn!(
                        "transport error retrieving key id {key_id} (attempt {attempts}/{max_attempts}): {err}"
                    );
                    last_transport_error = Some(err);
                }
                Err(err) => return Err(err),
            }

            if attempts >= max_attempts {
                break;
            }
            if let Some(deadline) = self.policy.deadline {
                let remaining = deadline.saturating_sub(started.elapsed());
                if remaining < interval {
                    break;
                }
            }
            thread::sleep(interval);
            interval = self.policy.backoff.next(interval);
        }

        log::debug!("certificate for key id {key_id} {state} -> {}", PollState::TimedOut);
        match last_transport_error {
            Some(err) => Err(err),
            None => Err(Error::Timeout {
                key_id: key_id.to_string(),
                attempts,
                elapsed: started.elapsed(),
            }),
        }
    }
}
