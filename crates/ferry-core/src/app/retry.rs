//! Retry controller: bounded exponential backoff around one remote call.
//!
//! | failure class | action |
//! |---|---|
//! | network timeout / reset, 5xx, `Retriable` | backoff, up to `max_attempts` attempts |
//! | `SessionExpired` | no backoff, escalate (caller re-opens the session) |
//! | `Unauthorized` | no backoff, escalate (caller refreshes once) |
//! | rejected / fatal | no retry, escalate |

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::cancel::CancelSignal;
use crate::domain::{CredentialError, TransportError, UploadError};

/// Retry policy for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Total attempts, the first one included.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempts` (1-indexed).
    ///
    /// delay = base_delay * multiplier^(attempts - 1)
    ///
    /// Example with base_delay=1s, multiplier=2.0:
    /// - attempt 1 (first failure): 1s
    /// - attempt 2: 2s
    /// - attempt 3: 4s
    /// - attempt 4: 8s
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = base_secs * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
    }
}

/// How one failed attempt should be handled.
#[derive(Debug)]
pub enum FailureClass {
    Transient(String),
    SessionExpired,
    Unauthorized,
    Fatal(UploadError),
}

impl From<TransportError> for FailureClass {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized => FailureClass::Unauthorized,
            TransportError::Unavailable(cause) => FailureClass::Transient(cause),
            other => FailureClass::Fatal(other.into()),
        }
    }
}

impl From<CredentialError> for FailureClass {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Unavailable(cause) => FailureClass::Transient(cause),
            other => FailureClass::Fatal(other.into()),
        }
    }
}

/// What the caller has to deal with after the controller gave up.
#[derive(Debug)]
pub enum Escalation {
    SessionExpired,
    Unauthorized,
    Failed(UploadError),
}

// Escalations that reach this conversion were not handled by the caller.
impl From<Escalation> for UploadError {
    fn from(escalation: Escalation) -> Self {
        match escalation {
            Escalation::SessionExpired => {
                TransportError::SessionLost("session expired outside of a chunk send".into()).into()
            }
            Escalation::Unauthorized => TransportError::Unauthorized.into(),
            Escalation::Failed(err) => err,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails non-transiently, or runs out of
    /// attempts. Cancellation is honored while waiting out a backoff.
    pub async fn run<T, F, Fut>(&self, cancel: &CancelSignal, mut op: F) -> Result<T, Escalation>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FailureClass>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(FailureClass::Transient(cause)) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(Escalation::Failed(UploadError::RetriesExhausted {
                            attempts: attempt,
                            last_cause: cause,
                        }));
                    }
                    let delay = self.policy.next_delay(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        ?delay,
                        %cause,
                        "transient failure, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(Escalation::Failed(UploadError::Cancelled)),
                    }
                }
                Err(FailureClass::SessionExpired) => return Err(Escalation::SessionExpired),
                Err(FailureClass::Unauthorized) => return Err(Escalation::Unauthorized),
                Err(FailureClass::Fatal(err)) => return Err(Escalation::Failed(err)),
            }
        }
    }
}
