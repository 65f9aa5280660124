//! Retry policy and deadline for remote calls.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, RemoteError};

/// Exponential backoff: the delay before retry `n` (1-based) is
/// `base_delay * 2^(n-1)`, capped at `max_delay`, then scaled by a random
/// factor in `[1 - jitter, 1 + jitter]`. A server-provided retry-after hint
/// replaces the computed delay (still capped).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 4, base_delay_ms: 500, max_delay_ms: 8_000, jitter: 0.2 }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(20);
        let millis = self.base_delay_ms.saturating_mul(1u64 << exp).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
        delay.mul_f64(factor)
    }

    fn delay_after(&self, err: &RemoteError, retry: u32) -> Duration {
        let cap = Duration::from_millis(self.max_delay_ms);
        match err.retry_after() {
            Some(hint) => hint.min(cap),
            None => self.jittered(self.backoff(retry)),
        }
    }
}

/// Point in time after which remote work is abandoned. `Deadline::none()`
/// never expires. Copies share the same instant, so retries consume one
/// budget instead of restarting it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(budget: Duration) -> Self {
        Self(Some(Instant::now() + budget))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}

/// Why [`run`] gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// The last attempt failed with a final error or attempts ran out.
    Exhausted { attempts: u32, cause: RemoteError },
    /// The deadline expired during a call or would expire during the next backoff.
    Cancelled { attempts: u32, last: Option<RemoteError> },
}

impl RetryError {
    /// Converts into the crate error, wrapping remote failures with `service`.
    pub fn into_error(self, operation: &str, service: impl FnOnce(u32, RemoteError) -> Error) -> Error {
        match self {
            Self::Exhausted { attempts, cause } => service(attempts, cause),
            Self::Cancelled { attempts, last: Some(cause) } => {
                Error::Cancelled(format!("{operation} deadline exceeded after {attempts} attempt(s); last error: {cause}"))
            }
            Self::Cancelled { attempts, last: None } => {
                Error::Cancelled(format!("{operation} deadline exceeded after {attempts} attempt(s)"))
            }
        }
    }
}

/// Runs `call` until it succeeds, fails with a final error, runs out of
/// attempts, or the deadline expires. In-flight calls are dropped when the
/// deadline passes.
pub async fn run<T, F, Fut>(policy: &RetryPolicy, deadline: Deadline, operation: &str, mut call: F) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last: Option<RemoteError> = None;
    let mut attempt = 0u32;
    loop {
        let outcome = match deadline.remaining() {
            None => call(attempt + 1).await,
            Some(left) if left.is_zero() => return Err(RetryError::Cancelled { attempts: attempt, last }),
            Some(left) => match tokio::time::timeout(left, call(attempt + 1)).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(RetryError::Cancelled { attempts: attempt + 1, last }),
            },
        };
        attempt += 1;
        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "remote call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };
        if !err.is_transient() || attempt >= max_attempts {
            return Err(RetryError::Exhausted { attempts: attempt, cause: err });
        }
        let delay = policy.delay_after(&err, attempt);
        if deadline.remaining().is_some_and(|left| delay >= left) {
            return Err(RetryError::Cancelled { attempts: attempt, last: Some(err) });
        }
        warn!(operation, attempt, delay_ms = delay.as_millis() as u64, error = %err, "transient failure, backing off");
        tokio::time::sleep(delay).await;
        last = Some(err);
    }
}
