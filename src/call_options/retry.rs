use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::debug;

use super::{CallSetting, RetryPolicy};
use crate::errors::Status;
use crate::shared_types::CallKind;

// -----------------------------------------------------------------------------
// ----- Backoff ---------------------------------------------------------------

/// Full-jitter exponential backoff: each pause is drawn from `[1ns, current]`,
/// then `current` grows by the multiplier up to `max`.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
}

impl Backoff {
    pub(crate) fn new(policy: &RetryPolicy) -> Self {
        let multiplier = if policy.multiplier.is_finite() && policy.multiplier >= 1.0 {
            policy.multiplier
        } else {
            1.0
        };

        Self {
            current: policy.initial.max(Duration::from_nanos(1)),
            max: policy.max.max(policy.initial),
            multiplier,
        }
    }

    pub(crate) fn pause(&mut self) -> Duration {
        let cap = u64::try_from(self.current.as_nanos()).unwrap_or(u64::MAX).max(1);
        let pause = Duration::from_nanos(rand::rng().random_range(1..=cap));

        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max);
        self.current = next.min(self.max);

        pause
    }
}

// -----------------------------------------------------------------------------
// ----- invoke ----------------------------------------------------------------

/// Run `call` under the retry policy and timeout of `setting`.
///
/// Failures whose code is in the policy's retryable set are retried after a
/// backoff pause; anything else is returned as is. The timeout bounds the
/// whole call, retries included, and surfaces as `DEADLINE_EXCEEDED`.
/// Dropping the returned future abandons the call at once.
pub(crate) async fn invoke<T, F, Fut>(
    kind: CallKind,
    setting: Option<&CallSetting>,
    mut call: F,
) -> Result<T, Status>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Status>>,
{
    let retry = setting.and_then(|s| s.retry.as_ref());
    let call_timeout = setting.and_then(|s| s.timeout);

    let attempts = async move {
        let mut backoff = retry.map(Backoff::new);
        loop {
            let status = match call().await {
                Ok(value) => return Ok(value),
                Err(status) => status,
            };

            let (Some(policy), Some(backoff)) = (retry, backoff.as_mut()) else {
                return Err(status);
            };
            if !policy.is_retryable(status.code()) {
                return Err(status);
            }

            let pause = backoff.pause();
            debug!("{kind} failed with {}; retrying in {pause:?}", status.code());
            sleep(pause).await;
        }
    };

    match call_timeout {
        Some(limit) => timeout(limit, attempts).await.unwrap_or_else(|_| {
            Err(Status::deadline_exceeded(format!(
                "{kind} did not complete within {limit:?}"
            )))
        }),
        None => attempts.await,
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
