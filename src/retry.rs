// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Bounded retry with a fixed delay for remote calls.
///
/// The delay is constant and normally equals the board service's quota
/// window, so a retried request lands in a fresh window. There is no jitter
/// and no overall deadline.
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Error;

/// Configuration for fixed-delay retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct RetryPolicy
{
    /// Maximum number of attempts, including the first one (default: 5).
    pub max_attempts: u32,
    /// Delay between two attempts (default: 10 seconds).
    pub delay:        Duration,
}

impl Default for RetryPolicy
{
    fn default() -> Self
    {
        Self {
            max_attempts: 5, delay: Duration::from_secs(10,),
        }
    }
}

impl RetryPolicy
{
    /// Creates a policy from an attempt bound and a delay in milliseconds.
    pub fn new(max_attempts: u32, delay_ms: u64,) -> Self
    {
        Self {
            max_attempts, delay: Duration::from_millis(delay_ms,),
        }
    }
}

/// Executes an async operation, retrying failures after a fixed delay.
///
/// The operation is invoked at most `policy.max_attempts` times (a bound of
/// zero is treated as one). Every failed attempt except the last is followed
/// by exactly one `policy.delay` sleep.
///
/// # Arguments
///
/// * `policy` - Attempt bound and inter-attempt delay
/// * `operation_name` - Name of the operation for logging and errors
/// * `f` - Factory producing a fresh future per attempt
///
/// Only transient failures are retried. An error for which
/// [`Error::is_fatal`] holds is returned unchanged after the attempt that
/// produced it.
///
/// # Errors
///
/// Returns [`Error::RetriesExhausted`] carrying the last attempt's error when
/// every attempt fails, or the first fatal error.
///
/// # Example
///
/// ```no_run
/// use discoboard::{Error, RetryPolicy, retry_fixed};
///
/// # async fn example() -> Result<(), Error> {
/// let policy = RetryPolicy::new(3, 250,);
/// let id = retry_fixed(&policy, "create board", || async {
///     // Some remote call that might fail
///     Ok::<_, Error,>("board-id".to_owned(),)
/// },)
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_fixed<F, Fut, T,>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut f: F,
) -> Result<T, Error,>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, Error,>,>,
{
    let max_attempts = policy.max_attempts.max(1,);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(result,) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result,);
            }
            Err(error,) if error.is_fatal() => {
                warn!("{} failed with a non-retryable error: {}", operation_name, error);
                return Err(error,);
            }
            Err(error,) => {
                if attempt >= max_attempts {
                    warn!("{} failed after {} attempts: {}", operation_name, max_attempts, error);
                    return Err(Error::RetriesExhausted {
                        operation:  operation_name.to_owned(),
                        attempts:   max_attempts,
                        last_error: Box::new(error,),
                    },);
                }

                warn!(
                    "{} failed on attempt {}/{}: {}. Retrying in {}ms...",
                    operation_name,
                    attempt,
                    max_attempts,
                    error,
                    policy.delay.as_millis()
                );

                sleep(policy.delay,).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::{cell::Cell, rc::Rc, time::Duration};

    use tokio::time::Instant;

    use super::*;

    fn flaky(
        failures: u32,
        calls: Rc<Cell<u32,>,>,
    ) -> impl FnMut() -> std::future::Ready<Result<u32, Error,>,>
    {
        move || {
            let call = calls.get() + 1;
            calls.set(call,);
            if call <= failures {
                std::future::ready(Err(Error::remote("flaky", format!("failure {call}"),),),)
            } else {
                std::future::ready(Ok(call,),)
            }
        }
    }

    #[test]
    fn retry_policy_default_values()
    {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(10));
    }

    #[test]
    fn retry_policy_from_millis()
    {
        let policy = RetryPolicy::new(2, 1500,);
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay, Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn retry_succeeds_on_first_attempt()
    {
        let policy = RetryPolicy::default();
        let result = retry_fixed(&policy, "test", || async { Ok::<_, Error,>(42,) },)
            .await
            .expect("should succeed",);
        assert_eq!(result, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_waits_one_delay_per_failure()
    {
        let policy = RetryPolicy::new(4, 1000,);
        let calls = Rc::new(Cell::new(0,),);
        let started = Instant::now();

        let result = retry_fixed(&policy, "test", flaky(3, calls.clone(),),)
            .await
            .expect("should succeed on the last attempt",);

        assert_eq!(result, 4);
        assert_eq!(calls.get(), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "three delays expected, got {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3500), "three delays expected, got {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhaustion_stops_after_max_attempts()
    {
        let policy = RetryPolicy::new(3, 500,);
        let calls = Rc::new(Cell::new(0,),);
        let started = Instant::now();

        let error = retry_fixed(&policy, "create card", flaky(10, calls.clone(),),)
            .await
            .expect_err("should give up",);

        assert_eq!(calls.get(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "two delays expected, got {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1250), "two delays expected, got {elapsed:?}");
        match error {
            Error::RetriesExhausted {
                operation,
                attempts,
                last_error,
            } => {
                assert_eq!(operation, "create card");
                assert_eq!(attempts, 3);
                assert_eq!(last_error.to_string(), "flaky failed: failure 3");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried()
    {
        let policy = RetryPolicy::new(5, 1000,);
        let calls = Rc::new(Cell::new(0,),);
        let counter = calls.clone();
        let started = Instant::now();

        let error = retry_fixed(&policy, "token exchange", move || {
            counter.set(counter.get() + 1,);
            std::future::ready(Err::<(), _,>(Error::AuthFailure {
                message: "invalid client".to_owned(),
            },),)
        },)
        .await
        .expect_err("should fail immediately",);

        assert_eq!(calls.get(), 1);
        assert!(started.elapsed() < policy.delay, "no delay expected");
        assert!(matches!(error, Error::AuthFailure { ref message } if message == "invalid client"));
    }

    #[tokio::test]
    async fn zero_attempt_bound_still_runs_once()
    {
        let policy = RetryPolicy::new(0, 10,);
        let calls = Rc::new(Cell::new(0,),);

        let result = retry_fixed(&policy, "test", flaky(1, calls.clone(),),).await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
