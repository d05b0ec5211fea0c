//! Exponential backoff with jitter and an elapsed-time budget.

use crate::error::ConfigError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Retry schedule. Elapsed time is measured from the first attempt.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Total budget; `Duration::ZERO` retries until cancelled.
    pub max_elapsed_time: Duration,
    pub multiplier: f64,
    /// Delays are drawn uniformly from `[d * (1 - f), d * (1 + f)]`.
    pub randomization_factor: f64,
    /// Aborts retrying once the watched value becomes `true`.
    pub cancellation: Option<watch::Receiver<bool>>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Duration::from_secs(60),
            multiplier: 1.5,
            randomization_factor: 0.5,
            cancellation: None,
        }
    }
}

impl BackoffPolicy {
    pub fn with_cancellation(mut self, cancellation: watch::Receiver<bool>) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_interval > self.max_interval {
            return Err(ConfigError::Validation(format!(
                "backoff initial interval {:?} exceeds max interval {:?}",
                self.initial_interval, self.max_interval
            )));
        }
        if !(self.multiplier >= 1.0) {
            return Err(ConfigError::Validation(format!(
                "backoff multiplier must be at least 1, got {}",
                self.multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.randomization_factor) {
            return Err(ConfigError::Validation(format!(
                "backoff randomization factor must be in [0, 1), got {}",
                self.randomization_factor
            )));
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().map_or(false, |rx| *rx.borrow())
    }
}

/// Running state of one retry sequence.
#[derive(Debug)]
pub struct ExponentialBackoff<'a> {
    policy: &'a BackoffPolicy,
    current: Duration,
    start: Instant,
}

impl<'a> ExponentialBackoff<'a> {
    pub fn new(policy: &'a BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.initial_interval,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left in the elapsed budget; `None` when the budget is unlimited.
    pub fn remaining(&self) -> Option<Duration> {
        let budget = self.policy.max_elapsed_time;
        (!budget.is_zero()).then(|| budget.saturating_sub(self.elapsed()))
    }

    /// Next delay, or `None` once waiting it would exceed the elapsed budget.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        let delay = jittered(self.current, self.policy.randomization_factor);
        let budget = self.policy.max_elapsed_time;
        if !budget.is_zero() && self.elapsed() + delay > budget {
            return None;
        }
        self.current = self
            .current
            .mul_f64(self.policy.multiplier)
            .min(self.policy.max_interval);
        Some(delay)
    }
}

fn jittered(interval: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || interval.is_zero() {
        return interval;
    }
    let secs = interval.as_secs_f64();
    let low = secs * (1.0 - factor);
    let high = secs * (1.0 + factor);
    Duration::from_secs_f64(rand::thread_rng().gen_range(low..=high))
}

/// Why [`retry`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The elapsed-time budget ran out; carries the last failure.
    Exhausted { attempts: u32, elapsed: Duration, last: E },
    /// The budget ran out while an attempt was still running.
    DeadlineExceeded { attempts: u32, elapsed: Duration },
    Cancelled,
}

enum Attempt<T, E> {
    Done(Result<T, E>),
    OutOfTime,
    Cancelled,
}

/// Run `op` until it succeeds, the budget is exhausted, or the policy is cancelled.
/// Each attempt is raced against cancellation and the remaining budget.
/// `on_failure` sees each failure and the delay before the next attempt.
pub async fn retry<T, E, F, Fut, L>(policy: &BackoffPolicy, mut op: F, mut on_failure: L) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    L: FnMut(u32, &E, Duration),
{
    let mut backoff = ExponentialBackoff::new(policy);
    let mut cancellation = policy.cancellation.clone();
    let mut attempts = 0u32;

    loop {
        if policy.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        attempts += 1;
        let err = match bounded(op(), cancellation.as_mut(), backoff.remaining()).await {
            Attempt::Done(Ok(value)) => return Ok(value),
            Attempt::Done(Err(e)) => e,
            Attempt::Cancelled => return Err(RetryError::Cancelled),
            Attempt::OutOfTime => {
                return Err(RetryError::DeadlineExceeded {
                    attempts,
                    elapsed: backoff.elapsed(),
                })
            }
        };

        let Some(delay) = backoff.next_backoff() else {
            return Err(RetryError::Exhausted {
                attempts,
                elapsed: backoff.elapsed(),
                last: err,
            });
        };
        on_failure(attempts, &err, delay);

        let cancelled = match cancellation.as_mut() {
            Some(rx) => sleep_or_cancel(rx, delay).await,
            None => {
                tokio::time::sleep(delay).await;
                false
            }
        };
        if cancelled {
            return Err(RetryError::Cancelled);
        }
    }
}

/// Runs one attempt until it finishes, `remaining` elapses, or `cancellation` fires.
async fn bounded<T, E, Fut>(
    attempt: Fut,
    cancellation: Option<&mut watch::Receiver<bool>>,
    remaining: Option<Duration>,
) -> Attempt<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let deadline = async {
        match remaining {
            Some(left) => tokio::time::sleep(left).await,
            None => std::future::pending::<()>().await,
        }
    };
    let cancelled = async {
        if let Some(rx) = cancellation {
            let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if !closed {
                return;
            }
        }
        std::future::pending::<()>().await
    };
    tokio::select! {
        biased;
        result = attempt => Attempt::Done(result),
        _ = cancelled => Attempt::Cancelled,
        _ = deadline => Attempt::OutOfTime,
    }
}

/// Sleeps for `delay`; true if cancelled first. A dropped sender never cancels.
async fn sleep_or_cancel(rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    let cancelled = tokio::select! {
        _ = &mut sleep => return false,
        res = rx.wait_for(|cancelled| *cancelled) => res.is_ok(),
    };
    if cancelled {
        return true;
    }
    sleep.await;
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fixed_policy() -> BackoffPolicy {
        BackoffPolicy {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(400),
            max_elapsed_time: Duration::from_secs(2),
            multiplier: 2.0,
            randomization_factor: 0.0,
            cancellation: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn intervals_grow_to_cap() {
        let policy = fixed_policy();
        let mut backoff = ExponentialBackoff::new(&policy);
        let delays: Vec<u128> = (0..5)
            .map(|_| backoff.next_backoff().unwrap().as_millis())
            .collect();
        assert_eq!(delays, [100, 200, 400, 400, 400]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_budget_exceeded() {
        let policy = fixed_policy();
        let mut backoff = ExponentialBackoff::new(&policy);
        assert!(backoff.next_backoff().is_some());
        tokio::time::advance(Duration::from_millis(1950)).await;
        assert!(backoff.next_backoff().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_never_stops() {
        let policy = BackoffPolicy {
            max_elapsed_time: Duration::ZERO,
            ..fixed_policy()
        };
        let mut backoff = ExponentialBackoff::new(&policy);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(backoff.next_backoff().is_some());
    }

    #[test]
    fn jitter_stays_in_range() {
        for _ in 0..100 {
            let d = jittered(Duration::from_millis(1000), 0.5);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut reported = Vec::new();
        let result: Result<&str, RetryError<&str>> = retry(
            &fixed_policy(),
            || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err("down")
                    } else {
                        Ok("up")
                    }
                }
            },
            |attempt, _err, delay| reported.push((attempt, delay.as_millis())),
        )
        .await;
        assert_eq!(result.unwrap(), "up");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(reported, [(1, 100), (2, 200), (3, 400)]);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhausts_budget() {
        let result: Result<(), RetryError<&str>> =
            retry(&fixed_policy(), || async { Err("down") }, |_, _, _| {}).await;
        match result {
            Err(RetryError::Exhausted { attempts, elapsed, last }) => {
                assert!(attempts > 1);
                assert!(elapsed <= Duration::from_secs(2));
                assert_eq!(last, "down");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_observes_cancellation() {
        let (tx, rx) = watch::channel(false);
        let policy = BackoffPolicy {
            max_elapsed_time: Duration::ZERO,
            ..fixed_policy()
        }
        .with_cancellation(rx);

        let handle = tokio::spawn(async move {
            retry(&policy, || async { Err::<(), _>("down") }, |_, _, _| {}).await
        });
        tokio::time::sleep(Duration::from_millis(250)).await;
        tx.send(true).unwrap();
        assert!(matches!(handle.await.unwrap(), Err(RetryError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempt_is_cut_at_budget() {
        let start = Instant::now();
        let result: Result<(), RetryError<&str>> = retry(
            &fixed_policy(),
            || async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err("down")
            },
            |_, _, _| {},
        )
        .await;
        assert!(matches!(result, Err(RetryError::DeadlineExceeded { attempts: 1, .. })));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_running_attempt() {
        let (tx, rx) = watch::channel(false);
        let policy = fixed_policy().with_cancellation(rx);
        let start = Instant::now();
        let handle = tokio::spawn(async move {
            retry(
                &policy,
                || async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err::<(), _>("down")
                },
                |_, _, _| {},
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        assert!(matches!(handle.await.unwrap(), Err(RetryError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn validate_rejects_inverted_intervals() {
        let policy = BackoffPolicy {
            initial_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(1),
            ..BackoffPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(ConfigError::Validation(_))));
        assert!(BackoffPolicy::default().validate().is_ok());
    }
}
