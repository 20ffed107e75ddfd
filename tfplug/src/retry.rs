//! Waiting for remote objects to converge
//!
//! [`StateChangeConf`] polls a refresh function until the object it returns
//! reaches a target state. Every sleep and every in-flight refresh is raced
//! against the request [`Context`] and the overall deadline, so a wait never
//! outlives a cancellation or its timeout.
//!
//! Errors returned by the refresh function are sorted by a classifier:
//!
//! * [`ErrorClass::Fatal`] errors end the wait immediately.
//! * [`ErrorClass::Transient`] errors are a known upstream quirk where the API
//!   answers with a benign "no-op" error while an object is changing state.
//!   The refresh is retried once after `transient_retry_delay`; a second
//!   transient answer in a row is taken as convergence ([`Converged::Assumed`]).
//! * [`ErrorClass::NotFound`] errors follow the [`NotFoundPolicy`]: detach-style
//!   waits treat a vanished object as done, others tolerate a bounded number
//!   of consecutive misses while the object shows up.
//!
//! [`retry_context`] is the companion for mutations that must be re-issued
//! until the API stops reporting a retryable condition.

use crate::context::Context;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// How a refresh error should be treated by the waiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Fatal,
    Transient,
    NotFound,
}

/// What a not-found refresh means for the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// The object being gone satisfies the wait
    Success,
    /// Keep polling through up to this many consecutive not-found answers
    Tolerate(u32),
}

/// Successful end of a wait
#[derive(Debug, Clone, PartialEq)]
pub enum Converged<T> {
    /// The snapshot on which a target state was first observed
    Reached(T),
    /// The transient signature was returned twice in a row
    Assumed,
    /// The object disappeared under [`NotFoundPolicy::Success`]
    Gone,
}

impl<T> Converged<T> {
    pub fn into_snapshot(self) -> Option<T> {
        match self {
            Converged::Reached(snapshot) => Some(snapshot),
            Converged::Assumed | Converged::Gone => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError<E> {
    #[error("{description} did not converge within {timeout:?} (last state: {last_state:?})")]
    Timeout {
        description: String,
        timeout: Duration,
        last_state: String,
    },

    #[error("{description}: unexpected state {state:?}, wanted {expected:?}")]
    UnexpectedState {
        description: String,
        state: String,
        expected: Vec<String>,
    },

    #[error("{description}: object not found after {checks} checks")]
    NotFound { description: String, checks: u32 },

    #[error("wait cancelled")]
    Cancelled,

    #[error("{0}")]
    Refresh(E),
}

impl<E> WaitError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

type Classifier<E> = Box<dyn Fn(&E) -> ErrorClass + Send + Sync>;

/// Configuration of a single wait. Built per call and dropped afterwards.
pub struct StateChangeConf<E> {
    pub description: String,
    pub pending: Vec<String>,
    pub target: Vec<String>,
    /// Wait before the first refresh
    pub delay: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Pause before re-asking after a transient error
    pub transient_retry_delay: Duration,
    pub not_found: NotFoundPolicy,
    classifier: Classifier<E>,
}

impl<E> fmt::Debug for StateChangeConf<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateChangeConf")
            .field("description", &self.description)
            .field("pending", &self.pending)
            .field("target", &self.target)
            .field("delay", &self.delay)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("transient_retry_delay", &self.transient_retry_delay)
            .field("not_found", &self.not_found)
            .finish()
    }
}

impl<E> StateChangeConf<E> {
    pub fn new(description: impl Into<String>, target: &[&str]) -> Self {
        Self {
            description: description.into(),
            pending: Vec::new(),
            target: target.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
            transient_retry_delay: Duration::from_secs(2),
            not_found: NotFoundPolicy::Tolerate(0),
            classifier: Box::new(|_| ErrorClass::Fatal),
        }
    }

    /// States that mean "keep waiting". When empty, any non-target state does.
    pub fn pending(mut self, pending: &[&str]) -> Self {
        self.pending = pending.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transient_retry_delay(mut self, delay: Duration) -> Self {
        self.transient_retry_delay = delay;
        self
    }

    pub fn not_found(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found = policy;
        self
    }

    pub fn classify<C>(mut self, classifier: C) -> Self
    where
        C: Fn(&E) -> ErrorClass + Send + Sync + 'static,
    {
        self.classifier = Box::new(classifier);
        self
    }

    /// Polls `refresh` until it reports a target state.
    ///
    /// `refresh` returns the object snapshot together with its state string.
    pub async fn wait_for_state<T, F, Fut>(
        &self,
        ctx: &Context,
        mut refresh: F,
    ) -> Result<Converged<T>, WaitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(T, String), E>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_state = String::new();
        let mut not_found_checks = 0u32;
        let mut after_transient = false;
        let mut attempt = 0u32;

        tracing::info!(
            "Waiting for {} to reach {:?} (timeout {:?})",
            self.description,
            self.target,
            self.timeout
        );

        if !self.delay.is_zero() {
            self.pause(ctx, self.delay, deadline, &last_state).await?;
        }

        loop {
            attempt += 1;
            let result = self
                .observe(ctx, deadline, &mut refresh, &last_state)
                .await?;

            match result {
                Ok((snapshot, state)) => {
                    not_found_checks = 0;
                    if self.target.contains(&state) {
                        tracing::info!(
                            "{} reached state {:?} after {} checks",
                            self.description,
                            state,
                            attempt
                        );
                        return Ok(Converged::Reached(snapshot));
                    }
                    if !self.pending.is_empty() && !self.pending.contains(&state) {
                        return Err(WaitError::UnexpectedState {
                            description: self.description.clone(),
                            state,
                            expected: self.target.clone(),
                        });
                    }
                    tracing::debug!(
                        "{} is {:?} (check {}), still waiting",
                        self.description,
                        state,
                        attempt
                    );
                    last_state = state;
                }
                Err(e) => match (self.classifier)(&e) {
                    ErrorClass::Fatal => return Err(WaitError::Refresh(e)),
                    ErrorClass::Transient if after_transient => {
                        tracing::info!(
                            "{} answered with a transient error twice, assuming it converged",
                            self.description
                        );
                        return Ok(Converged::Assumed);
                    }
                    ErrorClass::Transient => {
                        tracing::debug!(
                            "{} answered with a transient error, retrying once",
                            self.description
                        );
                        after_transient = true;
                        self.pause(ctx, self.transient_retry_delay, deadline, &last_state)
                            .await?;
                        continue;
                    }
                    ErrorClass::NotFound => match self.not_found {
                        NotFoundPolicy::Success => {
                            tracing::info!("{} is gone, treating as converged", self.description);
                            return Ok(Converged::Gone);
                        }
                        NotFoundPolicy::Tolerate(limit) => {
                            not_found_checks += 1;
                            if not_found_checks > limit {
                                return Err(WaitError::NotFound {
                                    description: self.description.clone(),
                                    checks: not_found_checks,
                                });
                            }
                            tracing::debug!(
                                "{} not found yet ({}/{})",
                                self.description,
                                not_found_checks,
                                limit
                            );
                        }
                    },
                },
            }

            after_transient = false;
            self.pause(ctx, self.poll_interval, deadline, &last_state)
                .await?;
        }
    }

    async fn observe<T, F, Fut>(
        &self,
        ctx: &Context,
        deadline: Instant,
        refresh: &mut F,
        last_state: &str,
    ) -> Result<Result<(T, String), E>, WaitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(T, String), E>>,
    {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(WaitError::Cancelled),
            _ = sleep_until(deadline) => Err(self.timed_out(last_state)),
            result = refresh() => Ok(result),
        }
    }

    /// Sleeps for `duration`, cut short by cancellation or the deadline
    async fn pause(
        &self,
        ctx: &Context,
        duration: Duration,
        deadline: Instant,
        last_state: &str,
    ) -> Result<(), WaitError<E>> {
        let wake = (Instant::now() + duration).min(deadline);
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(WaitError::Cancelled),
            _ = sleep_until(wake) => {
                if wake >= deadline {
                    Err(self.timed_out(last_state))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn timed_out(&self, last_state: &str) -> WaitError<E> {
        WaitError::Timeout {
            description: self.description.clone(),
            timeout: self.timeout,
            last_state: last_state.to_string(),
        }
    }
}

/// Outcome of one attempt inside [`retry_context`]
#[derive(Debug)]
pub enum RetryError<E> {
    Retryable(E),
    NonRetryable(E),
}

#[derive(Debug, thiserror::Error)]
pub enum RetryFailed<E> {
    #[error("{0}")]
    NonRetryable(E),

    /// Carries the last retryable error
    #[error("timeout while retrying: {0}")]
    Timeout(E),

    /// The first attempt was still running when the timeout elapsed
    #[error("timeout before any attempt completed")]
    DeadlineExceeded,

    #[error("retry cancelled")]
    Cancelled,
}

/// Re-runs `attempt` every `interval` while it reports a retryable error,
/// for at most `timeout`. The first attempt runs immediately. An attempt
/// still in flight is dropped on cancellation or at the deadline.
pub async fn retry_context<T, E, F, Fut>(
    ctx: &Context,
    timeout: Duration,
    interval: Duration,
    mut attempt: F,
) -> Result<T, RetryFailed<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
{
    let deadline = Instant::now() + timeout;
    let mut last = None;

    loop {
        if ctx.is_cancelled() {
            return Err(RetryFailed::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(RetryFailed::Cancelled),
            outcome = attempt() => outcome,
            _ = sleep_until(deadline) => {
                return Err(last.map_or(RetryFailed::DeadlineExceeded, RetryFailed::Timeout));
            }
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(e)) => return Err(RetryFailed::NonRetryable(e)),
            Err(RetryError::Retryable(e)) => e,
        };

        let wake = Instant::now() + interval;
        if wake >= deadline {
            return Err(RetryFailed::Timeout(err));
        }
        last = Some(err);

        tracing::debug!("Retryable error, trying again in {:?}", interval);
        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(RetryFailed::Cancelled),
            _ = sleep_until(wake) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum FakeError {
        NothingToChange,
        Gone,
        Broken,
    }

    fn classify(e: &FakeError) -> ErrorClass {
        match e {
            FakeError::NothingToChange => ErrorClass::Transient,
            FakeError::Gone => ErrorClass::NotFound,
            FakeError::Broken => ErrorClass::Fatal,
        }
    }

    fn conf() -> StateChangeConf<FakeError> {
        StateChangeConf::new("test object", &["active"])
            .pending(&["pending"])
            .poll_interval(Duration::from_millis(10))
            .timeout(Duration::from_millis(500))
            .transient_retry_delay(Duration::from_millis(5))
            .classify(classify)
    }

    #[tokio::test]
    async fn unexpected_state_fails_fast() {
        let result = conf()
            .wait_for_state(&Context::new(), || async {
                Ok::<_, FakeError>(((), "error".to_string()))
            })
            .await;

        assert!(matches!(
            result,
            Err(WaitError::UnexpectedState { ref state, .. }) if state == "error"
        ));
    }

    #[tokio::test]
    async fn empty_pending_accepts_any_intermediate_state() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = StateChangeConf::<FakeError>::new("attachment", &["attached"])
            .poll_interval(Duration::from_millis(5))
            .wait_for_state(&Context::new(), move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    let state = if n < 2 { "whatever" } else { "attached" };
                    Ok::<_, FakeError>((n, state.to_string()))
                }
            })
            .await
            .unwrap();

        assert_eq!(result, Converged::Reached(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_then_success_keeps_the_snapshot() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = conf()
            .wait_for_state(&Context::new(), move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0 => Err(FakeError::NothingToChange),
                        _ => Ok((n, "active".to_string())),
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, Converged::Reached(1));
    }

    #[tokio::test]
    async fn tolerated_not_found_turns_fatal_past_the_limit() {
        let result = conf()
            .not_found(NotFoundPolicy::Tolerate(2))
            .wait_for_state(&Context::new(), || async {
                Err::<((), String), _>(FakeError::Gone)
            })
            .await;

        assert!(matches!(result, Err(WaitError::NotFound { checks: 3, .. })));
    }

    #[tokio::test]
    async fn initial_delay_runs_before_first_refresh() {
        let start = Instant::now();
        conf()
            .delay(Duration::from_millis(30))
            .wait_for_state(&Context::new(), || async {
                Ok::<_, FakeError>(((), "active".to_string()))
            })
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn retry_context_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = retry_context(
            &Context::new(),
            Duration::from_secs(1),
            Duration::from_millis(5),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RetryError::Retryable(FakeError::Broken))
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_context_stops_on_non_retryable() {
        let result: Result<(), _> = retry_context(
            &Context::new(),
            Duration::from_secs(1),
            Duration::from_millis(5),
            || async { Err(RetryError::NonRetryable(FakeError::Broken)) },
        )
        .await;

        assert!(matches!(
            result,
            Err(RetryFailed::NonRetryable(FakeError::Broken))
        ));
    }

    #[tokio::test]
    async fn retry_context_times_out_with_last_error() {
        let result: Result<(), _> = retry_context(
            &Context::new(),
            Duration::from_millis(30),
            Duration::from_millis(10),
            || async { Err(RetryError::Retryable(FakeError::NothingToChange)) },
        )
        .await;

        assert!(matches!(
            result,
            Err(RetryFailed::Timeout(FakeError::NothingToChange))
        ));
    }

    #[tokio::test]
    async fn retry_context_honours_cancellation() {
        let ctx = Context::new();
        ctx.cancel();
        let result: Result<(), RetryFailed<FakeError>> =
            retry_context(&ctx, Duration::from_secs(1), Duration::from_millis(5), || async {
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RetryFailed::Cancelled)));
    }

    #[tokio::test]
    async fn retry_context_abandons_a_hung_attempt_on_cancel() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result: Result<(), RetryFailed<FakeError>> = tokio::time::timeout(
            Duration::from_secs(1),
            retry_context(&ctx, Duration::from_secs(60), Duration::from_millis(5), || {
                std::future::pending()
            }),
        )
        .await
        .expect("cancellation should interrupt the attempt");

        assert!(matches!(result, Err(RetryFailed::Cancelled)));
    }

    #[tokio::test]
    async fn retry_context_abandons_a_hung_attempt_at_the_deadline() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = retry_context(
            &Context::new(),
            Duration::from_millis(40),
            Duration::from_millis(5),
            move || {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Err(RetryError::Retryable(FakeError::NothingToChange))
                    } else {
                        std::future::pending().await
                    }
                }
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(RetryFailed::Timeout(FakeError::NothingToChange))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let hung: Result<(), RetryFailed<FakeError>> = retry_context(
            &Context::new(),
            Duration::from_millis(20),
            Duration::from_millis(5),
            || std::future::pending(),
        )
        .await;
        assert!(matches!(hung, Err(RetryFailed::DeadlineExceeded)));
    }
}
