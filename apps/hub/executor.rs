use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, warn};

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("all endpoints exhausted for {operation}: {}", describe_attempts(.attempts))]
    Exhausted {
        operation: &'static str,
        attempts: Vec<(String, String)>,
    },
}

impl FetchError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        FetchError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }

    /// Whether another attempt against the same candidate can help. Client
    /// errors skip the remaining retries and move straight to the next
    /// candidate; a confirmed "not found" aborts the whole execution.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Malformed { .. } => true,
            FetchError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::NotFound { .. } | FetchError::Exhausted { .. } => false,
        }
    }
}

fn describe_attempts(attempts: &[(String, String)]) -> String {
    attempts
        .iter()
        .map(|(url, cause)| format!("{url} ({cause})"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries per candidate, counting the first attempt.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn delay_for(&self, retry_index: usize) -> Duration {
        let factor = 1u32 << retry_index.min(16) as u32;
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

/// A successful result, flagged when it was synthesized rather than fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: T,
    pub degraded: bool,
}

impl<T> Fetched<T> {
    pub fn live(data: T) -> Self {
        Self {
            data,
            degraded: false,
        }
    }

    pub fn map<U>(self, apply: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            data: apply(self.data),
            degraded: self.degraded,
        }
    }
}

/// Try each candidate in order with per-candidate retries and exponential
/// backoff. Candidates run strictly sequentially; the retry counter resets
/// when moving to the next candidate. A `NotFound` outcome short-circuits
/// everything: retrying cannot change a confirmed existence answer.
pub async fn execute<T, F, Fut>(
    operation: &'static str,
    candidates: &[String],
    policy: &RetryPolicy,
    mut attempt_fn: F,
) -> Result<T, FetchError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempts_log: Vec<(String, String)> = Vec::new();

    for url in candidates {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match attempt_fn(url.clone()).await {
                Ok(data) => {
                    if !attempts_log.is_empty() {
                        debug!(operation, url = url.as_str(), "Fallback endpoint answered");
                    }
                    return Ok(data);
                }
                Err(e) if e.is_not_found() => {
                    warn!(operation, url = url.as_str(), error = %e, "Entity confirmed absent");
                    return Err(e);
                }
                Err(e) => {
                    if e.is_retryable() && attempt < policy.max_attempts {
                        let delay = policy.delay_for(attempt - 1);
                        warn!(
                            operation,
                            url = url.as_str(),
                            attempt,
                            delay = ?delay,
                            error = %e,
                            "Attempt failed, retrying"
                        );
                        sleep(delay).await;
                        continue;
                    }

                    warn!(
                        operation,
                        url = url.as_str(),
                        attempt,
                        error = %e,
                        "Candidate exhausted, moving to next"
                    );
                    attempts_log.push((url.clone(), e.to_string()));
                    break;
                }
            }
        }
    }

    error!(operation, attempts = attempts_log.len(), "All endpoints exhausted");
    Err(FetchError::Exhausted {
        operation,
        attempts: attempts_log,
    })
}

/// Like [`execute`], but with a synthetic-data escape hatch for passive
/// display surfaces: when every endpoint is exhausted the generator's output
/// is returned as a degraded success. `NotFound` still propagates, since a
/// specific requested entity is never substituted with fabricated content.
pub async fn execute_or_degraded<T, F, Fut, G>(
    operation: &'static str,
    candidates: &[String],
    policy: &RetryPolicy,
    attempt_fn: F,
    generate: G,
) -> Result<Fetched<T>, FetchError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    G: FnOnce() -> T,
{
    match execute(operation, candidates, policy, attempt_fn).await {
        Ok(data) => Ok(Fetched::live(data)),
        Err(e @ FetchError::Exhausted { .. }) => {
            warn!(operation, error = %e, "Serving degraded data");
            Ok(Fetched {
                data: generate(),
                degraded: true,
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5).with_max_delay(Duration::from_secs(10));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(12), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn fallback_answers_after_primary_retries_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_fn = calls.clone();

        let result = execute(
            "test",
            &urls(&["https://primary", "https://fallback"]),
            &fast_policy(2),
            move |url| {
                let calls = calls_in_fn.clone();
                async move {
                    if url.contains("primary") {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(FetchError::Status {
                            url,
                            status: StatusCode::INTERNAL_SERVER_ERROR,
                            body: String::new(),
                        })
                    } else {
                        Ok(42u64)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        // Primary was tried exactly max_attempts times before falling back.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_skip_remaining_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_fn = calls.clone();

        let result = execute(
            "test",
            &urls(&["https://primary", "https://fallback"]),
            &fast_policy(3),
            move |url| {
                let calls = calls_in_fn.clone();
                async move {
                    if url.contains("primary") {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(FetchError::Status {
                            url,
                            status: StatusCode::BAD_REQUEST,
                            body: String::new(),
                        })
                    } else {
                        Ok("ok")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_names_every_candidate() {
        let result: Result<(), _> = execute(
            "proposals",
            &urls(&["https://primary", "https://fallback"]),
            &fast_policy(1),
            |url| async move {
                Err(FetchError::Status {
                    url,
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: String::new(),
                })
            },
        )
        .await;

        let message = result.unwrap_err().to_string();
        assert!(message.contains("https://primary"));
        assert!(message.contains("https://fallback"));
        assert!(message.contains("proposals"));
    }

    #[tokio::test]
    async fn not_found_short_circuits_fallback() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let calls_in_fn = fallback_calls.clone();

        let result: Result<(), _> = execute(
            "proposal_details",
            &urls(&["https://primary", "https://fallback"]),
            &fast_policy(3),
            move |url| {
                let calls = calls_in_fn.clone();
                async move {
                    if url.contains("fallback") {
                        calls.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(FetchError::not_found("proposal", "999999"))
                }
            },
        )
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn degraded_generator_runs_only_on_exhaustion() {
        let fetched = execute_or_degraded(
            "proposals",
            &urls(&["https://primary"]),
            &fast_policy(1),
            |url| async move {
                Err(FetchError::Status {
                    url,
                    status: StatusCode::BAD_GATEWAY,
                    body: String::new(),
                })
            },
            || vec![1, 2, 3],
        )
        .await
        .unwrap();

        assert!(fetched.degraded);
        assert_eq!(fetched.data, vec![1, 2, 3]);

        let fetched = execute_or_degraded(
            "proposals",
            &urls(&["https://primary"]),
            &fast_policy(1),
            |_| async move { Ok(vec![9]) },
            || vec![1, 2, 3],
        )
        .await
        .unwrap();

        assert!(!fetched.degraded);
        assert_eq!(fetched.data, vec![9]);
    }

    #[tokio::test]
    async fn not_found_is_never_replaced_by_synthetic_data() {
        let result = execute_or_degraded(
            "proposal_details",
            &urls(&["https://primary", "https://fallback"]),
            &fast_policy(1),
            |_| async move { Err::<(), _>(FetchError::not_found("proposal", "999999")) },
            || (),
        )
        .await;

        assert!(result.unwrap_err().is_not_found());
    }
}
