//! Bounded retry for provider requests.
//!
//! The provider endpoints are plain idempotent GETs, so transient failures
//! (408, 429, 5xx, connection drops) are retried a fixed number of times
//! with exponential backoff. A `Retry-After` header naming a delay under a
//! minute overrides the computed backoff. Jitter shaves up to a quarter off
//! each delay so synchronized clients do not stampede the provider.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};

const RETRY_AFTER_CAP: Duration = Duration::from_secs(60);

/// How a request sequence ended.
#[derive(Debug)]
pub enum Attempt {
    /// 2xx response.
    Ok(Response),
    /// Final non-success status (retries exhausted or status not
    /// retryable). The response is kept for inspection.
    Failed(Response),
    /// The provider could not be reached at all.
    Unreachable {
        attempts: u32,
        source: reqwest::Error,
    },
}

/// Retry policy: attempt budget and backoff curve.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles per step.
    pub base_delay: Duration,
    /// Ceiling for the computed backoff.
    pub max_delay: Duration,
    /// Fraction of the delay the down-jitter may remove (0.0 disables).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Statuses worth a second try. Everything else fails fast.
    #[must_use]
    pub fn retryable(status: StatusCode) -> bool {
        status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
    }

    /// Backoff before retry number `step` (0-based), honoring any
    /// `Retry-After` header the provider sent.
    #[must_use]
    pub fn backoff(&self, step: u32, headers: Option<&HeaderMap>) -> Duration {
        if let Some(after) = headers.and_then(retry_after) {
            return after;
        }

        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(step))
            .min(self.max_delay);
        if self.jitter <= 0.0 {
            return exp;
        }
        let keep = 1.0 - rand::random::<f64>() * self.jitter;
        exp.mul_f64(keep)
    }

    /// Run `build` until it succeeds or the attempt budget is spent.
    pub async fn run<F>(&self, build: F) -> Attempt
    where
        F: Fn() -> RequestBuilder,
    {
        let mut step = 0;
        loop {
            let out_of_budget = step >= self.max_retries;

            match build().send().await {
                Ok(response) if response.status().is_success() => {
                    return Attempt::Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    if out_of_budget || !Self::retryable(status) {
                        return Attempt::Failed(response);
                    }
                    let wait = self.backoff(step, Some(response.headers()));
                    tracing::debug!(%status, step, wait_ms = wait.as_millis(), "retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(source) => {
                    if out_of_budget || !transient(&source) {
                        return Attempt::Unreachable {
                            attempts: step + 1,
                            source,
                        };
                    }
                    let wait = self.backoff(step, None);
                    tracing::debug!(error = %source, step, wait_ms = wait.as_millis(), "retrying");
                    tokio::time::sleep(wait).await;
                }
            }

            step += 1;
        }
    }
}

/// `Retry-After` in whole seconds, accepted only when positive and under
/// the cap.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get("retry-after")?.to_str().ok()?.parse().ok()?;
    let wait = Duration::from_secs(secs);
    (wait > Duration::ZERO && wait < RETRY_AFTER_CAP).then_some(wait)
}

fn transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter: 0.0,
        }
    }

    #[test]
    fn retryable_statuses() {
        assert!(RetryPolicy::retryable(StatusCode::REQUEST_TIMEOUT));
        assert!(RetryPolicy::retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(RetryPolicy::retryable(StatusCode::BAD_GATEWAY));
        assert!(!RetryPolicy::retryable(StatusCode::BAD_REQUEST));
        assert!(!RetryPolicy::retryable(StatusCode::NOT_FOUND));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(0, None), Duration::from_millis(500));
        assert_eq!(policy.backoff(1, None), Duration::from_secs(1));
        assert_eq!(policy.backoff(10, None), Duration::from_secs(8));
    }

    #[test]
    fn backoff_jitter_stays_in_band() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let wait = policy.backoff(0, None);
            assert!(wait >= Duration::from_millis(375));
            assert!(wait <= Duration::from_millis(500));
        }
    }

    #[test]
    fn retry_after_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("3"));
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0, Some(&headers)), Duration::from_secs(3));
    }

    #[test]
    fn retry_after_out_of_range_is_ignored() {
        for value in ["0", "120", "soon"] {
            let mut headers = HeaderMap::new();
            headers.insert("retry-after", HeaderValue::from_str(value).unwrap());
            assert_eq!(retry_after(&headers), None);
        }
    }

    #[tokio::test]
    async fn recovers_from_transient_429() {
        let server = MockServer::start().await;
        let hits = AtomicU32::new(0);
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(move |_: &wiremock::Request| {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(429)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/data", server.uri());
        let outcome = quick().run(|| client.get(&url)).await;
        assert!(matches!(outcome, Attempt::Ok(_)));
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3) // initial + 2 retries
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/data", server.uri());
        match quick().run(|| client.get(&url)).await {
            Attempt::Failed(response) => {
                assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_errors_fail_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/data", server.uri());
        match quick().run(|| client.get(&url)).await {
            Attempt::Failed(response) => {
                assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
