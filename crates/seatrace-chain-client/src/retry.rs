//! Backoff policy for read-only gateway calls.
//!
//! A read is retried when the request never got an answer or the gateway
//! answered 5xx. Any other status goes back to the caller unchanged.
//! Contract writes never go through here: a write whose response was lost
//! may already be on chain, and the caller's pending record covers it.

use std::future::Future;
use std::time::Duration;

use crate::error::ChainError;

/// How many times a read is attempted and how long to wait in between.
///
/// The delay doubles after every failed attempt: with the default policy a
/// read is tried four times, sleeping 200ms, 400ms and 800ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRetry {
    attempts: u32,
    base_delay: Duration,
}

impl Default for ReadRetry {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl ReadRetry {
    /// `attempts` counts the first request; zero is treated as one.
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Single attempt, no backoff.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn delay_after(&self, failed: u32) -> Duration {
        let factor = 1u32 << failed.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }

    /// Send the request built by `f`, retrying transport failures and 5xx
    /// answers.
    ///
    /// Returns the first response below 500. When every attempt fails the
    /// last failure comes back wrapped in [`ChainError::RetriesExhausted`],
    /// or bare if the policy allows a single attempt.
    pub(crate) async fn send<F, Fut>(
        &self,
        endpoint: &str,
        f: F,
    ) -> Result<reqwest::Response, ChainError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 1;
        loop {
            let failure = match f().await {
                Ok(resp) if !resp.status().is_server_error() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    ChainError::Status {
                        endpoint: endpoint.to_string(),
                        status,
                        body,
                    }
                }
                Err(source) => ChainError::Http {
                    endpoint: endpoint.to_string(),
                    source,
                },
            };

            if attempt >= self.attempts {
                if attempt == 1 {
                    return Err(failure);
                }
                return Err(ChainError::RetriesExhausted {
                    endpoint: endpoint.to_string(),
                    attempts: attempt,
                    source: Box::new(failure),
                });
            }

            let delay = self.delay_after(attempt);
            tracing::warn!(
                endpoint,
                attempt,
                max_attempts = self.attempts,
                error = %failure,
                "chain gateway read failed, retrying in {delay:?}"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast(attempts: u32) -> ReadRetry {
        ReadRetry::new(attempts, Duration::from_millis(1))
    }

    async fn get(retry: ReadRetry, server: &MockServer) -> Result<reqwest::Response, ChainError> {
        let http = reqwest::Client::new();
        let url = format!("{}/height", server.uri());
        retry.send("GET /height", || http.get(&url).send()).await
    }

    #[test]
    fn delay_doubles_per_failure() {
        let retry = ReadRetry::default();
        assert_eq!(retry.delay_after(1), Duration::from_millis(200));
        assert_eq!(retry.delay_after(2), Duration::from_millis(400));
        assert_eq!(retry.delay_after(3), Duration::from_millis(800));
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(ReadRetry::new(0, Duration::ZERO).attempts(), 1);
        assert_eq!(ReadRetry::once().attempts(), 1);
    }

    #[tokio::test]
    async fn recovers_after_two_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/height"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/height"))
            .respond_with(ResponseTemplate::new(200).set_body_string("0x10"))
            .expect(1)
            .mount(&server)
            .await;

        let resp = get(fast(4), &server).await.unwrap();
        assert_eq!(resp.text().await.unwrap(), "0x10");
    }

    #[tokio::test]
    async fn reports_attempts_when_server_keeps_failing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/height"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(3)
            .mount(&server)
            .await;

        let err = get(fast(3), &server).await.unwrap_err();
        assert_eq!(err.attempts(), 3);
        match err {
            ChainError::RetriesExhausted { source, .. } => assert!(matches!(
                *source,
                ChainError::Status { status: 502, .. }
            )),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_errors_are_returned_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/height"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let resp = get(fast(4), &server).await.unwrap();
        assert_eq!(resp.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn transport_failures_are_retried_then_reported() {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        // Closed port: connection refused.
        let err = fast(2)
            .send("GET /closed", || http.get("http://127.0.0.1:1/").send())
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), 2);
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn single_attempt_returns_bare_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/height"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let err = get(ReadRetry::once(), &server).await.unwrap_err();
        assert!(matches!(err, ChainError::Status { status: 500, .. }));
        assert_eq!(err.attempts(), 1);
    }
}
