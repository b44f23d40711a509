//! `HttpSession`: a cookie-bearing `reqwest::Client` plus the retry
//! policy from spec.md §4.1.
//!
//! Grounded on `lunaroute-egress/src/client.rs`'s `HttpClientConfig` /
//! `create_client` / `with_retry` shape, generalized from a fixed
//! 3-retry/fixed-backoff policy to the 10-retry/jittered/capped policy
//! this engine requires, and extended with the outer "Read timed out."
//! recovery layer for the known YouTube "Read timed out." upstream
//! defect where a stalled socket read never resolves on its own.

use chatdl_core::Error;
use rand::Rng;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const RETRYABLE_STATUSES: &[u16] = &[413, 429, 500, 502, 503, 504];
const MAX_RETRIES: u32 = 10;
const BACKOFF_CAP_SECS: f64 = 32.0;
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct HttpSessionConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for HttpSessionConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("chat-cast/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            max_retries: MAX_RETRIES,
        }
    }
}

/// Owns the client, its cookie jar, and the retry policy. One instance
/// per engine run (§5 "Shared resources": not shared across parallel
/// invocations).
pub struct HttpSession {
    client: Client,
    jar: Arc<reqwest::cookie::Jar>,
    config: HttpSessionConfig,
}

impl HttpSession {
    pub fn new(config: HttpSessionConfig) -> Result<Self, Error> {
        let jar = Arc::new(reqwest::cookie::Jar::default());
        let client = build_client(&config, jar.clone())?;
        Ok(Self {
            client,
            jar,
            config,
        })
    }

    pub fn cookie_jar(&self) -> &Arc<reqwest::cookie::Jar> {
        &self.jar
    }

    /// Inserts a cookie (as produced by the Netscape file loader) into
    /// the live jar so it is sent on subsequent requests.
    pub fn set_cookie(&self, url: &reqwest::Url, raw_set_cookie_header: &str) {
        self.jar.add_cookie_str(raw_set_cookie_header, url);
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response, Error> {
        self.execute_with_retry(Method::GET, url, None).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, Error> {
        self.execute_with_retry(Method::POST, url, Some(body.clone()))
            .await
    }

    /// §4.1: up to 10 retries on `{413,429,500,502,503,504}` and on
    /// connection/read timeouts, with the outer read-timeout-string
    /// recovery layer wrapped around each attempt.
    async fn execute_with_retry(
        &self,
        method: Method,
        url: &str,
        json_body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, Error> {
        let mut attempt: u32 = 0;
        loop {
            let result = self.execute_once_with_outer_retry(&method, url, json_body.as_ref(), attempt).await;
            match result {
                Ok(response) => {
                    if RETRYABLE_STATUSES.contains(&response.status().as_u16())
                        && attempt < self.config.max_retries
                    {
                        attempt += 1;
                        sleep_with_jittered_backoff(attempt).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if attempt < self.config.max_retries && is_retryable_transport_error(&e) => {
                    attempt += 1;
                    warn!(attempt, error = %e, "retrying after transient HTTP error");
                    sleep_with_jittered_backoff(attempt).await;
                }
                Err(e) => return Err(Error::Http(e.to_string())),
            }
        }
    }

    /// The "outer" layer (§4.1): after a 200-status header but a timed
    /// out body, some stacks raise a non-retriable connection error
    /// whose string ends with "Read timed out."; retry once more per
    /// attempt in that specific case, all retries logged with the
    /// attempt number and the error's `Debug` rendering.
    async fn execute_once_with_outer_retry(
        &self,
        method: &Method,
        url: &str,
        json_body: Option<&serde_json::Value>,
        attempt: u32,
    ) -> Result<reqwest::Response, reqwest::Error> {
        match self.execute_once(method, url, json_body).await {
            Ok(response) => Ok(response),
            Err(e) if attempt <= MAX_RETRIES && error_ends_with_read_timeout(&e) => {
                warn!(attempt, error = ?e, "outer retry: body read timed out after 200 header");
                self.execute_once(method, url, json_body).await
            }
            Err(e) => Err(e),
        }
    }

    async fn execute_once(
        &self,
        method: &Method,
        url: &str,
        json_body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self.client.request(method.clone(), url);
        if let Some(body) = json_body {
            builder = builder.json(body);
        }
        builder.send().await
    }
}

fn build_client(
    config: &HttpSessionConfig,
    jar: Arc<reqwest::cookie::Jar>,
) -> Result<Client, Error> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(&config.user_agent)
        .cookie_provider(jar)
        .build()
        .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))
}

fn is_retryable_transport_error(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

fn error_ends_with_read_timeout(e: &reqwest::Error) -> bool {
    e.to_string().ends_with("Read timed out.")
}

/// Exponential backoff with factor jittered uniformly in `[1.0, 1.5]`,
/// capped at 32 seconds (§4.1).
async fn sleep_with_jittered_backoff(attempt: u32) {
    let delay = jittered_backoff_secs(attempt);
    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
}

fn jittered_backoff_secs(attempt: u32) -> f64 {
    let base = 2f64.powi(attempt as i32 - 1).min(BACKOFF_CAP_SECS);
    let jitter = rand::rng().random_range(1.0..1.5);
    (base * jitter).min(BACKOFF_CAP_SECS)
}

#[allow(dead_code)]
fn retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_exceeds_cap() {
        for attempt in 1..=20 {
            assert!(jittered_backoff_secs(attempt) <= BACKOFF_CAP_SECS);
        }
    }

    #[test]
    fn backoff_grows_with_attempt_before_cap() {
        // attempt=1 base is 1.0s (pre-jitter); attempt=4 base is 8.0s.
        let low = jittered_backoff_secs(1);
        let high = jittered_backoff_secs(4);
        assert!(low <= 1.5 + f64::EPSILON);
        assert!(high >= 8.0 && high <= 12.0);
    }

    #[test]
    fn retryable_status_matches_spec_set() {
        for code in [413, 429, 500, 502, 503, 504] {
            assert!(retryable_status(StatusCode::from_u16(code).unwrap()));
        }
        assert!(!retryable_status(StatusCode::from_u16(404).unwrap()));
    }
}
