use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use tracing::{debug, info, warn};
use vitalsync_core::config::ApiConfig;
use vitalsync_core::MetricSample;

use crate::error::FetchError;
use crate::response::parse_sample;
use crate::retry::{classify, parse_retry_after, Disposition, RetryPolicy};
use crate::source::MetricSource;

const USER_AGENT: &str = concat!("vitalsync/", env!("CARGO_PKG_VERSION"));

/// Bearer-authenticated client for the daily metrics endpoint.
pub struct MetricsClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    policy: RetryPolicy,
}

/// Result of one HTTP attempt that did not produce a body.
enum AttemptFailure {
    Retryable {
        reason: String,
        retry_after: Option<Duration>,
    },
    Fatal(FetchError),
}

impl MetricsClient {
    pub fn new(cfg: &ApiConfig, token: impl Into<String>) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.clone(),
            token: token.into(),
            policy: RetryPolicy::from_config(cfg),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn attempt(&self, date: NaiveDate) -> Result<Value, AttemptFailure> {
        let resp = self
            .http
            .get(&self.base_url)
            .bearer_auth(&self.token)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    AttemptFailure::Fatal(FetchError::Http(e))
                } else {
                    AttemptFailure::Retryable {
                        reason: e.to_string(),
                        retry_after: None,
                    }
                }
            })?;

        let status = resp.status();
        match classify(status) {
            Disposition::Success => resp.json::<Value>().await.map_err(|e| {
                AttemptFailure::Fatal(FetchError::InvalidResponse(format!(
                    "body is not valid JSON: {e}"
                )))
            }),
            Disposition::Retry => {
                let retry_after = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                Err(AttemptFailure::Retryable {
                    reason: format!("HTTP {}", status.as_u16()),
                    retry_after,
                })
            }
            Disposition::Auth => {
                let message = resp.text().await.unwrap_or_default();
                Err(AttemptFailure::Fatal(FetchError::Auth {
                    status: status.as_u16(),
                    message,
                }))
            }
            Disposition::Fatal => {
                let message = resp.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), body = %message, "metrics API error");
                Err(AttemptFailure::Fatal(FetchError::Api {
                    status: status.as_u16(),
                    message,
                }))
            }
        }
    }
}

#[async_trait]
impl MetricSource for MetricsClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, date: NaiveDate) -> Result<MetricSample, FetchError> {
        debug!(url = %self.base_url, %date, "fetching daily metrics");

        let attempts = self.policy.attempts();
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.attempt(date).await {
                Ok(body) => {
                    if attempt > 0 {
                        info!(attempt, "request succeeded after retry");
                    }
                    let (sample, issues) = parse_sample(date, &body)?;
                    for issue in &issues {
                        warn!(metric = %issue.key, "{issue}; leaving cell empty");
                    }
                    if let Some(ts) = sample.recorded_at() {
                        if ts.naive_local().date() != date {
                            warn!(%date, timestamp = %ts, "response timestamp is for a different day");
                        }
                    }
                    return Ok(sample);
                }
                Err(AttemptFailure::Fatal(e)) => return Err(e),
                Err(AttemptFailure::Retryable {
                    reason,
                    retry_after,
                }) => {
                    warn!(attempt, err = %reason, "metrics request failed");
                    last_error = reason;
                    if attempt < self.policy.max_retries {
                        let delay = self.policy.delay_with_hint(attempt, retry_after);
                        debug!(delay_ms = delay.as_millis() as u64, "backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts,
            last_error,
        })
    }
}
