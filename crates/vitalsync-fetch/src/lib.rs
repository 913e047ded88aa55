//! `vitalsync-fetch`: one day's metrics from the HTTP API.
//!
//! [`MetricsClient`] issues a single bearer-authenticated GET per sync,
//! retrying 429/5xx and transport failures with exponential backoff, and
//! validates the JSON body into a [`MetricSample`](vitalsync_core::MetricSample).

pub mod client;
pub mod error;
pub mod response;
pub mod retry;
pub mod source;

pub use client::MetricsClient;
pub use error::FetchError;
pub use response::{FieldIssue, IssueKind};
pub use retry::RetryPolicy;
pub use source::MetricSource;
