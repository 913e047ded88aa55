use async_trait::async_trait;
use chrono::NaiveDate;
use vitalsync_core::MetricSample;

use crate::error::FetchError;

/// Anything that can produce one day's metrics.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Fetch metrics for `date`. Individual metrics may be absent; only
    /// auth, transport and unusable-body failures are errors.
    async fn fetch(&self, date: NaiveDate) -> Result<MetricSample, FetchError>;
}
