//! Validation of the daily-metrics JSON body.
//!
//! The body is a flat object: a `timestamp` plus one numeric field per
//! [`MetricKey`]. The timestamp is mandatory; metric problems only make the
//! affected metric absent.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;
use vitalsync_core::{MetricKey, MetricSample};

use crate::error::FetchError;

pub const TIMESTAMP_FIELD: &str = "timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// Field absent or `null`.
    Missing,
    NotNumeric,
    OutOfRange,
}

/// A metric that was dropped while validating the body.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub key: MetricKey,
    pub kind: IssueKind,
    pub raw: Option<String>,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.raw) {
            (IssueKind::Missing, _) => write!(f, "{} missing from response", self.key),
            (IssueKind::NotNumeric, Some(raw)) => write!(f, "{} is not numeric: {raw}", self.key),
            (IssueKind::OutOfRange, Some(raw)) => {
                let range = self.key.valid_range();
                write!(
                    f,
                    "{}={raw} is outside [{}, {}]",
                    self.key,
                    range.start(),
                    range.end()
                )
            }
            (kind, None) => write!(f, "{} rejected ({kind:?})", self.key),
        }
    }
}

/// Build a sample for `date` from a response body.
pub fn parse_sample(
    date: NaiveDate,
    body: &Value,
) -> Result<(MetricSample, Vec<FieldIssue>), FetchError> {
    let obj = body
        .as_object()
        .ok_or_else(|| FetchError::InvalidResponse("body is not a JSON object".to_string()))?;

    let raw_ts = obj
        .get(TIMESTAMP_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::InvalidResponse("missing timestamp".to_string()))?;
    let recorded_at = parse_timestamp(raw_ts)
        .ok_or_else(|| FetchError::InvalidResponse(format!("unparsable timestamp {raw_ts:?}")))?;

    let mut sample = MetricSample::new(date).with_recorded_at(recorded_at);
    let mut issues = Vec::new();

    for key in MetricKey::ALL {
        let issue = |kind, raw: Option<String>| FieldIssue { key, kind, raw };
        let number = match obj.get(key.as_str()) {
            None | Some(Value::Null) => {
                issues.push(issue(IssueKind::Missing, None));
                continue;
            }
            Some(v) => match v.as_f64() {
                Some(n) => n,
                None => {
                    issues.push(issue(IssueKind::NotNumeric, Some(v.to_string())));
                    continue;
                }
            },
        };
        match sample.clone().with_value(key, number) {
            Ok(next) => sample = next,
            Err(_) => issues.push(issue(IssueKind::OutOfRange, Some(number.to_string()))),
        }
    }

    Ok((sample, issues))
}

/// RFC 3339, or a naive ISO-8601 date-time taken as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}
