use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// The fixed set of daily metrics the API reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    SleepScore,
    SleepDuration,
    RecoveryScore,
    StrainScore,
    Hrv,
}

impl MetricKey {
    pub const ALL: [MetricKey; 5] = [
        MetricKey::SleepScore,
        MetricKey::SleepDuration,
        MetricKey::RecoveryScore,
        MetricKey::StrainScore,
        MetricKey::Hrv,
    ];

    /// JSON field name / config spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::SleepScore => "sleep_score",
            MetricKey::SleepDuration => "sleep_duration",
            MetricKey::RecoveryScore => "recovery_score",
            MetricKey::StrainScore => "strain_score",
            MetricKey::Hrv => "hrv",
        }
    }

    /// Inclusive range a reported value must fall in to be accepted.
    pub fn valid_range(&self) -> RangeInclusive<f64> {
        match self {
            MetricKey::SleepScore | MetricKey::RecoveryScore => 0.0..=100.0,
            MetricKey::StrainScore => 0.0..=21.0,
            // hours
            MetricKey::SleepDuration => 0.0..=24.0,
            // milliseconds (RMSSD)
            MetricKey::Hrv => 0.0..=300.0,
        }
    }

    /// Decimal places used when a column does not configure its own.
    pub fn default_decimals(&self) -> u8 {
        match self {
            MetricKey::SleepDuration | MetricKey::StrainScore => 1,
            MetricKey::SleepScore | MetricKey::RecoveryScore | MetricKey::Hrv => 0,
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        MetricKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown metric key: {s}"))
    }
}

/// A value rejected by [`MetricSample::with_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutOfRange {
    pub key: MetricKey,
    pub value: f64,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = self.key.valid_range();
        write!(
            f,
            "{}={} is outside [{}, {}]",
            self.key,
            self.value,
            range.start(),
            range.end()
        )
    }
}

/// One day's metric values. Absent keys mean the API did not provide a
/// usable value; present values are always inside [`MetricKey::valid_range`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    date: NaiveDate,
    recorded_at: Option<DateTime<FixedOffset>>,
    values: BTreeMap<MetricKey, f64>,
}

impl MetricSample {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            recorded_at: None,
            values: BTreeMap::new(),
        }
    }

    pub fn with_recorded_at(mut self, at: DateTime<FixedOffset>) -> Self {
        self.recorded_at = Some(at);
        self
    }

    /// Add a value, rejecting non-finite or out-of-range numbers.
    pub fn with_value(mut self, key: MetricKey, value: f64) -> Result<Self, OutOfRange> {
        if !value.is_finite() || !key.valid_range().contains(&value) {
            return Err(OutOfRange { key, value });
        }
        self.values.insert(key, value);
        Ok(self)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn recorded_at(&self) -> Option<DateTime<FixedOffset>> {
        self.recorded_at
    }

    pub fn get(&self, key: MetricKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    /// Keys with no value, in declaration order.
    pub fn missing(&self) -> Vec<MetricKey> {
        MetricKey::ALL
            .into_iter()
            .filter(|k| !self.values.contains_key(k))
            .collect()
    }

    pub fn present(&self) -> impl Iterator<Item = (MetricKey, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

/// Daily run time in 24-hour local time. Written as `"HH:MM"` in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScheduleSpec {
    pub hour: u8,
    pub minute: u8,
}

impl ScheduleSpec {
    pub fn new(hour: u8, minute: u8) -> Result<Self, String> {
        if hour > 23 || minute > 59 {
            return Err(format!("run time {hour:02}:{minute:02} is out of range"));
        }
        Ok(Self { hour, minute })
    }
}

impl FromStr for ScheduleSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let err = || format!("run_time must be in HH:MM format (24-hour), got {s:?}");
        let (h, m) = s.split_once(':').ok_or_else(err)?;
        if h.len() != 2 || m.len() != 2 {
            return Err(err());
        }
        let hour: u8 = h.parse().map_err(|_| err())?;
        let minute: u8 = m.parse().map_err(|_| err())?;
        Self::new(hour, minute).map_err(|_| err())
    }
}

impl TryFrom<String> for ScheduleSpec {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleSpec> for String {
    fn from(value: ScheduleSpec) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
