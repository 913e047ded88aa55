//! `vitalsync-core`: shared configuration, error taxonomy and data model.
//!
//! Every other crate in the workspace depends on this one. Nothing here
//! performs I/O except [`config::AppConfig::load`].

pub mod calendar;
pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, SyncError};
pub use types::{MetricKey, MetricSample, ScheduleSpec};
