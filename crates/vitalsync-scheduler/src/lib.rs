//! `vitalsync-scheduler`: registers the daily sync with the host scheduler.
//!
//! # Backends
//!
//! | Backend   | Platform      | Registration                                  |
//! |-----------|---------------|-----------------------------------------------|
//! | `launchd` | macOS         | plist in `~/Library/LaunchAgents`, `launchctl` |
//! | `cron`    | other Unix    | marker-tagged line in the user crontab         |
//!
//! External commands go through [`runner::CommandRunner`] so backends can be
//! exercised without touching the real scheduler.

pub mod cron;
pub mod error;
pub mod launchd;
pub mod registrar;
pub mod runner;
pub mod schedule;
pub mod types;

pub use error::{Result, SchedulerError};
pub use registrar::{platform_backend, ScheduleBackend};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use schedule::compute_next_run;
pub use types::{BackendKind, RegistrationStatus, ScheduleEntry};
