//! `vitalsync-vault`: monthly markdown files and the run lock.

pub mod atomic;
pub mod error;
pub mod lock;
pub mod manager;

pub use atomic::{write_atomic, write_atomic_with};
pub use error::VaultError;
pub use lock::{LockAttempt, RunLock};
pub use manager::{MonthlyFileManager, Planned, SyncOutcome, SyncPlan};
