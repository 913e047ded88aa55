use thiserror::Error;

/// Errors that can occur while registering the scheduled run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An external scheduler command exited unsuccessfully.
    #[error("{program} {args} failed: {message}")]
    Command {
        program: String,
        args: String,
        message: String,
    },

    /// No backend exists for this platform.
    #[error("Unsupported platform: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
