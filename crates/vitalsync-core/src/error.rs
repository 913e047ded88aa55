use std::path::PathBuf;

use thiserror::Error;

/// Process exit codes, one per failure class.
pub mod exit_code {
    pub const OK: u8 = 0;
    pub const CONFIG: u8 = 1;
    pub const AUTH: u8 = 2;
    pub const API: u8 = 3;
    pub const FILE: u8 = 4;
}

/// Top-level failure of a sync run. Each variant terminates the run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vault not found: {}", path.display())]
    VaultNotFound { path: PathBuf },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("File operation failed: {0}")]
    FileOperation(String),
}

impl SyncError {
    /// Exit code the process reports for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::VaultNotFound { .. } => exit_code::CONFIG,
            SyncError::Auth(_) => exit_code::AUTH,
            SyncError::ApiRequest(_) => exit_code::API,
            SyncError::FileOperation(_) => exit_code::FILE,
        }
    }

    /// Short error code string used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "CONFIG_ERROR",
            SyncError::VaultNotFound { .. } => "VAULT_NOT_FOUND",
            SyncError::Auth(_) => "AUTH_FAILED",
            SyncError::ApiRequest(_) => "API_REQUEST_FAILED",
            SyncError::FileOperation(_) => "FILE_OPERATION_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
