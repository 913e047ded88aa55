use std::io;
use std::path::PathBuf;

use vitalsync_core::SyncError;
use vitalsync_table::TableError;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("vault directory not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid table layout: {0}")]
    Layout(TableError),

    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("unusable table in {}: {source}", path.display())]
    Table { path: PathBuf, source: TableError },

    #[error("lock file {}: {source}", path.display())]
    Lock { path: PathBuf, source: io::Error },
}

impl From<VaultError> for SyncError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::NotFound { path } => SyncError::VaultNotFound { path },
            VaultError::Layout(_) => SyncError::Config(err.to_string()),
            other => SyncError::FileOperation(other.to_string()),
        }
    }
}
