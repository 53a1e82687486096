//! Error taxonomy for the record store and its collaborators

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by [`crate::store::BackgroundStore`] and the
/// attribute/codec layers underneath it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Workspace id or placement mode outside the accepted range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The workspace has no custom record where one was required
    #[error("workspace {0} has no custom background record")]
    NotFound(u32),

    /// The persisted blob is missing, corrupt, or has no base record
    #[error("background store not initialized: {0}")]
    NotReady(String),

    /// Reading or writing the persisted blob failed
    #[error("attribute I/O failed")]
    IoFailure(#[from] std::io::Error),

    /// The supplied image path does not reference an existing regular file
    #[error("not a regular file: {}", .0.display())]
    ValidationFailure(PathBuf),
}

impl StoreError {
    pub fn invalid_workspace(workspace: u32) -> Self {
        Self::InvalidArgument(format!("workspace {workspace} out of range"))
    }
}
