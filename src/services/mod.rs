//! Application services orchestrating domain logic and side effects.
pub mod files;
pub mod validator;

use crate::multipart::DecodeError;

/// Convenience alias for service results.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Path not found or is not a directory")]
    DirectoryNotFound,
    #[error("File not found")]
    FileNotFound,
    #[error("Access denied: Invalid upload path")]
    InvalidUploadPath,
    #[error("Access denied: Invalid target file path")]
    InvalidTargetPath,
    #[error("Bad upload request (invalid file name)")]
    InvalidFileName,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("failed to list entries")]
    ListEntries(#[source] std::io::Error),
    #[error("failed to read file")]
    ReadFile(#[source] std::io::Error),
    #[error("failed to save file")]
    SaveFile(#[source] std::io::Error),
    #[error("background task failed")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl ServiceError {
    /// Underlying I/O error, when the failure came from the filesystem.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            Self::ListEntries(err) | Self::ReadFile(err) | Self::SaveFile(err) => Some(err),
            _ => None,
        }
    }
}
