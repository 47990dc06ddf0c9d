use qcoord_types::ErrorCode;

/// Failure surfaced by a [`crate::MetaStore`] operation.
///
/// Every variant maps to [`ErrorCode::MetaFailed`]: the caller never needs
/// to distinguish an I/O failure from a serialization failure, only that
/// the write or read did not happen and the in-memory index must not be
/// updated.
#[derive(thiserror::Error, Debug)]
pub enum MetaError {
    #[error("meta store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("meta store serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("meta store key not found: {0}")]
    NotFound(String),

    #[error("startup load of prefix {0} failed: {1}")]
    StartupLoadFailed(String, String),
}

impl MetaError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::MetaFailed
    }
}
