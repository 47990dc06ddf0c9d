//! Coordinator-level error type: the thing every RPC method returns.

use qcoord_catalog::CatalogError;
use qcoord_job::JobError;
use qcoord_meta::MetaError;
use qcoord_resource::ResourceError;
use qcoord_types::ErrorCode;
use thiserror::Error;

/// Result type for coordinator RPC handlers.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Errors surfaced across the client- and worker-facing RPC boundary.
///
/// Every variant maps to an [`ErrorCode`] via [`CoordinatorError::code`];
/// that mapping, not the `Display` string, is what clients should branch on.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("job scheduling error: {0}")]
    Job(#[from] JobError),

    #[error("resource group error: {0}")]
    Resource(#[from] ResourceError),

    #[error("meta store error: {0}")]
    Meta(#[from] MetaError),

    /// The coordinator has not finished loading state (or is draining) and
    /// cannot safely serve this RPC yet. Retry later.
    #[error("coordinator is not healthy: {0}")]
    NotHealthy(String),

    /// No replica of the collection currently holds a usable shard leader
    /// for one or more requested channels.
    #[error("no replica available for collection {collection}: {reason}")]
    NoReplicaAvailable { collection: String, reason: String },

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("node {0} not found among known workers")]
    NodeNotFound(u64),
}

impl CoordinatorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoordinatorError::Catalog(e) => e.code(),
            CoordinatorError::Job(e) => e.code(),
            CoordinatorError::Resource(e) => e.code(),
            CoordinatorError::Meta(e) => e.code(),
            CoordinatorError::NotHealthy(_) => ErrorCode::NotHealthy,
            CoordinatorError::NoReplicaAvailable { .. } => ErrorCode::NoReplicaAvailable,
            CoordinatorError::IllegalArgument(_) => ErrorCode::IllegalArgument,
            CoordinatorError::NodeNotFound(_) => ErrorCode::IllegalArgument,
        }
    }
}
