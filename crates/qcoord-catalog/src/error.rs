use qcoord_types::ErrorCode;
use qcoord_meta::MetaError;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("collection {0} not found")]
    CollectionNotFound(qcoord_types::CollectionId),

    #[error("partition {1} not found in collection {0}")]
    PartitionNotFound(qcoord_types::CollectionId, qcoord_types::PartitionId),

    #[error("load parameters mismatch persisted state for collection {0}")]
    ParameterMismatched(qcoord_types::CollectionId),

    #[error("{0}")]
    IllegalArgument(String),

    #[error("only {available} candidate nodes available, need {requested}")]
    InsufficientNodes { available: usize, requested: usize },

    #[error(transparent)]
    Meta(#[from] MetaError),
}

impl CatalogError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CatalogError::CollectionNotFound(_) => ErrorCode::CollectionNotFound,
            CatalogError::PartitionNotFound(..) => ErrorCode::PartitionNotFound,
            CatalogError::ParameterMismatched(_) => ErrorCode::ParameterMismatched,
            CatalogError::IllegalArgument(_) => ErrorCode::IllegalArgument,
            CatalogError::InsufficientNodes { .. } => ErrorCode::InsufficientNodes,
            CatalogError::Meta(e) => e.code(),
        }
    }
}
