use qcoord_catalog::CatalogError;
use qcoord_resource::ResourceError;
use qcoord_types::{CollectionId, ErrorCode, ResourceGroupName};

#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("load_partitions requested over whole-collection-loaded collection {0}")]
    PartitionLoadOverWholeCollection(CollectionId),

    #[error("release_partitions requested over whole-collection-loaded collection {0}")]
    PartitionReleaseOverWholeCollection(CollectionId),

    #[error("only found {available} replicas in resource group {group}, requested {requested}")]
    InsufficientReplicas {
        group: ResourceGroupName,
        available: usize,
        requested: usize,
    },
}

impl JobError {
    pub fn code(&self) -> ErrorCode {
        match self {
            JobError::Catalog(e) => e.code(),
            JobError::Resource(e) => e.code(),
            JobError::PartitionLoadOverWholeCollection(_) => ErrorCode::ParameterMismatched,
            JobError::PartitionReleaseOverWholeCollection(_) => ErrorCode::UnexpectedError,
            JobError::InsufficientReplicas { .. } => ErrorCode::IllegalArgument,
        }
    }
}
