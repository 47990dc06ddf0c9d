use qcoord_types::{ErrorCode, NodeId, ResourceGroupName};

#[derive(thiserror::Error, Debug)]
pub enum ResourceError {
    #[error("resource group {0} already exists")]
    AlreadyExists(ResourceGroupName),

    #[error("resource group {0} not found")]
    NotFound(ResourceGroupName),

    #[error("the default resource group cannot be dropped")]
    CannotDropDefault,

    #[error("resource group {0} still has replicas referencing it")]
    StillReferenced(ResourceGroupName),

    #[error("node {0} does not belong to resource group {1}")]
    NodeNotInGroup(NodeId, ResourceGroupName),

    #[error("only {available} nodes available in {group}, requested {requested}")]
    InsufficientNodes {
        group: ResourceGroupName,
        available: usize,
        requested: usize,
    },

    #[error("source and destination groups are the same: {0}")]
    SameGroup(ResourceGroupName),
}

impl ResourceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ResourceError::AlreadyExists(_)
            | ResourceError::CannotDropDefault
            | ResourceError::StillReferenced(_)
            | ResourceError::NodeNotInGroup(..)
            | ResourceError::SameGroup(_) => ErrorCode::IllegalArgument,
            ResourceError::NotFound(_) => ErrorCode::IllegalArgument,
            ResourceError::InsufficientNodes { .. } => ErrorCode::InsufficientNodes,
        }
    }
}
