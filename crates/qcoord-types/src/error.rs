use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Cross-cutting error taxonomy surfaced at the RPC boundary.
///
/// Every crate in the workspace defines its own local `Error` type; each
/// maps into one of these codes via a `code(&self) -> ErrorCode` method so
/// that `qcoord-service` can shape a uniform `(ErrorCode, String)` response
/// regardless of which subsystem raised the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The coordinator is not `Healthy`; retry later.
    NotHealthy,
    /// Validation, schema, or resource-group lookup failure.
    IllegalArgument,
    /// Load/release parameters conflict with already-persisted state.
    ParameterMismatched,
    /// Not enough candidate nodes to satisfy a replica spawn.
    InsufficientNodes,
    /// A worker reported it cannot hold the requested load.
    InsufficientMemoryToLoad,
    CollectionNotFound,
    PartitionNotFound,
    /// No shard of the collection currently has a valid leader and a
    /// fully-loaded segment set.
    NoReplicaAvailable,
    /// Internal to the task scheduler; never returned to a client.
    TaskCanceled,
    /// Internal to the task scheduler; never returned to a client.
    TaskStale,
    /// Internal to the task scheduler; never returned to a client.
    ConflictTaskExisted,
    /// Internal to the task scheduler; never returned to a client.
    AlreadyDone,
    /// Persistence failure. Any operation surfacing this aborts.
    MetaFailed,
    /// Catch-all for failures that do not fit a more specific code.
    UnexpectedError,
    Success,
}

impl ErrorCode {
    /// True for the codes that are internal bookkeeping signals and must
    /// never cross the RPC boundary to a client.
    pub fn is_internal_only(self) -> bool {
        matches!(
            self,
            ErrorCode::TaskCanceled
                | ErrorCode::TaskStale
                | ErrorCode::ConflictTaskExisted
                | ErrorCode::AlreadyDone
        )
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        ErrorCode::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_only_codes_are_flagged() {
        assert!(ErrorCode::ConflictTaskExisted.is_internal_only());
        assert!(ErrorCode::AlreadyDone.is_internal_only());
        assert!(!ErrorCode::IllegalArgument.is_internal_only());
        assert!(!ErrorCode::NotHealthy.is_internal_only());
    }
}
