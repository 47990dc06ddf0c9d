use qcoord_types::ErrorCode;

/// Errors internal to the task scheduler. Per spec, these never cross the
/// RPC boundary to a client — callers (checkers, jobs) observe and
/// tolerate them, they do not surface as request failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task already satisfied by current distribution")]
    AlreadyDone,

    #[error("a higher-or-equal priority task already targets this (replica, entity)")]
    ConflictTaskExisted,

    #[error("task was canceled")]
    TaskCanceled,

    #[error("task target is stale")]
    TaskStale,

    #[error("task {0:?} not found")]
    NotFound(crate::task::TaskId),
}

impl TaskError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TaskError::AlreadyDone => ErrorCode::AlreadyDone,
            TaskError::ConflictTaskExisted => ErrorCode::ConflictTaskExisted,
            TaskError::TaskCanceled => ErrorCode::TaskCanceled,
            TaskError::TaskStale => ErrorCode::TaskStale,
            TaskError::NotFound(_) => ErrorCode::TaskCanceled,
        }
    }
}
