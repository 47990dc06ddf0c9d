use qcoord_catalog::CatalogError;
use qcoord_job::JobError;
use qcoord_meta::MetaError;
use qcoord_types::ErrorCode;

#[derive(thiserror::Error, Debug)]
pub enum CheckerError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error("corrupt handoff record at {0}: {1}")]
    CorruptHandoffRecord(String, String),
}

impl CheckerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CheckerError::Catalog(e) => e.code(),
            CheckerError::Job(e) => e.code(),
            CheckerError::Meta(e) => e.code(),
            CheckerError::CorruptHandoffRecord(..) => ErrorCode::IllegalArgument,
        }
    }
}
