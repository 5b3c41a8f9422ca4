use crate::job::JobKind;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Parameters for {actual} submitted to the {expected} runner")]
    KindMismatch { expected: JobKind, actual: JobKind },

    #[error("Unknown job kind: {0}")]
    UnknownKind(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
