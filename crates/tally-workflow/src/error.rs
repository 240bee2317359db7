use thiserror::Error;

/// Error taxonomy of the workflow surface.
///
/// `Validation` messages name the specific unmet precondition; callers map
/// them onto 400-equivalents, `NotFound` onto 404-equivalents. Data-quality
/// problems never surface here: the engine records them as reason codes on
/// the affected reference.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Unknown run / month / exception key.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A guard condition was not met.
    #[error("{0}")]
    Validation(String),

    /// Persistence or audit-sink failure.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        WorkflowError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
