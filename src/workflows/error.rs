use thiserror::Error;

use super::status::RequestStatus;

/// Failures surfaced by the workflow engine. A failed operation never
/// leaves a partial update behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Workflow request not found: {request_id}")]
    NotFound { request_id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Workflow request {request_id} is already {status}")]
    Conflict {
        request_id: String,
        status: RequestStatus,
    },
}

impl WorkflowError {
    pub fn invalid(message: impl Into<String>) -> Self {
        WorkflowError::InvalidInput(message.into())
    }
}
