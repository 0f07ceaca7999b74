use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "Pending"),
            RequestStatus::Approved => write!(f, "Approved"),
            RequestStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionAction {
    Approve,
    Reject,
}

impl FromStr for TransitionAction {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(TransitionAction::Approve),
            "reject" => Ok(TransitionAction::Reject),
            other => Err(WorkflowError::invalid(format!(
                "unknown transition action '{other}', expected 'approve' or 'reject'"
            ))),
        }
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionAction::Approve => write!(f, "approve"),
            TransitionAction::Reject => write!(f, "reject"),
        }
    }
}

/// Input for opening a tracked approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub request_id: String,
    pub title: String,
    /// Signed so that negative indices reach the engine and fail as invalid input.
    #[serde(default)]
    pub current_stage_index: i64,
}

impl WorkflowRequest {
    pub fn new(request_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            title: title.into(),
            current_stage_index: 0,
        }
    }

    pub fn at_stage(mut self, index: i64) -> Self {
        self.current_stage_index = index;
        self
    }
}

/// Tracked state of one approval request.
///
/// `stage` and `stage_index` are present exactly while the request is
/// `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    request_id: String,
    #[serde(default)]
    title: String,
    status: RequestStatus,
    stage: Option<String>,
    #[serde(default)]
    stage_index: Option<usize>,
    updated_at: DateTime<Utc>,
}

impl WorkflowStatus {
    pub(crate) fn pending(
        request_id: impl Into<String>,
        title: impl Into<String>,
        stage: impl Into<String>,
        stage_index: usize,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            title: title.into(),
            status: RequestStatus::Pending,
            stage: Some(stage.into()),
            stage_index: Some(stage_index),
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn terminal(
        request_id: impl Into<String>,
        title: impl Into<String>,
        status: RequestStatus,
    ) -> Self {
        debug_assert!(status.is_terminal());
        Self {
            request_id: request_id.into(),
            title: title.into(),
            status,
            stage: None,
            stage_index: None,
            updated_at: Utc::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    pub fn stage_index(&self) -> Option<usize> {
        self.stage_index
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Checks the terminal/stage invariant on records that did not come
    /// from the engine, e.g. a deserialized snapshot.
    pub(crate) fn validate(&self) -> Result<(), WorkflowError> {
        if self.request_id.is_empty() {
            return Err(WorkflowError::invalid("workflow status has an empty request id"));
        }
        match (self.status.is_terminal(), self.stage.is_some()) {
            (true, true) => Err(WorkflowError::invalid(format!(
                "request {} is {} but still has a stage",
                self.request_id, self.status
            ))),
            (false, false) => Err(WorkflowError::invalid(format!(
                "request {} is Pending without a stage",
                self.request_id
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        assert_eq!("approve".parse::<TransitionAction>().unwrap(), TransitionAction::Approve);
        assert_eq!(" Reject ".parse::<TransitionAction>().unwrap(), TransitionAction::Reject);
        assert!(matches!(
            "escalate".parse::<TransitionAction>(),
            Err(WorkflowError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_status_invariant_validation() {
        let pending = WorkflowStatus::pending("REQ-1", "Vendor onboarding", "L1", 0);
        assert!(pending.validate().is_ok());

        let approved =
            WorkflowStatus::terminal("REQ-1", "Vendor onboarding", RequestStatus::Approved);
        assert!(approved.validate().is_ok());
        assert_eq!(approved.stage(), None);

        let broken: WorkflowStatus = serde_json::from_value(serde_json::json!({
            "request_id": "REQ-2",
            "status": "Approved",
            "stage": "L2",
            "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(broken.validate().is_err());
    }
}
