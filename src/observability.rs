use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::workflows::{RequestStatus, TransitionAction};

/// Workflow engine counters
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub requests_created: AtomicU64,
    pub approvals: AtomicU64,
    pub rejections: AtomicU64,
    pub completed_approved: AtomicU64,
    pub completed_rejected: AtomicU64,
    pub failed_transitions: AtomicU64,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&self) {
        self.requests_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self, action: TransitionAction, outcome: RequestStatus) {
        match action {
            TransitionAction::Approve => self.approvals.fetch_add(1, Ordering::Relaxed),
            TransitionAction::Reject => self.rejections.fetch_add(1, Ordering::Relaxed),
        };
        match outcome {
            RequestStatus::Approved => {
                self.completed_approved.fetch_add(1, Ordering::Relaxed);
            }
            RequestStatus::Rejected => {
                self.completed_rejected.fetch_add(1, Ordering::Relaxed);
            }
            RequestStatus::Pending => {}
        }
    }

    pub fn record_failed_transition(&self) {
        self.failed_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            requests_created: self.requests_created.load(Ordering::Relaxed),
            approvals: self.approvals.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            completed_approved: self.completed_approved.load(Ordering::Relaxed),
            completed_rejected: self.completed_rejected.load(Ordering::Relaxed),
            failed_transitions: self.failed_transitions.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Workflow metrics: created={}, approvals={}, rejections={}, approved={}, rejected={}, failed={}",
            stats.requests_created,
            stats.approvals,
            stats.rejections,
            stats.completed_approved,
            stats.completed_rejected,
            stats.failed_transitions
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStats {
    pub requests_created: u64,
    pub approvals: u64,
    pub rejections: u64,
    pub completed_approved: u64,
    pub completed_rejected: u64,
    pub failed_transitions: u64,
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
