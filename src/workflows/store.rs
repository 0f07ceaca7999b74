use std::collections::HashMap;

use super::status::WorkflowStatus;

/// Lookup layer for tracked workflow statuses.
///
/// The engine serializes every call behind its own lock, so implementations
/// need no internal synchronization.
pub trait StatusStore: Send {
    fn get(&self, request_id: &str) -> Option<WorkflowStatus>;

    /// Insert or overwrite the status keyed by its request id.
    fn put(&mut self, status: WorkflowStatus);

    fn all(&self) -> Vec<WorkflowStatus>;

    fn replace_all(&mut self, statuses: Vec<WorkflowStatus>);
}

#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    statuses: HashMap<String, WorkflowStatus>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for InMemoryStatusStore {
    fn get(&self, request_id: &str) -> Option<WorkflowStatus> {
        self.statuses.get(request_id).cloned()
    }

    fn put(&mut self, status: WorkflowStatus) {
        self.statuses.insert(status.request_id().to_string(), status);
    }

    fn all(&self) -> Vec<WorkflowStatus> {
        let mut statuses: Vec<WorkflowStatus> = self.statuses.values().cloned().collect();
        statuses.sort_by(|a, b| a.request_id().cmp(b.request_id()));
        statuses
    }

    fn replace_all(&mut self, statuses: Vec<WorkflowStatus>) {
        self.statuses = statuses
            .into_iter()
            .map(|status| (status.request_id().to_string(), status))
            .collect();
    }
}
