use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::error::WorkflowError;
use super::stages::StageConfiguration;
use super::status::{RequestStatus, TransitionAction, WorkflowRequest, WorkflowStatus};
use super::store::{InMemoryStatusStore, StatusStore};
use crate::observability::WorkflowMetrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Allow approve/reject on Approved or Rejected requests. The request
    /// re-enters the stage list at index 0 before the action is applied.
    pub reopen_terminal: bool,
}

/// Point-in-time copy of the engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub stages: StageConfiguration,
    pub requests: Vec<WorkflowStatus>,
}

struct EngineState<S> {
    stages: StageConfiguration,
    store: S,
}

/// Multi-stage approval engine.
///
/// All mutations go through a single lock, so a transition either lands
/// completely or not at all and concurrent callers never lose updates.
pub struct WorkflowEngine<S: StatusStore = InMemoryStatusStore> {
    state: Mutex<EngineState<S>>,
    options: EngineOptions,
    metrics: WorkflowMetrics,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(StageConfiguration::default(), EngineOptions::default())
    }
}

impl WorkflowEngine {
    pub fn new(stages: StageConfiguration, options: EngineOptions) -> Self {
        Self::with_store(stages, options, InMemoryStatusStore::new())
    }
}

impl<S: StatusStore> WorkflowEngine<S> {
    pub fn with_store(stages: StageConfiguration, options: EngineOptions, store: S) -> Self {
        Self {
            state: Mutex::new(EngineState { stages, store }),
            options,
            metrics: WorkflowMetrics::new(),
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn metrics(&self) -> &WorkflowMetrics {
        &self.metrics
    }

    fn lock(&self) -> MutexGuard<'_, EngineState<S>> {
        // Every mutation is computed before it is written, so a poisoned
        // guard still holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_configuration(&self) -> StageConfiguration {
        self.lock().stages.clone()
    }

    /// Replace the stage list wholesale. In-flight requests keep their
    /// labels and are re-resolved against the new list on their next
    /// transition.
    pub fn set_configuration(&self, stages: StageConfiguration) -> StageConfiguration {
        let mut state = self.lock();
        info!(
            previous = ?state.stages.labels(),
            stages = ?stages.labels(),
            "Workflow stage configuration replaced"
        );
        state.stages = stages;
        state.stages.clone()
    }

    /// Open (or overwrite) a tracked request at the given stage index.
    /// Request ids are opaque; any string, including an empty one, is a key.
    pub fn create_request(
        &self,
        request: WorkflowRequest,
    ) -> Result<WorkflowStatus, WorkflowError> {
        let mut state = self.lock();
        let stage_count = state.stages.len();
        let index = usize::try_from(request.current_stage_index)
            .ok()
            .filter(|index| *index < stage_count)
            .ok_or_else(|| {
                WorkflowError::invalid(format!(
                    "stage index {} is out of range for {} configured stages",
                    request.current_stage_index, stage_count
                ))
            })?;

        let label = state.stages.get(index).unwrap_or_default().to_string();
        if state.store.get(&request.request_id).is_some() {
            warn!(request_id = %request.request_id, "Overwriting existing workflow request");
        }

        let status = WorkflowStatus::pending(&request.request_id, &request.title, label, index);
        state.store.put(status.clone());
        self.metrics.record_created();

        info!(
            request_id = %status.request_id(),
            stage = ?status.stage(),
            stage_index = index,
            "Workflow request created"
        );
        Ok(status)
    }

    /// Apply an approve/reject action to a tracked request.
    pub fn transition(
        &self,
        request_id: &str,
        action: TransitionAction,
    ) -> Result<WorkflowStatus, WorkflowError> {
        let mut state = self.lock();
        let current = state.store.get(request_id);
        let result = Self::next_status(&state.stages, current, request_id, action, self.options);

        match result {
            Ok(next) => {
                state.store.put(next.clone());
                self.metrics.record_transition(action, next.status());
                info!(
                    request_id = %request_id,
                    action = %action,
                    status = %next.status(),
                    stage = ?next.stage(),
                    "Workflow request transitioned"
                );
                Ok(next)
            }
            Err(e) => {
                self.metrics.record_failed_transition();
                warn!(
                    request_id = %request_id,
                    action = %action,
                    error = %e,
                    "Workflow transition rejected"
                );
                Err(e)
            }
        }
    }

    fn next_status(
        stages: &StageConfiguration,
        current: Option<WorkflowStatus>,
        request_id: &str,
        action: TransitionAction,
        options: EngineOptions,
    ) -> Result<WorkflowStatus, WorkflowError> {
        let current = current.ok_or_else(|| WorkflowError::NotFound {
            request_id: request_id.to_string(),
        })?;

        if current.is_terminal() && !options.reopen_terminal {
            return Err(WorkflowError::Conflict {
                request_id: request_id.to_string(),
                status: current.status(),
            });
        }

        let index = resolve_index(stages, &current);
        debug!(request_id = %request_id, resolved_index = index, "Resolved current stage index");

        let target = match action {
            TransitionAction::Approve => index.checked_add(1).filter(|next| *next < stages.len()),
            TransitionAction::Reject => index.checked_sub(1),
        };

        let next = match (target, action) {
            (Some(next_index), _) => {
                let label = stages.get(next_index).unwrap_or_default();
                WorkflowStatus::pending(request_id, current.title(), label, next_index)
            }
            (None, TransitionAction::Approve) => {
                WorkflowStatus::terminal(request_id, current.title(), RequestStatus::Approved)
            }
            (None, TransitionAction::Reject) => {
                WorkflowStatus::terminal(request_id, current.title(), RequestStatus::Rejected)
            }
        };
        Ok(next)
    }

    pub fn status(&self, request_id: &str) -> Result<WorkflowStatus, WorkflowError> {
        self.lock()
            .store
            .get(request_id)
            .ok_or_else(|| WorkflowError::NotFound {
                request_id: request_id.to_string(),
            })
    }

    /// All tracked requests ordered by request id.
    pub fn list(&self) -> Vec<WorkflowStatus> {
        self.lock().store.all()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let state = self.lock();
        WorkflowSnapshot {
            stages: state.stages.clone(),
            requests: state.store.all(),
        }
    }

    /// Replace configuration and tracked requests with a snapshot. Nothing
    /// is applied if any record breaks the status invariant.
    pub fn restore(&self, snapshot: WorkflowSnapshot) -> Result<(), WorkflowError> {
        for status in &snapshot.requests {
            status.validate()?;
        }

        let mut state = self.lock();
        let count = snapshot.requests.len();
        state.stages = snapshot.stages;
        state.store.replace_all(snapshot.requests);
        info!(requests = count, "Workflow engine restored from snapshot");
        Ok(())
    }
}

/// Position of the request in the current stage list.
///
/// The stored index wins while it still points at the same label; otherwise
/// the label is looked up, and an unknown or absent label resolves to 0.
fn resolve_index(stages: &StageConfiguration, status: &WorkflowStatus) -> usize {
    let Some(label) = status.stage() else {
        return 0;
    };
    if let Some(index) = status.stage_index() {
        if stages.get(index) == Some(label) {
            return index;
        }
    }
    stages.position(label).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn engine() -> WorkflowEngine {
        WorkflowEngine::default()
    }

    fn stage_of(status: &WorkflowStatus) -> Option<String> {
        status.stage().map(str::to_string)
    }

    #[test]
    fn test_create_request_at_each_valid_index() {
        let engine = engine();
        for (index, label) in ["L1", "L2", "L3"].iter().enumerate() {
            let request = WorkflowRequest::new(format!("REQ-{index}"), "Access review")
                .at_stage(index as i64);
            let status = engine.create_request(request).unwrap();
            assert_eq!(status.status(), RequestStatus::Pending);
            assert_eq!(status.stage(), Some(*label));
            assert_eq!(status.stage_index(), Some(index));
        }
    }

    #[test]
    fn test_create_request_out_of_range_is_invalid_input() {
        let engine = engine();
        for index in [3, 42, -1] {
            let err = engine
                .create_request(WorkflowRequest::new("REQ-1", "Access review").at_stage(index))
                .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidInput(_)), "index {index}");
        }
        assert!(engine.list().is_empty());
    }

    #[test]
    fn test_approve_chain_reaches_approved() {
        let engine = engine();
        let created = engine
            .create_request(WorkflowRequest::new("REQ-1", "Policy exception"))
            .unwrap();
        assert_eq!(stage_of(&created).as_deref(), Some("L1"));

        let s = engine.transition("REQ-1", TransitionAction::Approve).unwrap();
        assert_eq!((s.status(), stage_of(&s).as_deref()), (RequestStatus::Pending, Some("L2")));

        let s = engine.transition("REQ-1", TransitionAction::Approve).unwrap();
        assert_eq!((s.status(), stage_of(&s).as_deref()), (RequestStatus::Pending, Some("L3")));

        let s = engine.transition("REQ-1", TransitionAction::Approve).unwrap();
        assert_eq!(s.status(), RequestStatus::Approved);
        assert_eq!(s.stage(), None);
        assert_eq!(s.stage_index(), None);
    }

    #[test]
    fn test_reject_chain_reaches_rejected() {
        let engine = engine();
        engine
            .create_request(WorkflowRequest::new("REQ-2", "Vendor risk acceptance").at_stage(2))
            .unwrap();

        let s = engine.transition("REQ-2", TransitionAction::Reject).unwrap();
        assert_eq!((s.status(), stage_of(&s).as_deref()), (RequestStatus::Pending, Some("L2")));

        let s = engine.transition("REQ-2", TransitionAction::Reject).unwrap();
        assert_eq!((s.status(), stage_of(&s).as_deref()), (RequestStatus::Pending, Some("L1")));

        let s = engine.transition("REQ-2", TransitionAction::Reject).unwrap();
        assert_eq!(s.status(), RequestStatus::Rejected);
        assert_eq!(s.stage(), None);
    }

    #[test]
    fn test_transition_unknown_request_is_not_found() {
        let err = engine().transition("missing", TransitionAction::Approve).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::NotFound {
                request_id: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_terminal_request_is_conflict_by_default() {
        let engine = engine();
        engine
            .create_request(WorkflowRequest::new("REQ-3", "Control change").at_stage(2))
            .unwrap();
        engine.transition("REQ-3", TransitionAction::Approve).unwrap();

        let err = engine.transition("REQ-3", TransitionAction::Reject).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Conflict {
                status: RequestStatus::Approved,
                ..
            }
        ));
        assert_eq!(engine.status("REQ-3").unwrap().status(), RequestStatus::Approved);
        assert_eq!(engine.metrics().get_stats().failed_transitions, 1);
    }

    #[test]
    fn test_terminal_request_reopens_when_enabled() {
        let engine = WorkflowEngine::new(
            StageConfiguration::default(),
            EngineOptions { reopen_terminal: true },
        );
        engine.create_request(WorkflowRequest::new("REQ-4", "Audit finding")).unwrap();
        engine.transition("REQ-4", TransitionAction::Reject).unwrap();
        assert_eq!(engine.status("REQ-4").unwrap().status(), RequestStatus::Rejected);

        // Absent stage resolves to index 0, then approve moves forward one stage.
        let s = engine.transition("REQ-4", TransitionAction::Approve).unwrap();
        assert_eq!((s.status(), stage_of(&s).as_deref()), (RequestStatus::Pending, Some("L2")));
    }

    #[test]
    fn test_unknown_label_after_reconfiguration_falls_back_to_first_stage() {
        let engine = engine();
        engine
            .create_request(WorkflowRequest::new("REQ-5", "Exception").at_stage(2))
            .unwrap();
        engine.set_configuration(StageConfiguration::new(["Legal", "Security", "CISO"]).unwrap());

        let s = engine.transition("REQ-5", TransitionAction::Approve).unwrap();
        assert_eq!(stage_of(&s).as_deref(), Some("Security"));
    }

    #[test]
    fn test_reordered_configuration_uses_label_position() {
        let engine = engine();
        engine.create_request(WorkflowRequest::new("REQ-6", "Exception")).unwrap();
        engine.set_configuration(StageConfiguration::new(["L0", "L1", "L2", "L3"]).unwrap());

        // Stored index 0 now points at L0, so the label lookup wins.
        let s = engine.transition("REQ-6", TransitionAction::Approve).unwrap();
        assert_eq!(stage_of(&s).as_deref(), Some("L2"));
        assert_eq!(s.stage_index(), Some(2));
    }

    #[test]
    fn test_create_overwrites_existing_request() {
        let engine = engine();
        engine.create_request(WorkflowRequest::new("REQ-7", "First")).unwrap();
        engine.transition("REQ-7", TransitionAction::Approve).unwrap();
        let s = engine.create_request(WorkflowRequest::new("REQ-7", "Second")).unwrap();
        assert_eq!(s.title(), "Second");
        assert_eq!(engine.status("REQ-7").unwrap().stage(), Some("L1"));
        assert_eq!(engine.list().len(), 1);
    }

    #[test]
    fn test_empty_request_id_is_an_ordinary_key() {
        let engine = engine();
        let created = engine.create_request(WorkflowRequest::new("", "Untitled")).unwrap();
        assert_eq!(created.request_id(), "");

        let approved = engine.transition("", TransitionAction::Approve).unwrap();
        assert_eq!(approved.stage(), Some("L2"));
        assert_eq!(engine.status("").unwrap(), approved);
    }

    #[test]
    fn test_get_configuration_is_idempotent() {
        let engine = engine();
        assert_eq!(engine.get_configuration(), engine.get_configuration());
    }

    #[test]
    fn test_single_stage_configuration() {
        let engine = WorkflowEngine::new(
            StageConfiguration::new(["Board"]).unwrap(),
            EngineOptions::default(),
        );
        engine.create_request(WorkflowRequest::new("REQ-8", "Charter")).unwrap();
        let s = engine.transition("REQ-8", TransitionAction::Approve).unwrap();
        assert_eq!(s.status(), RequestStatus::Approved);
    }

    #[test]
    fn test_restore_rejects_broken_records_without_applying() {
        let engine = engine();
        engine.create_request(WorkflowRequest::new("REQ-9", "Keep me")).unwrap();

        let broken: WorkflowStatus = serde_json::from_value(serde_json::json!({
            "request_id": "BROKEN",
            "status": "Pending",
            "stage": null,
            "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        let snapshot = WorkflowSnapshot {
            stages: StageConfiguration::new(["X"]).unwrap(),
            requests: vec![broken],
        };

        assert!(engine.restore(snapshot).is_err());
        assert_eq!(engine.get_configuration(), StageConfiguration::default());
        assert!(engine.status("REQ-9").is_ok());
    }

    #[test]
    fn test_snapshot_restore_into_fresh_engine() {
        let engine = engine();
        engine.create_request(WorkflowRequest::new("REQ-10", "Carry over").at_stage(1)).unwrap();
        let snapshot = engine.snapshot();

        let fresh: WorkflowEngine = WorkflowEngine::default();
        fresh.restore(snapshot).unwrap();
        let s = fresh.transition("REQ-10", TransitionAction::Approve).unwrap();
        assert_eq!(stage_of(&s).as_deref(), Some("L3"));
    }

    #[test]
    fn test_concurrent_transitions_do_not_lose_updates() {
        let engine = Arc::new(WorkflowEngine::new(
            StageConfiguration::new((0..64).map(|i| format!("S{i}"))).unwrap(),
            EngineOptions::default(),
        ));
        engine.create_request(WorkflowRequest::new("REQ-11", "Parallel")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for _ in 0..4 {
                        engine.transition("REQ-11", TransitionAction::Approve).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.status("REQ-11").unwrap().stage_index(), Some(32));
    }
}
