//! Role-gated façade over the workflow engine and the GRC record stores.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::observability::WorkflowMetrics;
use crate::rbac::{require_roles, roles, AccessError, Identity};
use crate::records::{
    ComplianceStore, ControlMappings, Framework, FrameworkDraft, FrameworkUpdate, ListQuery, Page,
    Pagination, Policy, PolicyDraft, PolicyStatus, PolicyStore, PolicyUpdate, RecordError, Risk,
    RiskDraft, RiskStore, RiskUpdate, Table,
};
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::workflows::{
    EngineOptions, StageConfiguration, TransitionAction, WorkflowEngine, WorkflowError,
    WorkflowRequest, WorkflowSnapshot, WorkflowStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Everything the platform holds in memory, including id sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSnapshot {
    pub workflow: WorkflowSnapshot,
    pub policies: Table<Policy>,
    pub risks: Table<Risk>,
    pub frameworks: Table<Framework>,
}

pub struct GrcService {
    engine: WorkflowEngine,
    policies: PolicyStore,
    risks: RiskStore,
    compliance: ComplianceStore,
}

impl Default for GrcService {
    fn default() -> Self {
        Self::new(
            StageConfiguration::default(),
            EngineOptions::default(),
            Pagination::default(),
        )
    }
}

impl GrcService {
    pub fn new(stages: StageConfiguration, options: EngineOptions, pagination: Pagination) -> Self {
        Self {
            engine: WorkflowEngine::new(stages, options),
            policies: PolicyStore::new(pagination),
            risks: RiskStore::new(pagination),
            compliance: ComplianceStore::new(pagination),
        }
    }

    pub fn metrics(&self) -> &WorkflowMetrics {
        self.engine.metrics()
    }

    // Workflow

    pub fn workflow_configuration(&self, _identity: &Identity) -> StageConfiguration {
        self.engine.get_configuration()
    }

    pub fn set_workflow_configuration(
        &self,
        identity: &Identity,
        labels: Vec<String>,
    ) -> Result<StageConfiguration, ServiceError> {
        let _span =
            create_workflow_span("set_configuration", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::ADMIN_ONLY, "set workflow configuration")?;
        let stages = StageConfiguration::new(labels)?;
        Ok(self.engine.set_configuration(stages))
    }

    pub fn create_request(
        &self,
        _identity: &Identity,
        request: WorkflowRequest,
    ) -> Result<WorkflowStatus, ServiceError> {
        let correlation_id = generate_correlation_id();
        let _span = create_workflow_span(
            "create_request",
            Some(request.request_id.as_str()),
            &correlation_id,
        )
        .entered();
        Ok(self.engine.create_request(request)?)
    }

    /// The action is parsed before the request is looked up, so a bad action
    /// fails with `InvalidInput` even for an unknown request id.
    pub fn transition(
        &self,
        identity: &Identity,
        request_id: &str,
        action: &str,
    ) -> Result<WorkflowStatus, ServiceError> {
        let correlation_id = generate_correlation_id();
        let _span = create_workflow_span("transition", Some(request_id), &correlation_id).entered();
        let action: TransitionAction = action.parse()?;
        debug!(user_id = %identity.user_id, action = %action, "Transition requested");
        Ok(self.engine.transition(request_id, action)?)
    }

    pub fn request_status(
        &self,
        _identity: &Identity,
        request_id: &str,
    ) -> Result<WorkflowStatus, ServiceError> {
        Ok(self.engine.status(request_id)?)
    }

    pub fn list_requests(&self, _identity: &Identity) -> Vec<WorkflowStatus> {
        self.engine.list()
    }

    // Policies

    pub fn list_policies(&self, _identity: &Identity, query: &ListQuery) -> Page<Policy> {
        self.policies.list(query)
    }

    pub fn create_policy(
        &self,
        identity: &Identity,
        draft: PolicyDraft,
    ) -> Result<Policy, ServiceError> {
        let _span =
            create_workflow_span("create_policy", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::POLICY_EDITORS, "create policies")?;
        Ok(self.policies.create(draft)?)
    }

    pub fn get_policy(&self, _identity: &Identity, id: u64) -> Result<Policy, ServiceError> {
        Ok(self.policies.get(id)?)
    }

    pub fn update_policy(
        &self,
        identity: &Identity,
        id: u64,
        update: PolicyUpdate,
    ) -> Result<Policy, ServiceError> {
        let _span =
            create_workflow_span("update_policy", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::POLICY_EDITORS, "update policies")?;
        Ok(self.policies.update(id, update)?)
    }

    pub fn delete_policy(&self, identity: &Identity, id: u64) -> Result<(), ServiceError> {
        let _span =
            create_workflow_span("delete_policy", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::ADMIN_ONLY, "delete policies")?;
        Ok(self.policies.delete(id)?)
    }

    /// Open to every role, like the other record reads and uploads.
    pub fn attach_policy_file(
        &self,
        identity: &Identity,
        id: u64,
        file_url: &str,
    ) -> Result<Policy, ServiceError> {
        debug!(user_id = %identity.user_id, policy_id = id, "Policy file attached");
        Ok(self.policies.attach_file(id, file_url)?)
    }

    // Risks

    pub fn list_risks(&self, _identity: &Identity, query: &ListQuery) -> Page<Risk> {
        self.risks.list(query)
    }

    pub fn create_risk(&self, identity: &Identity, draft: RiskDraft) -> Result<Risk, ServiceError> {
        let _span = create_workflow_span("create_risk", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::RISK_EDITORS, "create risks")?;
        Ok(self.risks.create(draft)?)
    }

    pub fn get_risk(&self, _identity: &Identity, id: u64) -> Result<Risk, ServiceError> {
        Ok(self.risks.get(id)?)
    }

    pub fn update_risk(
        &self,
        identity: &Identity,
        id: u64,
        update: RiskUpdate,
    ) -> Result<Risk, ServiceError> {
        let _span = create_workflow_span("update_risk", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::RISK_EDITORS, "update risks")?;
        Ok(self.risks.update(id, update)?)
    }

    pub fn delete_risk(&self, identity: &Identity, id: u64) -> Result<(), ServiceError> {
        let _span = create_workflow_span("delete_risk", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::ADMIN_ONLY, "delete risks")?;
        Ok(self.risks.delete(id)?)
    }

    // Compliance frameworks

    pub fn list_frameworks(&self, _identity: &Identity, query: &ListQuery) -> Page<Framework> {
        self.compliance.list(query)
    }

    pub fn create_framework(
        &self,
        identity: &Identity,
        draft: FrameworkDraft,
    ) -> Result<Framework, ServiceError> {
        let _span =
            create_workflow_span("create_framework", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::COMPLIANCE_EDITORS, "create frameworks")?;
        Ok(self.compliance.create(draft)?)
    }

    pub fn get_framework(&self, _identity: &Identity, id: u64) -> Result<Framework, ServiceError> {
        Ok(self.compliance.get(id)?)
    }

    pub fn update_framework(
        &self,
        identity: &Identity,
        id: u64,
        update: FrameworkUpdate,
    ) -> Result<Framework, ServiceError> {
        let _span =
            create_workflow_span("update_framework", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::COMPLIANCE_EDITORS, "update frameworks")?;
        Ok(self.compliance.update(id, update)?)
    }

    pub fn map_framework_controls(
        &self,
        identity: &Identity,
        id: u64,
        mappings: ControlMappings,
    ) -> Result<Framework, ServiceError> {
        let _span =
            create_workflow_span("map_controls", None, &generate_correlation_id()).entered();
        require_roles(identity, roles::COMPLIANCE_EDITORS, "map framework controls")?;
        Ok(self.compliance.map_controls(id, mappings)?)
    }

    // Snapshots

    /// Load the demo records used by a fresh installation.
    pub fn seed_demo_data(&self) -> Result<(), ServiceError> {
        self.policies.create(PolicyDraft {
            description: Some("Baseline controls for protecting company information".to_string()),
            status: PolicyStatus::Approved,
            ..PolicyDraft::new("Information Security Policy")
        })?;
        self.risks.create(RiskDraft {
            description: Some("Unauthorized access to customer records".to_string()),
            ..RiskDraft::new("Data Breach", 5, 3)
        })?;
        self.compliance
            .create(FrameworkDraft::new("ISO 27001").with_controls(["A.5.1", "A.8.2"]))?;

        info!("Demo GRC records seeded");
        Ok(())
    }

    pub fn snapshot(&self) -> PlatformSnapshot {
        PlatformSnapshot {
            workflow: self.engine.snapshot(),
            policies: self.policies.table_snapshot(),
            risks: self.risks.table_snapshot(),
            frameworks: self.compliance.table_snapshot(),
        }
    }

    /// Replace all state with the snapshot. Every part is checked before any
    /// part is applied; on failure nothing changes.
    pub fn restore(&self, snapshot: PlatformSnapshot) -> Result<(), ServiceError> {
        snapshot.policies.validate()?;
        snapshot.risks.validate()?;
        snapshot.frameworks.validate()?;
        self.engine.restore(snapshot.workflow)?;
        self.policies.restore(snapshot.policies)?;
        self.risks.restore(snapshot.risks)?;
        self.compliance.restore(snapshot.frameworks)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Role;
    use crate::workflows::RequestStatus;

    fn as_role(role: Role) -> Identity {
        Identity::new(format!("{role}-user"), role)
    }

    #[test]
    fn test_only_admin_sets_configuration() {
        let service = GrcService::default();
        let labels = vec!["Owner".to_string(), "CISO".to_string()];

        let err = service
            .set_workflow_configuration(&as_role(Role::ComplianceOfficer), labels.clone())
            .unwrap_err();
        assert!(matches!(err, ServiceError::Access(AccessError::Forbidden { .. })));
        assert_eq!(
            service.workflow_configuration(&as_role(Role::Viewer)),
            StageConfiguration::default()
        );

        let stages = service
            .set_workflow_configuration(&as_role(Role::Admin), labels)
            .unwrap();
        assert_eq!(stages.labels(), ["Owner", "CISO"]);
    }

    #[test]
    fn test_admin_cannot_set_invalid_configuration() {
        let service = GrcService::default();
        let err = service
            .set_workflow_configuration(&as_role(Role::Admin), Vec::new())
            .unwrap_err();
        assert!(matches!(err, ServiceError::Workflow(WorkflowError::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_action_is_invalid_even_for_unknown_request() {
        let service = GrcService::default();
        let viewer = as_role(Role::Viewer);
        let err = service.transition(&viewer, "missing", "escalate").unwrap_err();
        assert!(matches!(err, ServiceError::Workflow(WorkflowError::InvalidInput(_))));

        service
            .create_request(&viewer, WorkflowRequest::new("req-1", "Vendor onboarding"))
            .unwrap();
        assert!(service.transition(&viewer, "req-1", "escalate").is_err());
        assert_eq!(service.request_status(&viewer, "req-1").unwrap().stage(), Some("L1"));

        let approved = service.transition(&viewer, "req-1", " APPROVE ").unwrap();
        assert_eq!(approved.stage(), Some("L2"));
        assert_eq!(approved.status(), RequestStatus::Pending);
    }

    #[test]
    fn test_record_role_gates() {
        let service = GrcService::default();
        let auditor = as_role(Role::Auditor);
        let risk_manager = as_role(Role::RiskManager);

        assert!(service.create_policy(&auditor, PolicyDraft::new("Travel Policy")).is_err());
        let policy = service
            .create_policy(&risk_manager, PolicyDraft::new("Travel Policy"))
            .unwrap();
        assert!(service.delete_policy(&risk_manager, policy.id).is_err());
        service.delete_policy(&as_role(Role::Admin), policy.id).unwrap();

        assert!(service
            .create_risk(&as_role(Role::ComplianceOfficer), RiskDraft::new("Insider threat", 4, 2))
            .is_err());
        service
            .create_risk(&risk_manager, RiskDraft::new("Insider threat", 4, 2))
            .unwrap();

        assert!(service
            .create_framework(&risk_manager, FrameworkDraft::new("SOC 2"))
            .is_err());
        service
            .create_framework(&as_role(Role::ComplianceOfficer), FrameworkDraft::new("SOC 2"))
            .unwrap();
    }

    fn tampered(
        snapshot: &PlatformSnapshot,
        edit: impl FnOnce(&mut serde_json::Value),
    ) -> PlatformSnapshot {
        let mut raw = serde_json::to_value(snapshot).unwrap();
        edit(&mut raw);
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_restore_rejects_inconsistent_record_tables() {
        let source = GrcService::default();
        source.seed_demo_data().unwrap();
        source
            .create_request(&as_role(Role::Viewer), WorkflowRequest::new("req-1", "Exception"))
            .unwrap();
        let snapshot = source.snapshot();

        let rewound = tampered(&snapshot, |raw| raw["policies"]["next_id"] = 1.into());
        let out_of_scale = tampered(&snapshot, |raw| {
            raw["risks"]["items"]["1"]["impact"] = 200.into();
            raw["risks"]["items"]["1"]["likelihood"] = 200.into();
        });
        let misfiled = tampered(&snapshot, |raw| raw["frameworks"]["items"]["1"]["id"] = 9.into());

        let target = GrcService::default();
        for broken in [rewound, out_of_scale, misfiled] {
            let err = target.restore(broken).unwrap_err();
            assert!(matches!(err, ServiceError::Record(RecordError::InvalidInput(_))));
        }

        // Nothing from the rejected snapshots was applied.
        assert_eq!(target.snapshot(), GrcService::default().snapshot());

        target.restore(snapshot).unwrap();
        let next = target
            .create_policy(&as_role(Role::Admin), PolicyDraft::new("Backup Policy"))
            .unwrap();
        assert_eq!(next.id, 2);
        assert_eq!(
            target.get_policy(&as_role(Role::Viewer), 1).unwrap().title,
            "Information Security Policy"
        );
    }

    #[test]
    fn test_seed_and_snapshot_round_trip() {
        let service = GrcService::default();
        service.seed_demo_data().unwrap();
        let viewer = as_role(Role::Viewer);
        service
            .create_request(&viewer, WorkflowRequest::new("req-7", "Exception request").at_stage(1))
            .unwrap();

        let snapshot = service.snapshot();
        let restored = GrcService::default();
        restored.restore(snapshot.clone()).unwrap();

        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.get_risk(&viewer, 1).unwrap().score, 15);
        assert_eq!(
            restored.get_framework(&viewer, 1).unwrap().controls,
            vec!["A.5.1", "A.8.2"]
        );
        assert_eq!(
            restored.list_policies(&viewer, &ListQuery::search("security")).items[0].status,
            PolicyStatus::Approved
        );

        // Sequences survive the round trip.
        let next = restored
            .create_policy(&as_role(Role::Admin), PolicyDraft::new("Backup Policy"))
            .unwrap();
        assert_eq!(next.id, 2);
    }
}
