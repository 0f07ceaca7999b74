// GRC Platform Library - policies, risks, compliance frameworks and approval workflows
// This exposes the core components for the CLI and for integration tests

pub mod cli;
pub mod config;
pub mod observability;
pub mod persistence;
pub mod rbac;
pub mod records;
pub mod service;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use config::GrcConfig;
pub use observability::{OperationTimer, WorkflowMetrics, WorkflowStats};
pub use persistence::{FileSystemPersistence, PersistenceError, StatePersistence};
pub use rbac::{AccessError, Identity, Role};
pub use service::{GrcService, PlatformSnapshot, ServiceError};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflows::{
    EngineOptions, RequestStatus, StageConfiguration, TransitionAction, WorkflowEngine,
    WorkflowError, WorkflowRequest, WorkflowStatus,
};
