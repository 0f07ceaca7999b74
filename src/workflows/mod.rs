// Approval workflow engine: ordered stages, tracked requests, approve/reject transitions

pub mod engine;
pub mod error;
pub mod stages;
pub mod status;
pub mod store;

pub use engine::{EngineOptions, WorkflowEngine, WorkflowSnapshot};
pub use error::WorkflowError;
pub use stages::StageConfiguration;
pub use status::{RequestStatus, TransitionAction, WorkflowRequest, WorkflowStatus};
pub use store::{InMemoryStatusStore, StatusStore};
