use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::rbac::Identity;
use crate::service::GrcService;

pub mod framework;
pub mod policy;
pub mod risk;
pub mod workflow;

/// JSON printed for a command, plus whether the snapshot needs saving.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub body: Value,
    pub mutated: bool,
}

impl CommandOutput {
    pub fn read<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_value(body)?,
            mutated: false,
        })
    }

    pub fn write<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_value(body)?,
            mutated: true,
        })
    }

    pub fn deleted(kind: &str, id: u64) -> Self {
        Self {
            body: serde_json::json!({ "deleted": kind, "id": id }),
            mutated: true,
        }
    }
}

pub trait Command {
    fn execute(&self, service: &GrcService, identity: &Identity) -> Result<CommandOutput>;
}
