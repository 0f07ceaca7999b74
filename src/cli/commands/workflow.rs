use anyhow::Result;
use clap::Subcommand;

use super::{Command, CommandOutput};
use crate::rbac::Identity;
use crate::service::GrcService;
use crate::workflows::WorkflowRequest;

#[derive(Subcommand, Debug, Clone)]
pub enum WorkflowCommand {
    /// Show or replace the approval stage list
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Open a request at a stage (overwrites an existing request with the same id)
    Create {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        /// Zero-based stage index to start at
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        stage_index: i64,
    },
    /// Move a request forward one stage
    Approve { id: String },
    /// Move a request back one stage
    Reject { id: String },
    /// Apply a named action (approve or reject)
    Transition { id: String, action: String },
    /// Show one request
    Status { id: String },
    /// Show every tracked request
    List,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    Show,
    /// Replace the stage list (admin only)
    Set {
        #[arg(required = true, num_args = 1..)]
        stages: Vec<String>,
    },
}

impl Command for WorkflowCommand {
    fn execute(&self, service: &GrcService, identity: &Identity) -> Result<CommandOutput> {
        match self {
            WorkflowCommand::Config { command: ConfigCommand::Show } => {
                CommandOutput::read(&service.workflow_configuration(identity))
            }
            WorkflowCommand::Config {
                command: ConfigCommand::Set { stages },
            } => {
                let stages = service.set_workflow_configuration(identity, stages.clone())?;
                CommandOutput::write(&stages)
            }
            WorkflowCommand::Create {
                id,
                title,
                stage_index,
            } => {
                let request =
                    WorkflowRequest::new(id.as_str(), title.as_str()).at_stage(*stage_index);
                CommandOutput::write(&service.create_request(identity, request)?)
            }
            WorkflowCommand::Approve { id } => {
                CommandOutput::write(&service.transition(identity, id, "approve")?)
            }
            WorkflowCommand::Reject { id } => {
                CommandOutput::write(&service.transition(identity, id, "reject")?)
            }
            WorkflowCommand::Transition { id, action } => {
                CommandOutput::write(&service.transition(identity, id, action)?)
            }
            WorkflowCommand::Status { id } => {
                CommandOutput::read(&service.request_status(identity, id)?)
            }
            WorkflowCommand::List => CommandOutput::read(&service.list_requests(identity)),
        }
    }
}
