use anyhow::Result;
use clap::Subcommand;

use super::{Command, CommandOutput};
use crate::cli::ListArgs;
use crate::rbac::Identity;
use crate::records::{ListQuery, PolicyDraft, PolicyStatus, PolicyUpdate};
use crate::service::GrcService;

#[derive(Subcommand, Debug, Clone)]
pub enum PolicyCommand {
    /// List policies
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    /// Create a policy (admin, risk_manager, compliance_officer)
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Draft, "Under Review" or Approved
        #[arg(long)]
        status: Option<PolicyStatus>,
        #[arg(long = "reviewer")]
        reviewers: Vec<String>,
        #[arg(long)]
        file_url: Option<String>,
    },
    /// Show one policy
    Show { id: u64 },
    /// Change the supplied fields of a policy
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<PolicyStatus>,
        /// Replaces the reviewer list when given; a bare `--reviewer` clears it
        #[arg(long = "reviewer", num_args = 0..)]
        reviewers: Option<Vec<String>>,
        #[arg(long)]
        file_url: Option<String>,
    },
    /// Delete a policy (admin only)
    Delete { id: u64 },
    /// Record the location of the policy document
    Attach { id: u64, file_url: String },
}

impl Command for PolicyCommand {
    fn execute(&self, service: &GrcService, identity: &Identity) -> Result<CommandOutput> {
        match self {
            PolicyCommand::List { list } => {
                CommandOutput::read(&service.list_policies(identity, &ListQuery::from(list)))
            }
            PolicyCommand::Create {
                title,
                description,
                status,
                reviewers,
                file_url,
            } => {
                let draft = PolicyDraft {
                    title: title.clone(),
                    description: description.clone(),
                    status: status.unwrap_or_default(),
                    reviewers: reviewers.clone(),
                    file_url: file_url.clone(),
                };
                CommandOutput::write(&service.create_policy(identity, draft)?)
            }
            PolicyCommand::Show { id } => CommandOutput::read(&service.get_policy(identity, *id)?),
            PolicyCommand::Update {
                id,
                title,
                description,
                status,
                reviewers,
                file_url,
            } => {
                let update = PolicyUpdate {
                    title: title.clone(),
                    description: description.clone(),
                    status: *status,
                    reviewers: reviewers.clone(),
                    file_url: file_url.clone(),
                };
                CommandOutput::write(&service.update_policy(identity, *id, update)?)
            }
            PolicyCommand::Delete { id } => {
                service.delete_policy(identity, *id)?;
                Ok(CommandOutput::deleted("policy", *id))
            }
            PolicyCommand::Attach { id, file_url } => {
                CommandOutput::write(&service.attach_policy_file(identity, *id, file_url)?)
            }
        }
    }
}
