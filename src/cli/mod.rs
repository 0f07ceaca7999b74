use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::rbac::{Identity, Role};
use crate::records::ListQuery;

pub mod commands;

use commands::framework::FrameworkCommand;
use commands::policy::PolicyCommand;
use commands::risk::RiskCommand;
use commands::workflow::WorkflowCommand;

#[derive(Parser)]
#[command(name = "grc-platform")]
#[command(about = "Governance, risk and compliance records with multi-stage approval workflows")]
#[command(long_about = "Manage policies, the risk register and compliance frameworks, and move \
                       approval requests through configurable review stages. State is kept in a \
                       JSON snapshot between invocations; every command prints JSON.")]
pub struct Cli {
    /// Role the command runs as: admin, risk_manager, compliance_officer, auditor or viewer
    #[arg(long, global = true, default_value = "viewer")]
    pub role: Role,

    /// User id recorded in logs
    #[arg(long, global = true, default_value = "cli-user")]
    pub user: String,

    /// Snapshot file (overrides storage.state_file)
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn identity(&self) -> Identity {
        Identity::new(self.user.clone(), self.role)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Approval stages and tracked requests
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
    /// Policy records
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },
    /// Risk register
    Risk {
        #[command(subcommand)]
        command: RiskCommand,
    },
    /// Compliance frameworks and control mappings
    Framework {
        #[command(subcommand)]
        command: FrameworkCommand,
    },
}

/// Search and paging flags shared by every `list` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Case-insensitive title or name filter
    #[arg(long)]
    pub q: Option<String>,
    #[arg(long, default_value = "0")]
    pub skip: usize,
    #[arg(long)]
    pub limit: Option<usize>,
}

impl From<&ListArgs> for ListQuery {
    fn from(args: &ListArgs) -> Self {
        ListQuery {
            q: args.q.clone(),
            skip: args.skip,
            limit: args.limit,
        }
    }
}
