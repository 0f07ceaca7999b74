use anyhow::{anyhow, Result};
use clap::Subcommand;

use super::{Command, CommandOutput};
use crate::cli::ListArgs;
use crate::rbac::Identity;
use crate::records::{ControlMappings, FrameworkDraft, FrameworkUpdate, ListQuery};
use crate::service::GrcService;

#[derive(Subcommand, Debug, Clone)]
pub enum FrameworkCommand {
    /// List frameworks
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    /// Create a framework (admin, compliance_officer)
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "control")]
        controls: Vec<String>,
    },
    /// Show one framework
    Show { id: u64 },
    /// Change the supplied fields of a framework
    Update {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Replaces the control list when given; a bare `--control` clears it
        #[arg(long = "control", num_args = 0..)]
        controls: Option<Vec<String>>,
    },
    /// Map controls to policies, e.g. `map 1 A.5.1=1,2 A.8.2=3`
    Map {
        id: u64,
        #[arg(required = true, num_args = 1.., value_parser = parse_mapping)]
        mappings: Vec<(String, Vec<u64>)>,
    },
}

/// Parse `CONTROL=ID[,ID...]`. An empty id list clears the mapping.
fn parse_mapping(raw: &str) -> Result<(String, Vec<u64>)> {
    let (control, ids) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected CONTROL=POLICY_IDS, got '{raw}'"))?;

    let ids = ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>()
                .map_err(|e| anyhow!("invalid policy id '{id}': {e}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((control.trim().to_string(), ids))
}

impl Command for FrameworkCommand {
    fn execute(&self, service: &GrcService, identity: &Identity) -> Result<CommandOutput> {
        match self {
            FrameworkCommand::List { list } => {
                CommandOutput::read(&service.list_frameworks(identity, &ListQuery::from(list)))
            }
            FrameworkCommand::Create {
                name,
                description,
                controls,
            } => {
                let draft = FrameworkDraft {
                    description: description.clone(),
                    ..FrameworkDraft::new(name.as_str()).with_controls(controls.iter().cloned())
                };
                CommandOutput::write(&service.create_framework(identity, draft)?)
            }
            FrameworkCommand::Show { id } => {
                CommandOutput::read(&service.get_framework(identity, *id)?)
            }
            FrameworkCommand::Update {
                id,
                name,
                description,
                controls,
            } => {
                let update = FrameworkUpdate {
                    name: name.clone(),
                    description: description.clone(),
                    controls: controls.clone(),
                };
                CommandOutput::write(&service.update_framework(identity, *id, update)?)
            }
            FrameworkCommand::Map { id, mappings } => {
                let mappings: ControlMappings = mappings.iter().cloned().collect();
                CommandOutput::write(&service.map_framework_controls(identity, *id, mappings)?)
            }
        }
    }
}
