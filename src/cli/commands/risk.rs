use anyhow::Result;
use clap::Subcommand;

use super::{Command, CommandOutput};
use crate::cli::ListArgs;
use crate::rbac::Identity;
use crate::records::{ListQuery, Risk, RiskDraft, RiskLevel, RiskUpdate};
use crate::service::GrcService;

#[derive(Subcommand, Debug, Clone)]
pub enum RiskCommand {
    /// List risks
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    /// Register a risk (admin, risk_manager)
    Create {
        #[arg(long)]
        title: String,
        /// 1 (negligible) to 5 (severe)
        #[arg(long)]
        impact: u8,
        /// 1 (rare) to 5 (almost certain)
        #[arg(long)]
        likelihood: u8,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        mitigation: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show one risk
    Show { id: u64 },
    /// Change the supplied fields of a risk; the score is recomputed
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        impact: Option<u8>,
        #[arg(long)]
        likelihood: Option<u8>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        mitigation: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Delete a risk (admin only)
    Delete { id: u64 },
}

/// Risk as printed, with its derived level.
#[derive(serde::Serialize)]
struct RiskView<'a> {
    #[serde(flatten)]
    risk: &'a Risk,
    level: RiskLevel,
}

fn view(risk: &Risk) -> RiskView<'_> {
    RiskView {
        risk,
        level: risk.level(),
    }
}

impl Command for RiskCommand {
    fn execute(&self, service: &GrcService, identity: &Identity) -> Result<CommandOutput> {
        match self {
            RiskCommand::List { list } => {
                CommandOutput::read(&service.list_risks(identity, &ListQuery::from(list)))
            }
            RiskCommand::Create {
                title,
                impact,
                likelihood,
                description,
                mitigation,
                owner,
            } => {
                let draft = RiskDraft {
                    description: description.clone(),
                    mitigation: mitigation.clone(),
                    owner: owner.clone(),
                    ..RiskDraft::new(title.as_str(), *impact, *likelihood)
                };
                CommandOutput::write(&view(&service.create_risk(identity, draft)?))
            }
            RiskCommand::Show { id } => {
                CommandOutput::read(&view(&service.get_risk(identity, *id)?))
            }
            RiskCommand::Update {
                id,
                title,
                impact,
                likelihood,
                description,
                mitigation,
                owner,
            } => {
                let update = RiskUpdate {
                    title: title.clone(),
                    description: description.clone(),
                    impact: *impact,
                    likelihood: *likelihood,
                    mitigation: mitigation.clone(),
                    owner: owner.clone(),
                };
                CommandOutput::write(&view(&service.update_risk(identity, *id, update)?))
            }
            RiskCommand::Delete { id } => {
                service.delete_risk(identity, *id)?;
                Ok(CommandOutput::deleted("risk", *id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Role;

    #[test]
    fn test_show_includes_level() {
        let service = GrcService::default();
        service.seed_demo_data().unwrap();
        let output = RiskCommand::Show { id: 1 }
            .execute(&service, &Identity::new("auditor", Role::Auditor))
            .unwrap();
        assert_eq!(output.body["score"], 15);
        assert_eq!(output.body["level"], "High");
        assert!(!output.mutated);
    }
}
