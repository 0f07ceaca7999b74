use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use grc_platform::cli::commands::{Command, CommandOutput};
use grc_platform::cli::{Cli, Commands};
use grc_platform::{
    init_telemetry, FileSystemPersistence, GrcConfig, GrcService, Identity, OperationTimer,
    StatePersistence,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    GrcConfig::load_env_file()?;
    let config = GrcConfig::load().context("failed to load configuration")?;
    init_telemetry(&config.observability)?;

    tokio::runtime::Runtime::new()?.block_on(async { run(cli, config).await })
}

async fn run(cli: Cli, config: GrcConfig) -> Result<()> {
    let timer = OperationTimer::new("cli_command");
    let identity = cli.identity();
    let state_file = cli
        .state_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.storage.state_file));
    let persistence = FileSystemPersistence::new(state_file);

    let service = GrcService::new(
        config.stage_configuration()?,
        config.engine_options(),
        config.pagination(),
    );
    let seeded = load_state(&service, &persistence, &config).await?;

    let output = execute(&cli.command, &service, &identity)?;
    if output.mutated || seeded {
        persistence.save(&service.snapshot()).await?;
    }

    println!("{}", serde_json::to_string_pretty(&output.body)?);
    service.metrics().log_stats();
    timer.finish();
    Ok(())
}

/// Restore the last snapshot, or seed demo data on first run. Returns true
/// when fresh state was created and should be written out.
async fn load_state(
    service: &GrcService,
    persistence: &FileSystemPersistence,
    config: &GrcConfig,
) -> Result<bool> {
    match persistence
        .load()
        .await
        .with_context(|| format!("failed to read state file {}", persistence.path().display()))?
    {
        Some(persisted) => {
            service.restore(persisted.state)?;
            Ok(false)
        }
        None if config.storage.seed_demo_data => {
            service.seed_demo_data()?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn execute(command: &Commands, service: &GrcService, identity: &Identity) -> Result<CommandOutput> {
    match command {
        Commands::Workflow { command } => command.execute(service, identity),
        Commands::Policy { command } => command.execute(service, identity),
        Commands::Risk { command } => command.execute(service, identity),
        Commands::Framework { command } => command.execute(service, identity),
    }
}
