use crate::cli::Commands;
use clap::CommandFactory;
use clap_complete::generate;
use std::process::ExitCode;

pub mod plan;
pub mod run;

pub async fn handle_commands(
    config_path: &Option<std::path::PathBuf>,
    command: Commands,
) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Run => run::handle_run(config_path).await,
        Commands::Plan => {
            plan::handle_plan(config_path)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions(args) => {
            let mut cmd = crate::cli::GridRun::command();
            generate(args.shell, &mut cmd, "gridrun", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}
