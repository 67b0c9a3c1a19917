use crate::cli::Commands;
use clap::CommandFactory;
use clap_complete::generate;

pub mod check;
pub mod render;

pub fn handle_commands(
    config_path: &Option<std::path::PathBuf>,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Render(args) => render::handle_render(config_path, args),
        Commands::Check(args) => check::handle_check(args),
        Commands::Completions(args) => {
            let mut cmd = crate::cli::GridSub::command();
            generate(args.shell, &mut cmd, "gridsub", &mut std::io::stdout());
            Ok(())
        }
    }
}
