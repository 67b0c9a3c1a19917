use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use gridrun::utils::STYLES;

#[derive(Debug, Parser)]
#[command(
    name = "gridrun",
    author,
    version,
    about = "Bootstraps a disposable training slot and delegates to the training entry point.",
    styles = STYLES
)]
pub struct GridRun {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[arg(long, global = true, help = "Path to the config file")]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Parser)]
pub enum Commands {
    /// Run the full bootstrap sequence, then the training entry point
    Run,
    /// Print the resolved bootstrap plan without executing anything
    Plan,
    /// Generate tab-completion scripts for your shell
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// The shell to generate the completions for
    pub shell: clap_complete::Shell,
}
