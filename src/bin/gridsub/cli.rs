use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use gridrun::utils::STYLES;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "gridsub",
    author,
    version,
    about = "Renders and checks submit descriptions for HTCondor-style schedulers.",
    styles = STYLES
)]
pub struct GridSub {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[arg(long, global = true, help = "Path to the config file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Parser)]
pub enum Commands {
    /// Render the configured submit description
    Render(RenderArgs),
    /// Parse a submit file and report what it declares
    Check(CheckArgs),
    /// Generate tab-completion scripts for your shell
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct RenderArgs {
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// The submit file to check
    pub file: PathBuf,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// The shell to generate the completions for
    pub shell: clap_complete::Shell,
}
