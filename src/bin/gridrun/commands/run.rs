use anyhow::{Context, Result};
use gridrun::config::load_config;
use gridrun::core::bootstrap::Bootstrap;
use gridrun::core::entrypoint::ProcessEntryPoint;
use std::process::{ExitCode, ExitStatus};

pub(crate) async fn handle_run(config_path: &Option<std::path::PathBuf>) -> Result<ExitCode> {
    let config = load_config(config_path.as_ref())?;
    let workdir = std::env::current_dir().context("Failed to get current directory")?;

    let entry = ProcessEntryPoint::new(&config.training);
    let bootstrap = Bootstrap::new(config);
    let status = bootstrap.execute(&workdir, &entry).await?;

    if status.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!(%status, "training entry point failed");
        Ok(exit_code_from(status))
    }
}

/// The job's exit code is the training program's; a signal death maps
/// to a plain failure.
fn exit_code_from(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::from(code.clamp(1, 255) as u8),
        None => ExitCode::from(1),
    }
}
