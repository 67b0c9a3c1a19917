use crate::config::TrainingConfig;
use crate::core::slot::SlotEnv;
use anyhow::{Context, Result};
#[cfg(test)]
use mockall::automock;
use std::process::ExitStatus;

/// The training program as an injected collaborator: no arguments in,
/// exit status out. Nothing here interprets what it does.
#[cfg_attr(test, automock)]
pub trait EntryPoint {
    fn run(&self, slot: &SlotEnv) -> Result<ExitStatus>;
}

/// Production entry point: a foreground child process whose stdout and
/// stderr pass straight through to the scheduler's streamed capture.
pub struct ProcessEntryPoint {
    program: String,
    args: Vec<String>,
}

impl ProcessEntryPoint {
    pub fn new(training: &TrainingConfig) -> Self {
        Self {
            program: training.program.clone(),
            args: training.args.clone(),
        }
    }
}

impl EntryPoint for ProcessEntryPoint {
    fn run(&self, slot: &SlotEnv) -> Result<ExitStatus> {
        tracing::info!(
            program = %self.program,
            env = slot.active_env(),
            "launching training entry point"
        );
        std::process::Command::new(&self.program)
            .args(&self.args)
            .current_dir(&slot.workdir)
            .envs(slot.to_env()?)
            .status()
            .with_context(|| format!("Failed to launch training entry point `{}`", self.program))
    }
}
