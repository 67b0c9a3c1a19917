use crate::core::slot::SlotEnv;
use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Lines of stderr kept for error reporting when a tool fails.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug)]
pub struct RunOutcome {
    pub status: ExitStatus,
    pub stderr_tail: Vec<String>,
}

/// Runs external tools inside the slot: working directory fixed, the
/// slot's environment overlay applied, output streamed rather than
/// buffered.
pub struct CommandRunner {
    cwd: PathBuf,
}

impl CommandRunner {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd }
    }

    /// Spawn a tool and stream its output through until it exits.
    /// `Err` means the tool could not be run at all; a non-zero exit is
    /// reported in the outcome.
    pub async fn run<S: AsRef<OsStr>>(
        &self,
        slot: &SlotEnv,
        program: &str,
        args: &[S],
    ) -> Result<RunOutcome> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.cwd)
            .envs(slot.to_env()?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(program, cwd = %self.cwd.display(), "spawning");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn `{program}`"))?;

        let stdout_task = child.stdout.take().map(|mut stdout| {
            tokio::spawn(async move {
                let mut out = tokio::io::stdout();
                let _ = tokio::io::copy(&mut stdout, &mut out).await;
                let _ = out.flush().await;
            })
        });

        // Stream stderr line by line, keeping a short tail for diagnosis.
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("{line}");
                    if tail.len() >= STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>()
            })
        });

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for `{program}`"))?;

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        Ok(RunOutcome {
            status,
            stderr_tail,
        })
    }

    /// Like [`run`](Self::run), but a non-zero exit becomes an error
    /// carrying the last stderr lines.
    pub async fn run_checked<S: AsRef<OsStr>>(
        &self,
        slot: &SlotEnv,
        program: &str,
        args: &[S],
    ) -> Result<()> {
        let outcome = self.run(slot, program, args).await?;
        if outcome.status.success() {
            return Ok(());
        }
        if outcome.stderr_tail.is_empty() {
            bail!("`{program}` exited with {}", outcome.status);
        }
        bail!(
            "`{program}` exited with {}\nlast stderr lines:\n{}",
            outcome.status,
            outcome.stderr_tail.join("\n")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_in(dir: &std::path::Path) -> SlotEnv {
        SlotEnv::isolated(dir)
    }

    #[tokio::test]
    async fn reports_the_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(dir.path().to_path_buf());
        let outcome = runner
            .run(&slot_in(dir.path()), "sh", &["-c", "exit 3"])
            .await
            .unwrap();
        assert_eq!(outcome.status.code(), Some(3));
    }

    #[tokio::test]
    async fn run_checked_carries_the_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(dir.path().to_path_buf());
        let err = runner
            .run_checked(&slot_in(dir.path()), "sh", &["-c", "echo boom >&2; exit 1"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn children_see_the_slot_home() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(dir.path().to_path_buf());
        let check = format!(r#"[ "$HOME" = "{}" ]"#, dir.path().display());
        runner
            .run_checked(&slot_in(dir.path()), "sh", &["-c", check.as_str()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn spawn_failures_name_the_program() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(dir.path().to_path_buf());
        let err = runner
            .run(&slot_in(dir.path()), "definitely-not-a-tool", &[""; 0])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("definitely-not-a-tool"));
    }
}
