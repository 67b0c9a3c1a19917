use crate::config::Config;
use crate::core::entrypoint::EntryPoint;
use crate::core::envspec::EnvSpec;
use crate::core::slot::SlotEnv;
use crate::core::step::Step;
use crate::fetch;
use crate::runner::CommandRunner;
use anyhow::{ensure, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// The bootstrap sequence for one execution slot: a fixed linear chain
/// with fail-fast semantics. The first failing step aborts the rest and
/// the error names the step.
pub struct Bootstrap {
    config: Config,
}

impl Bootstrap {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The full ordered plan. Pure: no filesystem or network access, so
    /// the same config always yields the same plan.
    pub fn plan(&self) -> Result<Vec<Step>> {
        let runtime = &self.config.runtime;
        let installer = fetch::installer_file_name(&runtime.installer_url)?;
        ensure!(
            installer.contains(&runtime.installer_version),
            "Installer URL `{}` is not pinned to version {}",
            runtime.installer_url,
            runtime.installer_version
        );
        let installer = PathBuf::from(installer);
        let prefix = runtime.prefix.clone();

        Ok(vec![
            Step::ExtractDataset {
                archive: self.config.dataset.archive.clone(),
            },
            Step::IsolateHome,
            Step::FetchInstaller {
                url: runtime.installer_url.clone(),
                dest: installer.clone(),
            },
            Step::InstallRuntime {
                installer,
                prefix: prefix.clone(),
            },
            Step::PrependPath {
                dir: prefix.join("bin"),
            },
            Step::VerifyRuntime,
            Step::ConfigureAutoConfirm,
            Step::CreateEnv {
                spec_file: self.config.env.spec_file.clone(),
            },
            Step::ActivateEnv {
                spec_file: self.config.env.spec_file.clone(),
            },
            Step::RunTraining {
                program: self.config.training.program.clone(),
                args: self.config.training.args.clone(),
            },
        ])
    }

    /// Execute the plan in `workdir` and return the training entry
    /// point's exit status unchanged.
    pub async fn execute(&self, workdir: &Path, entry: &dyn EntryPoint) -> Result<ExitStatus> {
        let plan = self.plan()?;
        let runner = CommandRunner::new(workdir.to_path_buf());
        let mut slot = SlotEnv::isolated(workdir);
        let mut training_status = None;

        for step in &plan {
            tracing::info!(step = %step, "step started");
            self.run_step(step, &runner, &mut slot, entry, &mut training_status)
                .await
                .with_context(|| format!("bootstrap step `{step}` failed"))?;
            tracing::info!(step = %step, "step finished");
        }

        training_status.context("bootstrap plan has no training step")
    }

    async fn run_step(
        &self,
        step: &Step,
        runner: &CommandRunner,
        slot: &mut SlotEnv,
        entry: &dyn EntryPoint,
        training_status: &mut Option<ExitStatus>,
    ) -> Result<()> {
        match step {
            Step::ExtractDataset { archive } => {
                let path = slot.workdir.join(archive);
                ensure!(
                    path.exists(),
                    "dataset archive {} is missing",
                    path.display()
                );
                runner
                    .run_checked(
                        slot,
                        "tar",
                        &[OsString::from("-xzf"), archive.clone().into_os_string()],
                    )
                    .await
            }
            Step::IsolateHome => {
                tracing::info!(home = %slot.home.display(), "HOME pinned to the slot working directory");
                Ok(())
            }
            Step::FetchInstaller { url, dest } => {
                fetch::download(url, &slot.workdir.join(dest)).await
            }
            Step::InstallRuntime { installer, prefix } => {
                let prefix = slot.home.join(prefix);
                runner
                    .run_checked(
                        slot,
                        "bash",
                        &[
                            installer.clone().into_os_string(),
                            OsString::from("-b"),
                            OsString::from("-p"),
                            prefix.into_os_string(),
                        ],
                    )
                    .await?;
                // Reclaim the installer's disk before the env resolve.
                let installer = slot.workdir.join(installer);
                tokio::fs::remove_file(&installer)
                    .await
                    .with_context(|| format!("Failed to remove installer {}", installer.display()))
            }
            Step::PrependPath { dir } => {
                slot.prepend_path(slot.home.join(dir));
                Ok(())
            }
            Step::VerifyRuntime => {
                let conda = slot
                    .which("conda")
                    .context("conda did not resolve on the slot path")?;
                ensure!(
                    conda.starts_with(&slot.home),
                    "conda resolved outside the slot: {}",
                    conda.display()
                );
                runner.run_checked(slot, "conda", &["--version"]).await
            }
            Step::ConfigureAutoConfirm => {
                runner
                    .run_checked(slot, "conda", &["config", "--set", "always_yes", "true"])
                    .await
            }
            Step::CreateEnv { spec_file } => {
                let path = slot.workdir.join(spec_file);
                ensure!(
                    path.exists(),
                    "environment spec {} is missing",
                    path.display()
                );
                runner
                    .run_checked(
                        slot,
                        "conda",
                        &[
                            OsString::from("env"),
                            OsString::from("create"),
                            OsString::from("-f"),
                            spec_file.clone().into_os_string(),
                        ],
                    )
                    .await
            }
            Step::ActivateEnv { spec_file } => {
                let spec = EnvSpec::load(&slot.workdir.join(spec_file))?;
                let env_dir = slot
                    .home
                    .join(&self.config.runtime.prefix)
                    .join("envs")
                    .join(&spec.name);
                slot.activate(&spec.name, env_dir);
                Ok(())
            }
            Step::RunTraining { .. } => {
                // The delegated program's exit status is the job's result,
                // with no reinterpretation; a non-zero exit is not a
                // bootstrap failure.
                let status = entry.run(slot)?;
                *training_status = Some(status);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entrypoint::MockEntryPoint;

    #[test]
    fn plan_is_deterministic_and_ordered() {
        let bootstrap = Bootstrap::new(Config::default());
        let names: Vec<String> = bootstrap
            .plan()
            .unwrap()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "extract-dataset",
                "isolate-home",
                "fetch-installer",
                "install-runtime",
                "prepend-path",
                "verify-runtime",
                "configure-auto-confirm",
                "create-env",
                "activate-env",
                "run-training",
            ]
        );
        assert_eq!(bootstrap.plan().unwrap(), bootstrap.plan().unwrap());
    }

    #[test]
    fn plan_rejects_an_unpinned_installer() {
        let mut config = Config::default();
        config.runtime.installer_url =
            "https://repo.anaconda.com/miniconda/Miniconda3-latest-Linux-x86_64.sh".to_string();
        let err = Bootstrap::new(config).plan().unwrap_err();
        assert!(err.to_string().contains("not pinned"));
    }

    #[tokio::test]
    async fn missing_archive_fails_before_anything_else() {
        let dir = tempfile::tempdir().unwrap();
        let mut entry = MockEntryPoint::new();
        entry.expect_run().times(0);

        let err = Bootstrap::new(Config::default())
            .execute(dir.path(), &entry)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("extract-dataset"));
        // no download, no install: the slot is untouched
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn training_runs_with_the_activated_environment() {
        use std::os::unix::process::ExitStatusExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("environment.yml"),
            "name: distill\ndependencies:\n  - python=3.9\n",
        )
        .unwrap();

        let bootstrap = Bootstrap::new(Config::default());
        let runner = CommandRunner::new(dir.path().to_path_buf());
        let mut slot = SlotEnv::isolated(dir.path());
        let mut status = None;

        let mut entry = MockEntryPoint::new();
        entry
            .expect_run()
            .withf(|slot: &SlotEnv| slot.active_env() == Some("distill"))
            .times(1)
            .returning(|_| Ok(ExitStatus::from_raw(0)));

        bootstrap
            .run_step(
                &Step::ActivateEnv {
                    spec_file: "environment.yml".into(),
                },
                &runner,
                &mut slot,
                &entry,
                &mut status,
            )
            .await
            .unwrap();
        bootstrap
            .run_step(
                &Step::RunTraining {
                    program: "python".to_string(),
                    args: vec!["main.py".to_string()],
                },
                &runner,
                &mut slot,
                &entry,
                &mut status,
            )
            .await
            .unwrap();

        assert!(status.unwrap().success());
    }

    #[tokio::test]
    async fn corrupt_archive_aborts_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dataset.tar.gz"), b"not a tarball").unwrap();
        let mut entry = MockEntryPoint::new();
        entry.expect_run().times(0);

        let err = Bootstrap::new(Config::default())
            .execute(dir.path(), &entry)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("extract-dataset"));
    }
}
