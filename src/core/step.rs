use std::path::PathBuf;
use strum::Display;

/// One step of the bootstrap sequence. Paths are relative to the slot
/// working directory until execution resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Step {
    #[strum(to_string = "extract-dataset")]
    ExtractDataset { archive: PathBuf },
    #[strum(to_string = "isolate-home")]
    IsolateHome,
    #[strum(to_string = "fetch-installer")]
    FetchInstaller { url: String, dest: PathBuf },
    #[strum(to_string = "install-runtime")]
    InstallRuntime { installer: PathBuf, prefix: PathBuf },
    #[strum(to_string = "prepend-path")]
    PrependPath { dir: PathBuf },
    #[strum(to_string = "verify-runtime")]
    VerifyRuntime,
    #[strum(to_string = "configure-auto-confirm")]
    ConfigureAutoConfirm,
    #[strum(to_string = "create-env")]
    CreateEnv { spec_file: PathBuf },
    #[strum(to_string = "activate-env")]
    ActivateEnv { spec_file: PathBuf },
    #[strum(to_string = "run-training")]
    RunTraining { program: String, args: Vec<String> },
}

impl Step {
    /// Human-readable action summary for the plan listing.
    pub fn describe(&self) -> String {
        match self {
            Step::ExtractDataset { archive } => format!("tar -xzf {}", archive.display()),
            Step::IsolateHome => "HOME <- slot working directory".to_string(),
            Step::FetchInstaller { url, dest } => format!("GET {url} -> {}", dest.display()),
            Step::InstallRuntime { installer, prefix } => format!(
                "bash {} -b -p {}; rm {}",
                installer.display(),
                prefix.display(),
                installer.display()
            ),
            Step::PrependPath { dir } => format!("PATH <- {}:$PATH", dir.display()),
            Step::VerifyRuntime => "conda --version (resolved through the slot path)".to_string(),
            Step::ConfigureAutoConfirm => "conda config --set always_yes true".to_string(),
            Step::CreateEnv { spec_file } => {
                format!("conda env create -f {}", spec_file.display())
            }
            Step::ActivateEnv { spec_file } => {
                format!("activate the environment declared in {}", spec_file.display())
            }
            Step::RunTraining { program, args } => {
                let mut cmdline = program.clone();
                for arg in args {
                    cmdline.push(' ');
                    cmdline.push_str(arg);
                }
                cmdline
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_are_stable() {
        let step = Step::ExtractDataset {
            archive: PathBuf::from("dataset.tar.gz"),
        };
        assert_eq!(step.to_string(), "extract-dataset");
        assert_eq!(Step::VerifyRuntime.to_string(), "verify-runtime");
    }

    #[test]
    fn describe_shows_the_training_command_line() {
        let step = Step::RunTraining {
            program: "python".to_string(),
            args: vec!["main.py".to_string()],
        };
        assert_eq!(step.describe(), "python main.py");
    }
}
