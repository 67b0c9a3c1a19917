use crate::core::descriptor::Descriptor;
use crate::core::get_config_dir;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub env: EnvConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    /// Submit description rendered by `gridsub render`
    #[serde(default)]
    pub descriptor: Descriptor,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatasetConfig {
    /// Archive staged into the slot by the scheduler, extracted before anything else
    #[serde(default = "default_archive")]
    pub archive: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RuntimeConfig {
    /// Installer URL pinned to an exact version string, never "latest"
    #[serde(default = "default_installer_url")]
    pub installer_url: String,
    /// Version string the installer file name must carry
    #[serde(default = "default_installer_version")]
    pub installer_version: String,
    /// Install prefix, relative to the isolated slot home
    #[serde(default = "default_prefix")]
    pub prefix: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EnvConfig {
    /// Declarative environment spec consumed by `conda env create`
    #[serde(default = "default_spec_file")]
    pub spec_file: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TrainingConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_archive() -> PathBuf {
    PathBuf::from("dataset.tar.gz")
}

fn default_installer_url() -> String {
    "https://repo.anaconda.com/miniconda/Miniconda3-py39_4.12.0-Linux-x86_64.sh".to_string()
}

fn default_installer_version() -> String {
    "py39_4.12.0".to_string()
}

fn default_prefix() -> PathBuf {
    PathBuf::from("miniconda3")
}

fn default_spec_file() -> PathBuf {
    PathBuf::from("environment.yml")
}

fn default_program() -> String {
    "python".to_string()
}

fn default_args() -> Vec<String> {
    vec!["main.py".to_string()]
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            archive: default_archive(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            installer_url: default_installer_url(),
            installer_version: default_installer_version(),
            prefix: default_prefix(),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            spec_file: default_spec_file(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
        }
    }
}

pub fn load_config(config_path: Option<&PathBuf>) -> Result<Config, config::ConfigError> {
    let mut config_vec = vec![];

    // User-provided config file
    if let Some(config_path) = config_path {
        if config_path.exists() {
            config_vec.push(config_path.clone());
        } else {
            eprintln!("Warning: Config file {config_path:?} not found.");
        }
    }

    // Default config file
    if let Ok(default_config_path) = get_config_dir().map(|d| d.join("gridrun.toml")) {
        if default_config_path.exists() {
            config_vec.push(default_config_path);
        }
    }

    let settings = config::Config::builder();
    let settings = config_vec.iter().fold(settings, |s, path| {
        s.add_source(config::File::from(path.as_path()))
    });

    settings
        .add_source(
            config::Environment::with_prefix("GRIDRUN")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_the_shipped_bootstrap() {
        let config = Config::default();
        assert!(config
            .runtime
            .installer_url
            .contains(&config.runtime.installer_version));
        assert_eq!(config.dataset.archive, PathBuf::from("dataset.tar.gz"));
        assert_eq!(config.training.program, "python");
        assert_eq!(config.training.args, vec!["main.py".to_string()]);
    }
}
