use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A conda environment spec file (`environment.yml`).
///
/// The file format is owned by the package manager; this model reads just
/// enough of it to know the environment name for activation and to sanity
/// check the file at submit time. Unknown dependency shapes are preserved.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvSpec {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Dependency {
    /// A plain `package=version` constraint
    Package(String),
    /// A nested block such as `pip:` with its own list
    Group(serde_yaml::Mapping),
}

impl EnvSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read environment spec {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse environment spec {}", path.display()))
    }

    /// Number of declared dependencies, counting nested group entries.
    pub fn dependency_count(&self) -> usize {
        self.dependencies
            .iter()
            .map(|dep| match dep {
                Dependency::Package(_) => 1,
                Dependency::Group(map) => map
                    .iter()
                    .filter_map(|(_, value)| value.as_sequence())
                    .map(|seq| seq.len())
                    .sum::<usize>(),
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = "\
name: distill
channels:
  - pytorch
  - defaults
dependencies:
  - python=3.9
  - pytorch=1.12.1
  - torchvision=0.13.1
  - pip
  - pip:
      - timm==0.6.7
      - torchsummary
";

    #[test]
    fn parses_name_channels_and_dependencies() {
        let spec: EnvSpec = serde_yaml::from_str(SPEC).unwrap();
        assert_eq!(spec.name, "distill");
        assert_eq!(spec.channels, vec!["pytorch", "defaults"]);
        assert_eq!(spec.dependencies.len(), 5);
    }

    #[test]
    fn counts_nested_pip_entries() {
        let spec: EnvSpec = serde_yaml::from_str(SPEC).unwrap();
        // 4 plain entries + 2 inside the pip block
        assert_eq!(spec.dependency_count(), 6);
    }

    #[test]
    fn rejects_spec_without_a_name() {
        let result: Result<EnvSpec, _> = serde_yaml::from_str("channels: [defaults]");
        assert!(result.is_err());
    }

    #[test]
    fn load_reports_the_missing_file() {
        let err = EnvSpec::load(Path::new("/nope/environment.yml")).unwrap_err();
        assert!(err.to_string().contains("environment.yml"));
    }
}
