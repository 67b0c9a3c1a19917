pub mod bootstrap;
pub mod descriptor;
pub mod entrypoint;
pub mod envspec;
pub mod slot;
pub mod step;

use std::path::PathBuf;

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to get config directory"))
        .map(|p| p.join("gridrun"))
}
