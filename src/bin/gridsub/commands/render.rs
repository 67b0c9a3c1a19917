use crate::cli::RenderArgs;
use anyhow::{Context, Result};
use gridrun::config::load_config;

pub(crate) fn handle_render(
    config_path: &Option<std::path::PathBuf>,
    args: RenderArgs,
) -> Result<()> {
    let config = load_config(config_path.as_ref())?;
    let rendered = config.descriptor.render();

    match args.output {
        Some(path) => {
            std::fs::write(&path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote submit description to {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
