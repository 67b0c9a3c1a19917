use anyhow::Result;
use gridrun::config::load_config;
use gridrun::core::bootstrap::Bootstrap;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "STEP")]
    step: String,
    #[tabled(rename = "ACTION")]
    action: String,
}

pub(crate) fn handle_plan(config_path: &Option<std::path::PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_ref())?;
    let steps = Bootstrap::new(config).plan()?;

    let rows: Vec<PlanRow> = steps
        .iter()
        .enumerate()
        .map(|(index, step)| PlanRow {
            index: index + 1,
            step: step.to_string(),
            action: step.describe(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::empty()).to_string();
    println!("{table}");
    Ok(())
}
