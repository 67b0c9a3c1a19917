use crate::cli::CheckArgs;
use anyhow::{Context, Result};
use gridrun::core::descriptor::Descriptor;
use gridrun::core::envspec::EnvSpec;
use gridrun::utils::format_size_mb;
use std::path::Path;

pub(crate) fn handle_check(args: CheckArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let descriptor = Descriptor::parse(&content)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    if !descriptor.batch_name.is_empty() {
        println!("batch:        {}", descriptor.batch_name);
    }
    println!("universe:     {}", descriptor.universe);
    match &descriptor.arguments {
        Some(arguments) => println!("executable:   {} {arguments}", descriptor.executable),
        None => println!("executable:   {}", descriptor.executable),
    }
    if let Some(requirements) = descriptor.merged_requirements() {
        println!("requirements: {requirements}");
    }
    println!(
        "resources:    {} cpu, {} memory, {} disk, {} gpu",
        descriptor.request_cpus,
        format_size_mb(descriptor.request_memory_mb),
        format_size_mb(descriptor.request_disk_mb),
        descriptor.request_gpus
    );
    println!(
        "transfers:    {} input file(s)",
        descriptor.transfer_input_files.len()
    );
    println!("queue:        {} instance(s)", descriptor.queue);

    // If an environment spec is among the staged inputs, validate it too.
    let dir = args.file.parent().unwrap_or_else(|| Path::new("."));
    for input in &descriptor.transfer_input_files {
        let is_spec = input
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if !is_spec {
            continue;
        }
        let path = dir.join(input);
        if path.exists() {
            let spec = EnvSpec::load(&path)?;
            println!(
                "environment:  {} ({} dependencies)",
                spec.name,
                spec.dependency_count()
            );
        } else {
            tracing::warn!(
                file = %input.display(),
                "environment spec is staged by the descriptor but missing locally"
            );
        }
    }

    Ok(())
}
