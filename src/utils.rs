use anyhow::{anyhow, Context, Result};
use clap::builder::{
    styling::{AnsiColor, Effects},
    Styles,
};

/// Parse a resource size string into megabytes.
///
/// Supported formats:
/// - `"16GB"`, `"16G"` — gigabytes (converted to MB)
/// - `"512MB"`, `"512M"` — megabytes
/// - `"100"` — megabytes (default unit)
///
/// # Examples
///
/// ```
/// use gridrun::utils::parse_size_mb;
///
/// assert_eq!(parse_size_mb("100").unwrap(), 100);
/// assert_eq!(parse_size_mb("512MB").unwrap(), 512);
/// assert_eq!(parse_size_mb("16GB").unwrap(), 16384);
/// assert_eq!(parse_size_mb("2g").unwrap(), 2048);
/// ```
pub fn parse_size_mb(size_str: &str) -> Result<u64> {
    let size_str = size_str.trim();

    if size_str.is_empty() {
        return Err(anyhow!("Size cannot be empty"));
    }

    let upper = size_str.to_ascii_uppercase();

    if let Some(value) = upper.strip_suffix("GB").or_else(|| upper.strip_suffix('G')) {
        let value = value
            .trim()
            .parse::<u64>()
            .context("Invalid size value in GB format")?;
        Ok(value * 1024)
    } else if let Some(value) = upper.strip_suffix("MB").or_else(|| upper.strip_suffix('M')) {
        value
            .trim()
            .parse::<u64>()
            .context("Invalid size value in MB format")
    } else {
        upper
            .parse::<u64>()
            .context("Invalid size format. Expected formats: 16GB, 512MB, or 100 (MB)")
    }
}

/// Format a size in MB for a submit description (e.g. `"16GB"`, `"512MB"`).
///
/// Whole gigabytes render with the GB suffix, everything else in MB.
///
/// # Examples
///
/// ```
/// use gridrun::utils::format_size_mb;
///
/// assert_eq!(format_size_mb(100), "100MB");
/// assert_eq!(format_size_mb(1024), "1GB");
/// assert_eq!(format_size_mb(16384), "16GB");
/// assert_eq!(format_size_mb(2560), "2560MB");
/// ```
pub fn format_size_mb(size_mb: u64) -> String {
    if size_mb > 0 && size_mb % 1024 == 0 {
        format!("{}GB", size_mb / 1024)
    } else {
        format!("{}MB", size_mb)
    }
}

pub const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());
