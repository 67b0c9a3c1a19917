use anyhow::{ensure, Context, Result};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// File name component of an installer URL.
pub fn installer_file_name(url: &str) -> Result<String> {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let name = rest.rsplit('/').next().unwrap_or_default();
    ensure!(
        rest.contains('/') && !name.is_empty(),
        "Installer URL `{url}` has no file name"
    );
    Ok(name.to_string())
}

/// Download the pinned installer to `dest`. One attempt, no retry; a
/// failed transfer fails the bootstrap.
pub async fn download(url: &str, dest: &Path) -> Result<()> {
    tracing::info!(url, dest = %dest.display(), "downloading installer");
    let mut response = reqwest::get(url)
        .await
        .context("Failed to send installer request")?;
    ensure!(
        response.status().is_success(),
        "Installer download failed with HTTP {}",
        response.status()
    );

    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read installer response")?
    {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;
    }
    file.flush()
        .await
        .with_context(|| format!("Failed to flush {}", dest.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_installer_file_name() {
        let name = installer_file_name(
            "https://repo.anaconda.com/miniconda/Miniconda3-py39_4.12.0-Linux-x86_64.sh",
        )
        .unwrap();
        assert_eq!(name, "Miniconda3-py39_4.12.0-Linux-x86_64.sh");
    }

    #[test]
    fn rejects_urls_without_a_file_name() {
        assert!(installer_file_name("https://repo.anaconda.com/miniconda/").is_err());
        assert!(installer_file_name("https://repo.anaconda.com").is_err());
    }
}
