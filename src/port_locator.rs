use crate::config::Config;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;
use tokio::fs;

/// Pick the board's port among `candidates`.
///
/// Several serial devices may be attached at once. Every candidate containing
/// `marker` replaces the previous pick, so the last match in enumeration order
/// wins.
pub fn select_device<S: AsRef<str>>(candidates: &[S], marker: &str) -> Option<String> {
    let mut found = None;

    for candidate in candidates {
        if candidate.as_ref().contains(marker) {
            found = Some(candidate.as_ref().to_string());
        }
    }

    found
}

/// List `device_dir` entries whose name starts with `prefix`, sorted by path.
pub async fn enumerate_candidates(device_dir: &Path, prefix: &str) -> Result<Vec<String>> {
    let mut entries = fs::read_dir(device_dir)
        .await
        .with_context(|| format!("Failed to list {}", device_dir.display()))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let filename = entry.file_name();
        let filename_str = filename.to_string_lossy();

        if filename_str.starts_with(prefix) {
            candidates.push(entry.path().to_string_lossy().into_owned());
        }
    }

    candidates.sort();
    Ok(candidates)
}

/// Resolve the port to capture from: an explicit override, or discovery.
pub async fn locate(config: &Config) -> Result<Option<String>> {
    if let Some(ref port) = config.port {
        info!("Using configured serial port: {}", port);
        return Ok(Some(port.clone()));
    }

    let candidates = enumerate_candidates(&config.device_dir, &config.device_prefix).await?;
    debug!("Serial candidates: {:?}", candidates);

    Ok(select_device(&candidates, &config.device_marker))
}
