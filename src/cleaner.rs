use crate::types::CleanReport;
use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use tokio::fs;

/// Remove every entry directly inside `dir`, keeping `dir` itself.
///
/// Files and symlinks are unlinked (links are never followed), directories are
/// removed recursively. A failed entry is reported and the sweep carries on.
/// A missing `dir` is created so later steps can use it as a working directory.
pub async fn clean_directory(dir: &Path) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    if !fs::try_exists(dir).await.unwrap_or(false) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        println!("[INFO] Created missing directory: {}", dir.display());
        return Ok(report);
    }

    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let path = entry.path();

        match remove_entry(&path).await {
            Ok(()) => {
                println!("[INFO] Deleted: {}", path.display());
                report.deleted.push(path);
            }
            Err(e) => {
                println!("[ERROR] Failed to delete {}. Reason: {}", path.display(), e);
                report.failed.push((path, e.to_string()));
            }
        }
    }

    debug!(
        "Cleaned {}: {} deleted, {} failed",
        dir.display(),
        report.deleted.len(),
        report.failed.len()
    );

    Ok(report)
}

async fn remove_entry(path: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(path).await?;

    if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_removes_files_and_directories() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("CMakeCache.txt"), "cache").unwrap();
        std::fs::create_dir_all(dir.path().join("main/CMakeFiles")).unwrap();
        std::fs::write(dir.path().join("main/CMakeFiles/obj.o"), [0u8; 16]).unwrap();

        let report = clean_directory(dir.path()).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.deleted.len(), 2);
        assert!(dir.path().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_removed_without_touching_target() {
        let outside = tempdir().unwrap();
        let target = outside.path().join("keep");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("file.txt"), "keep me").unwrap();

        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link")).unwrap();

        let report = clean_directory(dir.path()).await.unwrap();

        assert_eq!(report.deleted, vec![dir.path().join("link")]);
        assert!(target.join("file.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_created() {
        let dir = tempdir().unwrap();
        let build = dir.path().join("build");

        let report = clean_directory(&build).await.unwrap();

        assert!(report.deleted.is_empty());
        assert!(build.is_dir());
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempdir().unwrap();
        let report = clean_directory(dir.path()).await.unwrap();
        assert!(report.deleted.is_empty());
        assert!(report.is_clean());
    }
}
