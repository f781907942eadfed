use crate::error::LoopError;
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Copy `artifact` into the `mount_point` directory under its own file name.
///
/// The mount point must already exist as a directory: when the board is not
/// in bootloader mode the drive is absent and the copy fails.
pub async fn deploy(artifact: &Path, mount_point: &Path) -> Result<PathBuf, LoopError> {
    let file_name = artifact.file_name().ok_or_else(|| {
        LoopError::Config(format!("artifact path has no file name: {}", artifact.display()))
    })?;

    let is_dir = fs::metadata(mount_point)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(LoopError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("mount point {} is not mounted", mount_point.display()),
        )));
    }

    let destination = mount_point.join(file_name);
    let bytes = fs::copy(artifact, &destination).await?;

    // The board reboots as soon as it has received the whole image.
    if let Err(e) = sync_destination(&destination).await {
        warn!("Failed to sync {}: {}", destination.display(), e);
    }

    debug!("Wrote {} bytes to {}", bytes, destination.display());
    Ok(destination)
}

async fn sync_destination(destination: &Path) -> io::Result<()> {
    let file = fs::OpenOptions::new().write(true).open(destination).await?;
    file.sync_all().await
}
