use crate::builder;
use crate::cleaner;
use crate::config::Config;
use crate::deployer;
use crate::error::LoopError;
use crate::log_capture;
use crate::port_locator;
use crate::types::CaptureSummary;
use anyhow::Result;
use log::{error, info, warn};
use tokio::time::sleep;

pub fn banner(title: &str) {
    println!("\n**************** {} ****************", title);
}

/// Clean, build, deploy, then watch the board's serial output.
///
/// Only configuration problems, an undecodable serial line, and (when
/// `require_build_success` is set) a failed build end the run with an error.
pub async fn run(config: &Config) -> Result<Option<CaptureSummary>> {
    banner("Cleaning Build Directory");
    match cleaner::clean_directory(&config.build_dir).await {
        Ok(report) if !report.is_clean() => {
            warn!("{} entries could not be removed", report.failed.len());
        }
        Ok(_) => {}
        Err(e) => {
            error!("Cleaning failed: {:#}", e);
            println!("[ERROR] Failed to clean {}. Reason: {:#}", config.build_dir.display(), e);
        }
    }

    let outcome = builder::build(config).await;
    if !outcome.success() {
        println!("[WARN] Build did not succeed; the deployed image may be stale or missing");
        if config.require_build_success {
            return Err(LoopError::BuildFailed(format!("{:?}", outcome)).into());
        }
    }

    banner("Copying Binaries to RP2040");
    match deployer::deploy(&config.artifact, &config.mount_point).await {
        Ok(_) => println!(
            "[DONE] Copied: {} to {}",
            config.artifact.display(),
            config.mount_point.display()
        ),
        Err(e) => println!(
            "[FAIL] Could not copy {} to {}. Exception: {}",
            config.artifact.display(),
            config.mount_point.display(),
            e
        ),
    }

    banner("Open Serial Monitor");
    // Blind wait for the board to reboot and re-enumerate.
    sleep(config.reboot_delay).await;

    monitor(config).await
}

/// Find the board and capture its output. `None` when no board was found.
pub async fn monitor(config: &Config) -> Result<Option<CaptureSummary>> {
    let port = match port_locator::locate(config).await {
        Ok(port) => port,
        Err(e) => {
            error!("Serial port discovery failed: {:#}", e);
            None
        }
    };

    let Some(port) = port else {
        info!(
            "No device matching '{}' under {}",
            config.device_marker,
            config.device_dir.display()
        );
        println!("Exiting...");
        return Ok(None);
    };

    println!("[INFO] Found device: {}", port);
    let summary = log_capture::run(config, &port).await?;
    println!(
        "[DONE] Captured {} lines to {}",
        summary.lines,
        summary.log_path.display()
    );

    Ok(Some(summary))
}
