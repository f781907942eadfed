use crate::config::Config;
use crate::pipeline::banner;
use crate::types::{BuildOutcome, ExternalCommand, StepOutcome};
use anyhow::{Context, Result};
use log::{debug, error, trace};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Run the configure step and then the build step in the build directory.
///
/// The build step runs even when configure failed; the caller decides what a
/// failed outcome means.
pub async fn build(config: &Config) -> BuildOutcome {
    if let Some(ref sdk) = config.sdk_path {
        debug!("Toolchain inherits PICO_SDK_PATH={}", sdk.display());
    }

    banner("Building files");
    let configure = run_reported(&config.build_dir, &config.configure_command).await;

    banner("Making Binaries");
    let build = run_reported(&config.build_dir, &config.build_command).await;

    BuildOutcome { configure, build }
}

async fn run_reported(dir: &Path, command: &ExternalCommand) -> Option<StepOutcome> {
    match run_step(dir, command, |line| println!("{}", line)).await {
        Ok(outcome) => {
            debug!("`{}` produced {} lines", command, outcome.lines);
            match outcome.exit_code {
                Some(code) => println!("RETURN CODE {}", code),
                None => println!("RETURN CODE terminated by signal"),
            }
            Some(outcome)
        }
        Err(e) => {
            error!("`{}` failed to run: {:#}", command, e);
            println!("[FAIL] Could not run `{}`. Exception: {:#}", command, e);
            None
        }
    }
}

/// Spawn `command` in `dir` and pass each non-blank stdout line, trimmed, to
/// `on_line` as soon as it is read.
///
/// Only stdout is piped, so the lines handed over keep the order the process
/// wrote them. stderr is inherited and reaches the console directly.
pub async fn run_step<F>(
    dir: &Path,
    command: &ExternalCommand,
    mut on_line: F,
) -> Result<StepOutcome>
where
    F: FnMut(&str),
{
    debug!("Running `{}` in {}", command, dir.display());

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn `{}` in {}", command, dir.display()))?;

    let mut lines = 0;
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    // Toolchain output is not guaranteed to be UTF-8.
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    on_line(line);
                    lines += 1;
                }
                Err(e) => {
                    debug!("Stopped reading output of `{}`: {}", command, e);
                    break;
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("Failed to wait for `{}`", command))?;

    trace!("`{}` exited with {}", command, status);

    Ok(StepOutcome {
        exit_code: status.code(),
        lines,
    })
}
