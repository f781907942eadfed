use crate::config::Config;
use crate::error::LoopError;
use crate::types::{CaptureEnd, CaptureSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use log::{info, warn};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};

pub const BAUD_RATE: u32 = 115200;

/// Capture everything the board prints on `port_path` until the port closes.
pub async fn run(config: &Config, port_path: &str) -> Result<CaptureSummary> {
    let port = tokio_serial::new(port_path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(LoopError::from)
        .with_context(|| format!("Failed to open serial port {}", port_path))?;

    info!("Connected to USB port: {} at {} baud", port_path, BAUD_RATE);

    let (log_path, mut log) = open_log(&config.logs_dir, Local::now()).await?;

    println!("[INFO] Logging to {}", log_path.display());

    let (lines, end) = capture(BufReader::new(port), &mut log, |line| println!("{}", line)).await?;

    match end {
        CaptureEnd::Closed => info!("USB connection closed"),
        CaptureEnd::Disconnected(ref reason) => warn!("USB connection lost: {}", reason),
    }

    Ok(CaptureSummary {
        log_path,
        lines,
        end,
    })
}

/// Read lines from `port` until it closes, handing each decoded line to
/// `on_line` and appending it, newline-terminated, to `log`.
///
/// End-of-stream and read errors both mean the port is gone. A line that
/// fails to decode ends capture with an error after `log` has been flushed.
pub async fn capture<R, W, F>(
    mut port: R,
    log: &mut W,
    mut on_line: F,
) -> Result<(usize, CaptureEnd), LoopError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(&str),
{
    let mut raw = Vec::new();
    let mut lines = 0;

    let end = loop {
        raw.clear();
        match port.read_until(b'\n', &mut raw).await {
            Ok(0) => break CaptureEnd::Closed,
            Ok(_) => {
                let line = match decode_line(&raw) {
                    Ok(line) => line,
                    Err(e) => {
                        let _ = log.flush().await;
                        return Err(e);
                    }
                };

                on_line(&line);
                log.write_all(line.as_bytes()).await?;
                log.write_all(b"\n").await?;
                // Capture usually ends with Ctrl-C, so keep the file current.
                log.flush().await?;
                lines += 1;
            }
            Err(e) => break CaptureEnd::Disconnected(e.to_string()),
        }
    };

    log.flush().await?;
    Ok((lines, end))
}

/// Strip the line terminator (`\n` or `\r\n`) from one raw serial line.
pub fn decode_line(raw: &[u8]) -> Result<String, LoopError> {
    let text = std::str::from_utf8(raw).map_err(|e| {
        LoopError::Decode(format!("{} in {:?}", e, String::from_utf8_lossy(raw)))
    })?;

    let text = text.strip_suffix('\n').unwrap_or(text);
    let text = text.strip_suffix('\r').unwrap_or(text);

    Ok(text.to_string())
}

/// `log_<DD>_<Mon>_<YYYY>_<HH>-<MM>.txt`
pub fn log_file_name<Tz>(now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("log_{}.txt", now.format("%d_%b_%Y_%H-%M"))
}

/// Create `logs_dir` if needed and a fresh log file named for `now`,
/// truncating one left by an earlier run in the same minute.
pub async fn open_log<Tz>(logs_dir: &Path, now: DateTime<Tz>) -> Result<(PathBuf, BufWriter<File>)>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    fs::create_dir_all(logs_dir)
        .await
        .with_context(|| format!("Failed to create {}", logs_dir.display()))?;

    let log_path = logs_dir.join(log_file_name(now));
    let file = File::create(&log_path)
        .await
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

    Ok((log_path, BufWriter::new(file)))
}
