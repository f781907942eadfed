use crate::error::LoopError;
use crate::types::ExternalCommand;
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "pico-loop.toml";
pub const SDK_PATH_VAR: &str = "PICO_SDK_PATH";

const DEFAULT_REBOOT_DELAY_SECS: u64 = 2;

#[derive(Parser, Debug, Default)]
#[clap(name = "pico-loop", version, about)]
pub struct Cli {
    /// Path to configuration file (default: <project>/pico-loop.toml)
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Project root containing build/ and logs/ (default: current directory)
    #[clap(long)]
    pub project_dir: Option<PathBuf>,

    /// Override the UF2 mass-storage mount point
    #[clap(long)]
    pub mount_point: Option<PathBuf>,

    /// Use this serial device instead of searching for one
    #[clap(long)]
    pub port: Option<String>,
}

/// On-disk layout of `pico-loop.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub build_dir: Option<PathBuf>,
    pub artifact: Option<PathBuf>,
    pub mount_point: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
    pub configure_command: Option<Vec<String>>,
    pub build_command: Option<Vec<String>>,
    pub device_dir: Option<PathBuf>,
    pub device_prefix: Option<String>,
    pub device_marker: Option<String>,
    pub port: Option<String>,
    pub reboot_delay_secs: Option<u64>,
    pub require_build_success: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub build_dir: PathBuf,
    pub artifact: PathBuf,
    pub mount_point: PathBuf,
    pub logs_dir: PathBuf,
    pub configure_command: ExternalCommand,
    pub build_command: ExternalCommand,
    pub device_dir: PathBuf,
    pub device_prefix: String,
    pub device_marker: String,
    pub port: Option<String>,
    pub reboot_delay: Duration,
    pub require_build_success: bool,
    pub sdk_path: Option<PathBuf>,
}

impl Config {
    /// Fill every missing key with its default. Relative paths are taken from
    /// `project_dir`, except the default artifact which lives under `build_dir`.
    pub fn resolve(
        project_dir: PathBuf,
        file: FileConfig,
        sdk_path: Option<PathBuf>,
    ) -> Result<Self, LoopError> {
        let build_dir = under(&project_dir, file.build_dir.unwrap_or_else(|| "build".into()));
        let artifact = match file.artifact {
            Some(path) => under(&project_dir, path),
            None => build_dir.join("main").join("main.uf2"),
        };
        let logs_dir = under(&project_dir, file.logs_dir.unwrap_or_else(|| "logs".into()));
        let mount_point = under(&project_dir, file.mount_point.unwrap_or_else(default_mount_point));
        let device_dir = under(&project_dir, file.device_dir.unwrap_or_else(|| "/dev".into()));

        let configure_command = match file.configure_command {
            Some(argv) => ExternalCommand::from_argv("configure_command", argv)?,
            None => ExternalCommand::new("cmake", &[".."]),
        };
        let build_command = match file.build_command {
            Some(argv) => ExternalCommand::from_argv("build_command", argv)?,
            None => ExternalCommand::new("make", &["-j4"]),
        };

        let device_marker = file
            .device_marker
            .unwrap_or_else(|| default_device_marker().to_string());
        if device_marker.is_empty() {
            return Err(LoopError::Config("`device_marker` must not be empty".to_string()));
        }

        Ok(Self {
            build_dir,
            artifact,
            mount_point,
            logs_dir,
            configure_command,
            build_command,
            device_dir,
            device_prefix: file
                .device_prefix
                .unwrap_or_else(|| default_device_prefix().to_string()),
            device_marker,
            port: file.port,
            reboot_delay: Duration::from_secs(
                file.reboot_delay_secs.unwrap_or(DEFAULT_REBOOT_DELAY_SECS),
            ),
            require_build_success: file.require_build_success.unwrap_or(false),
            sdk_path,
            project_dir,
        })
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let project_dir = match cli.project_dir {
        Some(ref dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let file = read_file_config(cli.config.as_deref(), &project_dir)?;

    let sdk_path = std::env::var_os(SDK_PATH_VAR).map(PathBuf::from);
    match sdk_path {
        Some(ref path) => info!("{} = {}", SDK_PATH_VAR, path.display()),
        None => warn!("{} is not set; the configure step may fail", SDK_PATH_VAR),
    }

    let mut config = Config::resolve(project_dir, file, sdk_path)?;

    // Apply CLI overrides
    if let Some(ref mount_point) = cli.mount_point {
        config.mount_point = mount_point.clone();
    }

    if let Some(ref port) = cli.port {
        config.port = Some(port.clone());
    }

    Ok(config)
}

/// An explicit `--config` must exist; the default location is optional.
fn read_file_config(explicit: Option<&Path>, project_dir: &Path) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = project_dir.join(CONFIG_FILE_NAME);
            if !path.exists() {
                return Ok(FileConfig::default());
            }
            path
        }
    };

    let config_content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let file: FileConfig = toml::from_str(&config_content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    info!("Loaded configuration from {}", path.display());
    Ok(file)
}

fn under(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn default_mount_point() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/Volumes/RPI-RP2")
    } else {
        let user = std::env::var("USER").unwrap_or_else(|_| "pi".to_string());
        PathBuf::from("/media").join(user).join("RPI-RP2")
    }
}

fn default_device_prefix() -> &'static str {
    if cfg!(target_os = "macos") {
        "tty."
    } else {
        "ttyACM"
    }
}

fn default_device_marker() -> &'static str {
    if cfg!(target_os = "macos") {
        "usbmodem"
    } else {
        "ttyACM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_follow_project_dir() {
        let config =
            Config::resolve(PathBuf::from("/work/pico"), FileConfig::default(), None).unwrap();

        assert_eq!(config.build_dir, PathBuf::from("/work/pico/build"));
        assert_eq!(config.artifact, PathBuf::from("/work/pico/build/main/main.uf2"));
        assert_eq!(config.logs_dir, PathBuf::from("/work/pico/logs"));
        assert_eq!(config.configure_command.to_string(), "cmake ..");
        assert_eq!(config.build_command.to_string(), "make -j4");
        assert_eq!(config.device_dir, PathBuf::from("/dev"));
        assert_eq!(config.reboot_delay, Duration::from_secs(2));
        assert!(!config.require_build_success);
        assert!(config.port.is_none());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            build_dir = "out"
            mount_point = "/mnt/pico"
            build_command = ["ninja"]
            device_marker = "usbserial"
            reboot_delay_secs = 5
            require_build_success = true
            "#,
        )
        .unwrap();

        let config = Config::resolve(PathBuf::from("/work/pico"), file, None).unwrap();

        assert_eq!(config.build_dir, PathBuf::from("/work/pico/out"));
        assert_eq!(config.artifact, PathBuf::from("/work/pico/out/main/main.uf2"));
        assert_eq!(config.mount_point, PathBuf::from("/mnt/pico"));
        assert_eq!(config.build_command, ExternalCommand::new("ninja", &[]));
        assert_eq!(config.device_marker, "usbserial");
        assert_eq!(config.reboot_delay, Duration::from_secs(5));
        assert!(config.require_build_success);
    }

    #[test]
    fn test_relative_paths_follow_project_dir() {
        let file: FileConfig = toml::from_str(
            r#"
            mount_point = "mnt"
            device_dir = "fake-dev"
            artifact = "firmware/app.uf2"
            "#,
        )
        .unwrap();

        let config = Config::resolve(PathBuf::from("/work/pico"), file, None).unwrap();

        assert_eq!(config.mount_point, PathBuf::from("/work/pico/mnt"));
        assert_eq!(config.device_dir, PathBuf::from("/work/pico/fake-dev"));
        assert_eq!(config.artifact, PathBuf::from("/work/pico/firmware/app.uf2"));
    }

    #[test]
    fn test_empty_command_rejected() {
        let file: FileConfig = toml::from_str("configure_command = []").unwrap();
        let err = Config::resolve(PathBuf::from("/work"), file, None).unwrap_err();
        assert!(matches!(err, LoopError::Config(_)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<FileConfig>("baud_rate = 9600").is_err());
    }

    #[test]
    fn test_load_config_reads_project_file_and_cli_overrides() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "port = \"/dev/tty.from-file\"\nlogs_dir = \"capture\"\n",
        )
        .unwrap();

        let cli = Cli {
            project_dir: Some(dir.path().to_path_buf()),
            mount_point: Some(PathBuf::from("/mnt/override")),
            ..Default::default()
        };
        let config = load_config(&cli).unwrap();

        assert_eq!(config.port.as_deref(), Some("/dev/tty.from-file"));
        assert_eq!(config.logs_dir, dir.path().join("capture"));
        assert_eq!(config.mount_point, PathBuf::from("/mnt/override"));

        let cli = Cli {
            project_dir: Some(dir.path().to_path_buf()),
            port: Some("/dev/tty.usbmodem1".to_string()),
            ..Default::default()
        };
        let config = load_config(&cli).unwrap();
        assert_eq!(config.port.as_deref(), Some("/dev/tty.usbmodem1"));
    }

    #[test]
    fn test_missing_default_config_is_fine_but_explicit_is_not() {
        let dir = tempdir().unwrap();

        let cli = Cli {
            project_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(load_config(&cli).is_ok());

        let cli = Cli {
            project_dir: Some(dir.path().to_path_buf()),
            config: Some(dir.path().join("missing.toml")),
            ..Default::default()
        };
        assert!(load_config(&cli).is_err());
    }
}
