use std::fmt;
use std::path::PathBuf;

use crate::error::LoopError;

/// An external toolchain invocation, e.g. `cmake ..`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Build from a config list where the first element is the program.
    pub fn from_argv(key: &str, argv: Vec<String>) -> Result<Self, LoopError> {
        let mut parts = argv.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| LoopError::Config(format!("`{}` must name a program", key)))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of emptying a directory. Failures never abort the sweep.
#[derive(Debug, Default)]
pub struct CleanReport {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// How one external build process finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub lines: usize,
}

impl StepOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub configure: Option<StepOutcome>,
    pub build: Option<StepOutcome>,
}

impl BuildOutcome {
    /// A step that could not be spawned counts as failed.
    pub fn success(&self) -> bool {
        [self.configure, self.build]
            .iter()
            .all(|step| step.map(|s| s.success()).unwrap_or(false))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEnd {
    /// The port returned end-of-stream.
    Closed,
    /// The port failed a read, usually a physical disconnect or a reset.
    Disconnected(String),
}

#[derive(Debug)]
pub struct CaptureSummary {
    pub log_path: PathBuf,
    pub lines: usize,
    pub end: CaptureEnd,
}
