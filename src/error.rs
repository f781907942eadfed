use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serial decode error: {0}")]
    Decode(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),
}
