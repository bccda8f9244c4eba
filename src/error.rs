//! Error types shared across the supervisor.

use thiserror::Error;

/// Every failure mode a supervisor component can produce.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("geth binary is not available")]
    BinaryUnavailable,

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("unsupported platform: {os}-{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("genesis init failed\nstdout: {stdout}\nstderr: {stderr}")]
    GenesisInitFailed { stdout: String, stderr: String },

    #[error("failed to spawn geth: {0}")]
    SpawnFailed(String),

    #[error("health probe timed out")]
    HealthTimeout,

    #[error("rpc http error: status {0}")]
    RpcHttpError(u16),

    #[error("rpc error: {0}")]
    RpcError(String),

    #[error("invalid address")]
    InvalidAddress,

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("port in use")]
    PortInUse,

    #[error("miner index {0} not found")]
    UnknownMiner(u32),

    #[error("miner {0} is already running")]
    AlreadyRunning(u32),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
