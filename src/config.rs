//! Supervisor-wide configuration, persisted under `<home>/.marscredit/config.json`.
//!
//! Distinct from the per-miner config cache held in memory by
//! [`crate::miner_service::MinerService`], which is explicitly session-scoped.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::network::REMOTE_RPC_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorConfig {
    pub geth_binary_override: Option<PathBuf>,
    pub remote_rpc_url: String,
    pub bootstrap_health_check: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            geth_binary_override: None,
            remote_rpc_url: REMOTE_RPC_URL.to_string(),
            bootstrap_health_check: false,
        }
    }
}

impl SupervisorConfig {
    pub fn config_path() -> PathBuf {
        crate::platform::root_dir().join("config.json")
    }

    /// Loads config from disk, falling back to defaults on a missing or
    /// corrupt file. A corrupt file is logged, never a hard failure.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("config at {} is corrupt ({}), using defaults", path.display(), e);
                SupervisorConfig::default()
            }),
            Err(_) => SupervisorConfig::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = SupervisorConfig::default();
        assert!(cfg.geth_binary_override.is_none());
        assert!(!cfg.bootstrap_health_check);
        assert_eq!(cfg.remote_rpc_url, REMOTE_RPC_URL);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut cfg = SupervisorConfig::default();
        cfg.bootstrap_health_check = true;
        cfg.save_to(&path).unwrap();

        let loaded = SupervisorConfig::load_from(&path);
        assert!(loaded.bootstrap_health_check);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let loaded = SupervisorConfig::load_from(&path);
        assert!(!loaded.bootstrap_health_check);
    }
}
