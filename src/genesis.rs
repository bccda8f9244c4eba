//! Per-instance chain-data initialization from a fixed genesis file.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use crate::error::{Result, SupervisorError};
use crate::platform;

/// Chain id 110110 ("Mars Credit"), Ethash consensus, zero-allocation
/// ledger, standard hard-fork block overrides zeroed. Byte-identical
/// across installs.
pub const GENESIS_JSON: &str = r#"{
  "config": {
    "chainId": 110110,
    "homesteadBlock": 0,
    "eip150Block": 0,
    "eip155Block": 0,
    "eip158Block": 0,
    "byzantiumBlock": 0,
    "constantinopleBlock": 0,
    "petersburgBlock": 0,
    "istanbulBlock": 0,
    "berlinBlock": 0,
    "londonBlock": 0,
    "ethash": {}
  },
  "difficulty": "0x400",
  "gasLimit": "0x1C9C380",
  "alloc": {}
}
"#;

/// Resolves the genesis file from a fixed search order: a packaged
/// resource directory first, then a development-tree fallback. Returns a
/// temp file containing [`GENESIS_JSON`] when neither is present, since the
/// genesis content itself never varies.
fn resolve_genesis_path(genesis_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = genesis_override {
        return Ok(p.to_path_buf());
    }

    let packaged = PathBuf::from("resources").join("genesis.json");
    if packaged.exists() {
        return Ok(packaged);
    }

    let dev_path = PathBuf::from("genesis").join("genesis.json");
    if dev_path.exists() {
        return Ok(dev_path);
    }

    let fallback = platform::root_dir().join("genesis.json");
    std::fs::create_dir_all(platform::root_dir())?;
    std::fs::write(&fallback, GENESIS_JSON)?;
    Ok(fallback)
}

/// Ensures `miners/<i>/geth/chaindata` is initialized. No-op when it
/// already exists — idempotent across restarts so previously synced chain
/// data is always preserved.
pub fn init_miner_data_dir(
    geth_binary_path: &Path,
    miner_index: u32,
    genesis_override: Option<&Path>,
) -> Result<()> {
    if platform::miner_chaindata_dir(miner_index).exists() {
        return Ok(());
    }

    let data_dir = platform::miner_data_dir(miner_index);
    std::fs::create_dir_all(&data_dir)?;
    std::fs::create_dir_all(platform::miner_keystore_dir(miner_index))?;
    std::fs::create_dir_all(platform::miner_logs_dir(miner_index))?;

    let genesis_path = resolve_genesis_path(genesis_override)?;

    let output = Command::new(geth_binary_path)
        .arg("--datadir")
        .arg(&data_dir)
        .arg("init")
        .arg(&genesis_path)
        .output()
        .map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(SupervisorError::GenesisInitFailed {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    info!("miner {} chain data initialized", miner_index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_genesis_path_honors_override() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("custom-genesis.json");
        std::fs::write(&custom, GENESIS_JSON).unwrap();
        let resolved = resolve_genesis_path(Some(&custom)).unwrap();
        assert_eq!(resolved, custom);
    }
}
