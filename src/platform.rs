//! Host platform identity and the on-disk layout under `<home>/.marscredit`.
//!
//! Pure functions; no I/O. Directories are created lazily by the
//! components that need them (Genesis Initializer, Miner Instance, ...).

use std::path::PathBuf;

/// One of the six platform tags the Binary Manager knows how to fetch a
/// Geth archive for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKey {
    DarwinArm64,
    DarwinX64,
    Win32X64,
    Win32Arm64,
    LinuxX64,
    LinuxArm64,
}

impl PlatformKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKey::DarwinArm64 => "darwin-arm64",
            PlatformKey::DarwinX64 => "darwin-x64",
            PlatformKey::Win32X64 => "win32-x64",
            PlatformKey::Win32Arm64 => "win32-arm64",
            PlatformKey::LinuxX64 => "linux-x64",
            PlatformKey::LinuxArm64 => "linux-arm64",
        }
    }
}

/// Resolves the platform key for the current host from
/// `std::env::consts::{OS, ARCH}`.
pub fn platform_key() -> Option<PlatformKey> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("macos", "aarch64") => Some(PlatformKey::DarwinArm64),
        ("macos", "x86_64") => Some(PlatformKey::DarwinX64),
        ("windows", "x86_64") => Some(PlatformKey::Win32X64),
        ("windows", "aarch64") => Some(PlatformKey::Win32Arm64),
        ("linux", "x86_64") => Some(PlatformKey::LinuxX64),
        ("linux", "aarch64") => Some(PlatformKey::LinuxArm64),
        _ => None,
    }
}

/// Root directory for all supervisor state: `<home>/.marscredit`.
pub fn root_dir() -> PathBuf {
    let home = directories::BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".marscredit")
}

/// Filename of the geth executable for the current host.
pub fn geth_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "geth.exe"
    } else {
        "geth"
    }
}

/// `bin/geth[.exe]`
pub fn geth_binary_path() -> PathBuf {
    root_dir().join("bin").join(geth_binary_name())
}

/// `miners/<i>/`
pub fn miner_data_dir(index: u32) -> PathBuf {
    root_dir().join("miners").join(index.to_string())
}

/// `miners/<i>/keystore/`
pub fn miner_keystore_dir(index: u32) -> PathBuf {
    miner_data_dir(index).join("keystore")
}

/// `miners/<i>/logs/`
pub fn miner_logs_dir(index: u32) -> PathBuf {
    miner_data_dir(index).join("logs")
}

/// `miners/<i>/geth.pid`
pub fn miner_pid_path(index: u32) -> PathBuf {
    miner_data_dir(index).join("geth.pid")
}

/// `miners/<i>/geth/chaindata/` — presence means chain data is initialized.
pub fn miner_chaindata_dir(index: u32) -> PathBuf {
    miner_data_dir(index).join("geth").join("chaindata")
}

/// `wallet.enc`
pub fn wallet_enc_path() -> PathBuf {
    root_dir().join("wallet.enc")
}

/// `mining_address.txt`
pub fn mining_address_path() -> PathBuf {
    root_dir().join("mining_address.txt")
}

/// `logs/app.log`'s directory, `logs/`.
pub fn logs_dir() -> PathBuf {
    root_dir().join("logs")
}

/// Deterministic port triple for a 1-based miner index.
///
/// `http = 8546 + 2*(i-1)`, `ws = 8547 + 2*(i-1)`, `p2p = 30304 + (i-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortTriple {
    pub http: u16,
    pub ws: u16,
    pub p2p: u16,
}

pub fn port_triple(index: u32) -> PortTriple {
    let offset = (index - 1) as u16;
    PortTriple {
        http: 8546 + 2 * offset,
        ws: 8547 + 2 * offset,
        p2p: 30304 + offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_triple_matches_invariant() {
        assert_eq!(
            port_triple(1),
            PortTriple {
                http: 8546,
                ws: 8547,
                p2p: 30304
            }
        );
        assert_eq!(
            port_triple(2),
            PortTriple {
                http: 8548,
                ws: 8549,
                p2p: 30305
            }
        );
        assert_eq!(
            port_triple(5),
            PortTriple {
                http: 8554,
                ws: 8555,
                p2p: 30308
            }
        );
    }

    #[test]
    fn geth_binary_name_matches_host() {
        let name = geth_binary_name();
        if cfg!(target_os = "windows") {
            assert_eq!(name, "geth.exe");
        } else {
            assert_eq!(name, "geth");
        }
    }

    #[test]
    fn miner_paths_nest_under_data_dir() {
        let dir = miner_data_dir(3);
        assert!(miner_keystore_dir(3).starts_with(&dir));
        assert!(miner_logs_dir(3).starts_with(&dir));
        assert!(miner_pid_path(3).starts_with(&dir));
        assert!(miner_chaindata_dir(3).starts_with(&dir));
    }
}
