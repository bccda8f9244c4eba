//! Ensures a runnable Geth binary exists at the resolved path, downloading
//! and extracting a platform-specific archive when absent.

use flate2::read::GzDecoder;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use tar::Archive;
use tracing::{info, warn};

use crate::error::{Result, SupervisorError};
use crate::platform::{self, PlatformKey};

/// Archive kind inferred from the download URL's extension.
enum ArchiveKind {
    TarGz,
    Zip,
}

/// One entry of the fixed platform → archive-URL table.
struct Release {
    url: &'static str,
    kind: ArchiveKind,
}

fn release_table(key: PlatformKey) -> Release {
    match key {
        PlatformKey::LinuxX64 => Release {
            url: "https://geth.marscredit.network/releases/v1.0.0/geth-linux-amd64.tar.gz",
            kind: ArchiveKind::TarGz,
        },
        PlatformKey::LinuxArm64 => Release {
            url: "https://geth.marscredit.network/releases/v1.0.0/geth-linux-arm64.tar.gz",
            kind: ArchiveKind::TarGz,
        },
        PlatformKey::DarwinX64 => Release {
            url: "https://geth.marscredit.network/releases/v1.0.0/geth-darwin-amd64.tar.gz",
            kind: ArchiveKind::TarGz,
        },
        // No native darwin-arm64 build; falls back to the x64 build under
        // Rosetta, same as darwin-x64's entry. Recorded via the `fallback`
        // flag on the returned DownloadOutcome.
        PlatformKey::DarwinArm64 => Release {
            url: "https://geth.marscredit.network/releases/v1.0.0/geth-darwin-amd64.tar.gz",
            kind: ArchiveKind::TarGz,
        },
        PlatformKey::Win32X64 => Release {
            url: "https://geth.marscredit.network/releases/v1.0.0/geth-windows-amd64.zip",
            kind: ArchiveKind::Zip,
        },
        PlatformKey::Win32Arm64 => Release {
            url: "https://geth.marscredit.network/releases/v1.0.0/geth-windows-arm64.zip",
            kind: ArchiveKind::Zip,
        },
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub percent: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub ok: bool,
    pub path: PathBuf,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub version: String,
    /// Set when the current platform had no native build and a compatible
    /// fallback was used instead (e.g. darwin-arm64 -> darwin-x64).
    pub used_fallback: bool,
}

pub struct BinaryManager;

impl BinaryManager {
    /// `ok=true` only when the file exists *and* `geth version` runs and
    /// parses to a version string.
    pub fn is_available(path_override: Option<&Path>) -> Availability {
        let path = path_override
            .map(Path::to_path_buf)
            .unwrap_or_else(platform::geth_binary_path);

        if !path.exists() {
            return Availability {
                ok: false,
                path,
                version: None,
            };
        }

        match Self::probe_version(&path) {
            Ok(version) => Availability {
                ok: true,
                path,
                version: Some(version),
            },
            Err(_) => Availability {
                ok: false,
                path,
                version: None,
            },
        }
    }

    pub fn get_path() -> PathBuf {
        platform::geth_binary_path()
    }

    fn probe_version(path: &Path) -> Result<String> {
        let output = Command::new(path)
            .arg("version")
            .output()
            .map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(SupervisorError::SpawnFailed(
                "geth version exited non-zero".into(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| SupervisorError::SpawnFailed("empty geth version output".into()))
    }

    /// Downloads and extracts the Geth archive for the current platform,
    /// reporting progress as it streams, and validates the result by
    /// running `geth version`. Temporary files are always cleaned up.
    pub async fn download<F>(progress: F) -> Result<DownloadOutcome>
    where
        F: Fn(DownloadProgress) + Send + 'static,
    {
        let key = platform::platform_key().ok_or_else(|| SupervisorError::UnsupportedPlatform {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        })?;
        let used_fallback = matches!(key, PlatformKey::DarwinArm64);
        let release = release_table(key);

        let bin_dir = platform::geth_binary_path()
            .parent()
            .unwrap_or(Path::new("bin"))
            .to_path_buf();
        std::fs::create_dir_all(&bin_dir)?;

        let tmp_dir = tempfile::tempdir().map_err(SupervisorError::Io)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(0))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;

        let response = client
            .get(release.url)
            .send()
            .await
            .map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SupervisorError::DownloadFailed(format!(
                "status {}",
                response.status()
            )));
        }

        let total = response.content_length().unwrap_or(0);
        let mut downloaded = 0u64;
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SupervisorError::DownloadFailed(e.to_string()))?;
            downloaded += chunk.len() as u64;
            bytes.extend_from_slice(&chunk);
            progress(DownloadProgress {
                downloaded_bytes: downloaded,
                total_bytes: total,
                percent: if total > 0 {
                    (downloaded as f32 / total as f32) * 100.0
                } else {
                    0.0
                },
            });
        }

        let geth_name = platform::geth_binary_name();
        Self::extract(&release.kind, &bytes, tmp_dir.path(), geth_name)?;

        let extracted = tmp_dir.path().join(geth_name);
        let final_path = bin_dir.join(geth_name);
        std::fs::copy(&extracted, &final_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&final_path)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&final_path, perms)?;
        }

        let version = Self::probe_version(&final_path).map_err(|e| {
            warn!("downloaded geth failed version probe: {}", e);
            SupervisorError::DownloadFailed("corrupted download".into())
        })?;

        info!("geth {} installed at {}", version, final_path.display());

        Ok(DownloadOutcome {
            path: final_path,
            version,
            used_fallback,
        })
    }

    fn extract(kind: &ArchiveKind, data: &[u8], out_dir: &Path, binary_name: &str) -> Result<()> {
        match kind {
            ArchiveKind::Zip => {
                let reader = Cursor::new(data);
                let mut archive = zip::ZipArchive::new(reader)
                    .map_err(|e| SupervisorError::DownloadFailed(format!("bad zip: {e}")))?;

                for i in 0..archive.len() {
                    let mut file = archive
                        .by_index(i)
                        .map_err(|e| SupervisorError::DownloadFailed(format!("bad zip entry: {e}")))?;
                    if file.name().ends_with(binary_name) {
                        let dest = out_dir.join(binary_name);
                        let mut out = std::fs::File::create(&dest)?;
                        std::io::copy(&mut file, &mut out)?;
                        return Ok(());
                    }
                }
                Err(SupervisorError::DownloadFailed(
                    "binary not found in zip archive".into(),
                ))
            }
            ArchiveKind::TarGz => {
                let gz = GzDecoder::new(Cursor::new(data));
                let mut archive = Archive::new(gz);
                for entry in archive
                    .entries()
                    .map_err(|e| SupervisorError::DownloadFailed(format!("bad tar.gz: {e}")))?
                {
                    let mut entry =
                        entry.map_err(|e| SupervisorError::DownloadFailed(format!("bad tar entry: {e}")))?;
                    let path = entry.path().map_err(|e| {
                        SupervisorError::DownloadFailed(format!("bad tar entry path: {e}"))
                    })?;
                    if path.file_name().map(|n| n == binary_name).unwrap_or(false) {
                        let dest = out_dir.join(binary_name);
                        let mut out = std::fs::File::create(&dest)?;
                        std::io::copy(&mut entry, &mut out)?;
                        return Ok(());
                    }
                }
                Err(SupervisorError::DownloadFailed(
                    "binary not found in tar.gz archive".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_available_false_for_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("geth");
        let availability = BinaryManager::is_available(Some(&missing));
        assert!(!availability.ok);
        assert!(availability.version.is_none());
    }

    #[test]
    fn is_available_false_for_non_executable_file() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("geth");
        std::fs::write(&fake, b"not a binary").unwrap();
        let availability = BinaryManager::is_available(Some(&fake));
        assert!(!availability.ok);
    }
}
