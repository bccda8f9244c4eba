use serde::Serialize;
use tauri::Emitter;

use crate::binary_manager::{Availability, BinaryManager};

#[derive(Serialize)]
pub struct IsAvailableResponse {
    pub ok: bool,
    pub path: String,
    pub version: Option<String>,
}

impl From<Availability> for IsAvailableResponse {
    fn from(a: Availability) -> Self {
        IsAvailableResponse {
            ok: a.ok,
            path: a.path.to_string_lossy().to_string(),
            version: a.version,
        }
    }
}

#[tauri::command]
pub async fn geth_is_available(path_override: Option<String>) -> Result<IsAvailableResponse, String> {
    let path = path_override.map(std::path::PathBuf::from);
    Ok(BinaryManager::is_available(path.as_deref()).into())
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub path: String,
    pub version: String,
    pub used_fallback: bool,
}

#[tauri::command]
pub async fn geth_download(app: tauri::AppHandle) -> Result<DownloadResponse, String> {
    let outcome = BinaryManager::download(move |progress| {
        let _ = app.emit("geth:downloadProgress", progress);
    })
    .await
    .map_err(|e| e.to_string())?;

    Ok(DownloadResponse {
        path: outcome.path.to_string_lossy().to_string(),
        version: outcome.version,
        used_fallback: outcome.used_fallback,
    })
}

#[tauri::command]
pub async fn geth_get_path() -> Result<String, String> {
    Ok(BinaryManager::get_path().to_string_lossy().to_string())
}
