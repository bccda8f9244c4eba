use serde::Serialize;
use tauri::State;

use crate::miner_instance::InstanceState;
use crate::miner_service::{MinerService, PartialConfig};

#[derive(Serialize)]
pub struct MinerStateResponse {
    pub miner_index: u32,
    pub running: bool,
    pub pid: Option<u32>,
    pub rpc_url: String,
    pub miner_threads: u32,
    pub cache_mb: u32,
    pub etherbase: Option<String>,
}

impl From<InstanceState> for MinerStateResponse {
    fn from(s: InstanceState) -> Self {
        MinerStateResponse {
            miner_index: s.miner_index,
            running: s.running,
            pid: s.pid,
            rpc_url: s.rpc_url,
            miner_threads: s.config.miner_threads,
            cache_mb: s.config.cache_mb,
            etherbase: s.config.etherbase,
        }
    }
}

#[derive(serde::Deserialize, Default)]
pub struct MinerConfigInput {
    pub miner_threads: Option<u32>,
    pub cache_mb: Option<u32>,
    pub etherbase: Option<String>,
}

impl From<MinerConfigInput> for PartialConfig {
    fn from(c: MinerConfigInput) -> Self {
        PartialConfig {
            miner_threads: c.miner_threads,
            cache_mb: c.cache_mb,
            etherbase: c.etherbase,
        }
    }
}

#[tauri::command]
pub async fn miner_add_tab(
    service: State<'_, std::sync::Arc<MinerService>>,
    config: Option<MinerConfigInput>,
) -> Result<u32, String> {
    Ok(service.add_tab(config.map(Into::into)).await)
}

#[tauri::command]
pub async fn miner_remove_tab(
    service: State<'_, std::sync::Arc<MinerService>>,
    index: u32,
) -> Result<(), String> {
    service.remove_tab(index).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn miner_start(
    service: State<'_, std::sync::Arc<MinerService>>,
    index: u32,
    config: Option<MinerConfigInput>,
) -> Result<(), String> {
    service
        .start_miner(index, config.map(Into::into))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn miner_stop(
    service: State<'_, std::sync::Arc<MinerService>>,
    index: u32,
) -> Result<(), String> {
    service.stop_miner(index).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn miner_get_state(
    service: State<'_, std::sync::Arc<MinerService>>,
    index: u32,
) -> Result<Option<MinerStateResponse>, String> {
    Ok(service.get_miner_state(index).await.map(Into::into))
}

#[tauri::command]
pub async fn miner_get_tab_indices(
    service: State<'_, std::sync::Arc<MinerService>>,
) -> Result<Vec<u32>, String> {
    Ok(service.get_tab_indices().await)
}

#[tauri::command]
pub async fn miner_get_rpc_url(
    service: State<'_, std::sync::Arc<MinerService>>,
    index: u32,
) -> Result<Option<String>, String> {
    Ok(service.get_rpc_url(index).await)
}
