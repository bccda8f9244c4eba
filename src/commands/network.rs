use crate::network::{wei_to_mars, RpcClient, REMOTE_RPC_URL};

#[tauri::command]
pub async fn network_get_balance(rpc_url: Option<String>, address: String) -> Result<String, String> {
    let client = RpcClient::new();
    let wei = client
        .get_balance_prefer_local(rpc_url.as_deref(), &address)
        .await
        .map_err(|e| e.to_string())?;
    wei_to_mars(&wei).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn network_miner_set_etherbase(rpc_url: String, address: String) -> Result<(), String> {
    RpcClient::new()
        .miner_set_etherbase(&rpc_url, &address)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn network_miner_start(rpc_url: String, threads: u32) -> Result<(), String> {
    RpcClient::new()
        .miner_start(&rpc_url, threads)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn network_miner_stop(rpc_url: String) -> Result<(), String> {
    RpcClient::new().miner_stop(&rpc_url).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn network_eth_mining(rpc_url: String) -> Result<bool, String> {
    RpcClient::new().eth_mining(&rpc_url).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn network_eth_hashrate(rpc_url: String) -> Result<u64, String> {
    RpcClient::new().eth_hashrate(&rpc_url).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn network_eth_block_number(rpc_url: String) -> Result<u64, String> {
    RpcClient::new()
        .eth_block_number(&rpc_url)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn network_eth_syncing(rpc_url: String) -> Result<serde_json::Value, String> {
    RpcClient::new().eth_syncing(&rpc_url).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn network_net_peer_count(rpc_url: String) -> Result<u64, String> {
    RpcClient::new()
        .net_peer_count(&rpc_url)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn network_get_remote_rpc_url() -> Result<String, String> {
    Ok(REMOTE_RPC_URL.to_string())
}