//! Stateless JSON-RPC-over-HTTP client used by the Miner Instance health
//! probe and by external pollers (balance, hashrate, peer count, sync state).

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, SupervisorError};

/// Fixed remote read-only RPC endpoint, used as a balance-query fallback
/// when no local node is available.
pub const REMOTE_RPC_URL: &str = "https://rpc.marscredit.network";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A single-shot JSON-RPC caller. Holds only a `reqwest::Client`; carries no
/// session state between calls.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
}

impl Default for RpcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcClient {
    pub fn new() -> Self {
        RpcClient {
            http: reqwest::Client::new(),
        }
    }

    /// Issues one JSON-RPC 2.0 call, incrementing the monotonic id counter.
    pub async fn call(&self, url: &str, method: &str, params: Value) -> Result<Value> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SupervisorError::RpcError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SupervisorError::RpcHttpError(response.status().as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SupervisorError::RpcError(e.to_string()))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error")
                .to_string();
            return Err(SupervisorError::RpcError(message));
        }

        Ok(body["result"].clone())
    }

    pub async fn net_version(&self, url: &str) -> Result<String> {
        let result = self.call(url, "net_version", serde_json::json!([])).await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    pub async fn net_peer_count(&self, url: &str) -> Result<u64> {
        let result = self.call(url, "net_peerCount", serde_json::json!([])).await?;
        parse_hex_u64(&result)
    }

    pub async fn eth_syncing(&self, url: &str) -> Result<Value> {
        self.call(url, "eth_syncing", serde_json::json!([])).await
    }

    pub async fn eth_mining(&self, url: &str) -> Result<bool> {
        let result = self.call(url, "eth_mining", serde_json::json!([])).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub async fn eth_hashrate(&self, url: &str) -> Result<u64> {
        let result = self.call(url, "eth_hashrate", serde_json::json!([])).await?;
        parse_hex_u64(&result)
    }

    pub async fn eth_block_number(&self, url: &str) -> Result<u64> {
        let result = self.call(url, "eth_blockNumber", serde_json::json!([])).await?;
        parse_hex_u64(&result)
    }

    pub async fn eth_get_balance(&self, url: &str, address: &str) -> Result<String> {
        let result = self
            .call(url, "eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;
        Ok(result.as_str().unwrap_or("0x0").to_string())
    }

    pub async fn miner_set_etherbase(&self, url: &str, address: &str) -> Result<()> {
        self.call(url, "miner_setEtherbase", serde_json::json!([address]))
            .await
            .map(|_| ())
    }

    pub async fn miner_start(&self, url: &str, threads: u32) -> Result<()> {
        self.call(url, "miner_start", serde_json::json!([threads]))
            .await
            .map(|_| ())
    }

    pub async fn miner_stop(&self, url: &str) -> Result<()> {
        self.call(url, "miner_stop", serde_json::json!([])).await.map(|_| ())
    }

    /// Tries `local_url` first (when given); on any failure, or when
    /// `local_url` is `None`, falls back to the fixed remote endpoint.
    pub async fn get_balance_prefer_local(
        &self,
        local_url: Option<&str>,
        address: &str,
    ) -> Result<String> {
        if let Some(url) = local_url {
            if let Ok(balance) = self.eth_get_balance(url, address).await {
                return Ok(balance);
            }
        }
        self.eth_get_balance(REMOTE_RPC_URL, address).await
    }
}

fn parse_hex_u64(value: &Value) -> Result<u64> {
    let hex = value.as_str().unwrap_or("0x0");
    u64::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|e| SupervisorError::RpcError(format!("malformed hex integer {hex:?}: {e}")))
}

/// Renders an 18-decimal wei hex string as a human-readable MARS amount:
/// at most six fractional digits, trailing zeros trimmed.
pub fn wei_to_mars(hex_wei: &str) -> Result<String> {
    let digits = hex_wei.trim_start_matches("0x");
    let wei = u128::from_str_radix(if digits.is_empty() { "0" } else { digits }, 16)
        .map_err(|e| SupervisorError::RpcError(format!("malformed wei value {hex_wei:?}: {e}")))?;

    const DECIMALS: u128 = 1_000_000_000_000_000_000;
    let whole = wei / DECIMALS;
    let frac = wei % DECIMALS;

    // Keep six fractional digits of the 18-digit remainder, then trim zeros.
    let frac_six = frac / 1_000_000_000_000;
    if frac_six == 0 {
        return Ok(whole.to_string());
    }

    let frac_str = format!("{:06}", frac_six);
    let trimmed = frac_str.trim_end_matches('0');
    Ok(format!("{whole}.{trimmed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wei_to_mars_whole_values() {
        assert_eq!(wei_to_mars("0xde0b6b3a7640000").unwrap(), "1");
        assert_eq!(wei_to_mars("0x16345785d8a0000").unwrap(), "0.1");
    }

    #[test]
    fn wei_to_mars_zero() {
        assert_eq!(wei_to_mars("0x0").unwrap(), "0");
        assert_eq!(wei_to_mars("0x").unwrap(), "0");
    }

    #[test]
    fn parse_hex_u64_roundtrip() {
        let v = serde_json::Value::String("0x2a".to_string());
        assert_eq!(parse_hex_u64(&v).unwrap(), 42);
    }
}
