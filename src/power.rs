//! Power-event collaborator hook (spec §4.6). The platform-specific
//! suspend/resume notification is a UI-layer concern; this module is only
//! the seam it calls into.

use crate::miner_service::MinerService;

/// Snapshots the running indices and stops every instance. The host
/// integration calls this on suspend.
pub async fn on_suspend(service: &MinerService) -> Vec<u32> {
    let running = service.get_running_miner_indices().await;
    service.stop_all().await;
    running
}

/// Restarts each previously-running index. The host integration calls
/// this on resume with the snapshot `on_suspend` returned.
pub async fn on_resume(service: &MinerService, indices: &[u32]) {
    for &index in indices {
        if let Err(e) = service.start_miner(index, None).await {
            tracing::warn!("failed to resume miner {} after wake: {}", index, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn suspend_on_empty_service_returns_empty_snapshot() {
        let service = MinerService::new(PathBuf::from("/bin/geth"));
        let snapshot = on_suspend(&service).await;
        assert!(snapshot.is_empty());
    }
}
