//! Registry of miner instances keyed by a 1-based tab index. Mediates
//! create/start/stop/remove and broadcasts per-instance events.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tauri::{AppHandle, Emitter};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::miner_instance::{InstanceEvent, InstanceState, MinerInstance, MinerInstanceConfig};
use crate::platform;

#[derive(Debug, Clone, Default)]
pub struct PartialConfig {
    pub miner_threads: Option<u32>,
    pub cache_mb: Option<u32>,
    pub etherbase: Option<String>,
}

struct Registry {
    instances: HashMap<u32, Arc<MinerInstance>>,
    // Remembers threads/cache/etherbase for a stopped tab across restarts
    // within this session; never persisted to disk.
    config_cache: HashMap<u32, PartialConfig>,
}

pub struct MinerService {
    geth_path: Mutex<PathBuf>,
    registry: Mutex<Registry>,
    // Plain std Mutex: set once during setup, read (cheaply, synchronously)
    // whenever a new instance is wired up for event forwarding.
    app_handle: std::sync::Mutex<Option<AppHandle>>,
}

impl MinerService {
    pub fn new(default_geth_path: PathBuf) -> Arc<Self> {
        Arc::new(MinerService {
            geth_path: Mutex::new(default_geth_path),
            registry: Mutex::new(Registry {
                instances: HashMap::new(),
                config_cache: HashMap::new(),
            }),
            app_handle: std::sync::Mutex::new(None),
        })
    }

    pub async fn set_geth_path(&self, path: PathBuf) {
        *self.geth_path.lock().await = path;
    }

    /// Lets the app wire up event forwarding once the Tauri runtime is up.
    /// Instances created after this call get their `miner:log`/`miner:state`
    /// events forwarded automatically; ones created before do not.
    pub fn set_app_handle(&self, handle: AppHandle) {
        *self.app_handle.lock().unwrap() = Some(handle);
    }

    /// Allocates the next index (max existing + 1, or 1); indices are never
    /// recycled within a session. Creates but does not start the instance.
    pub async fn add_tab(&self, config: Option<PartialConfig>) -> u32 {
        let mut registry = self.registry.lock().await;
        let next_index = registry.instances.keys().copied().max().unwrap_or(0) + 1;
        drop(registry);

        self.ensure_instance(next_index, config).await;
        next_index
    }

    async fn ensure_instance(&self, index: u32, overrides: Option<PartialConfig>) -> Arc<MinerInstance> {
        let mut registry = self.registry.lock().await;

        if let Some(existing) = registry.instances.get(&index) {
            return Arc::clone(existing);
        }

        let geth_path = self.geth_path.lock().await.clone();
        let mut config = MinerInstanceConfig::new(index, geth_path);

        let cached = registry.config_cache.get(&index).cloned().unwrap_or_default();
        let merged = merge_partial(cached, overrides.unwrap_or_default());
        apply_partial(&mut config, &merged);
        registry.config_cache.insert(index, merged);

        let instance = MinerInstance::new(config);
        registry.instances.insert(index, Arc::clone(&instance));
        drop(registry);

        self.spawn_event_forwarder(&instance);
        instance
    }

    /// Drains the instance's broadcast channel for its lifetime, forwarding
    /// `Log`/`State` events as the `miner:log`/`miner:state` Tauri events
    /// spec's event-stream surface calls for. A no-op before the app handle
    /// is wired up (e.g. in tests).
    fn spawn_event_forwarder(&self, instance: &Arc<MinerInstance>) {
        let Some(app_handle) = self.app_handle.lock().unwrap().clone() else {
            return;
        };

        let mut events = instance.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(InstanceEvent::Log(line)) => {
                        let _ = app_handle.emit("miner:log", &line);
                    }
                    Ok(InstanceEvent::State(delta)) => {
                        let _ = app_handle.emit("miner:state", &delta);
                    }
                    Ok(InstanceEvent::Exited(_)) => {}
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Stops the instance (if running) and forgets it.
    pub async fn remove_tab(&self, index: u32) -> Result<()> {
        let instance = {
            let mut registry = self.registry.lock().await;
            registry.instances.remove(&index)
        };

        if let Some(instance) = instance {
            instance.stop().await?;
        }
        Ok(())
    }

    /// Creates the instance if necessary, merges config, starts it.
    pub async fn start_miner(&self, index: u32, config: Option<PartialConfig>) -> Result<()> {
        let instance = self.ensure_instance(index, config).await;
        instance.start().await
    }

    /// Idempotent stop.
    pub async fn stop_miner(&self, index: u32) -> Result<()> {
        let instance = {
            let registry = self.registry.lock().await;
            registry.instances.get(&index).cloned()
        };
        match instance {
            Some(instance) => instance.stop().await,
            None => Ok(()),
        }
    }

    pub async fn get_miner_state(&self, index: u32) -> Option<InstanceState> {
        let instance = {
            let registry = self.registry.lock().await;
            registry.instances.get(&index).cloned()
        }?;
        Some(instance.state().await)
    }

    pub async fn get_tab_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.registry.lock().await.instances.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub async fn get_rpc_url(&self, index: u32) -> Option<String> {
        let instance = {
            let registry = self.registry.lock().await;
            registry.instances.get(&index).cloned()
        }?;
        Some(instance.rpc_url().await)
    }

    pub async fn get_running_miner_indices(&self) -> Vec<u32> {
        let instances: Vec<(u32, Arc<MinerInstance>)> = {
            let registry = self.registry.lock().await;
            registry
                .instances
                .iter()
                .map(|(i, inst)| (*i, Arc::clone(inst)))
                .collect()
        };

        let mut running = Vec::new();
        for (index, instance) in instances {
            if instance.is_running().await {
                running.push(index);
            }
        }
        running.sort_unstable();
        running
    }

    /// Stops every instance. Failures for one instance never cancel the
    /// remaining stops.
    pub async fn stop_all(&self) {
        let instances: Vec<Arc<MinerInstance>> = {
            let registry = self.registry.lock().await;
            registry.instances.values().cloned().collect()
        };

        for instance in instances {
            if let Err(e) = instance.stop().await {
                tracing::warn!("failed to stop a miner instance during stop_all: {}", e);
            }
        }
    }

    pub async fn subscribe(&self, index: u32) -> Option<tokio::sync::broadcast::Receiver<InstanceEvent>> {
        let registry = self.registry.lock().await;
        registry.instances.get(&index).map(|i| i.subscribe())
    }

    pub fn default_geth_path() -> PathBuf {
        platform::geth_binary_path()
    }
}

fn merge_partial(cached: PartialConfig, overrides: PartialConfig) -> PartialConfig {
    PartialConfig {
        miner_threads: overrides.miner_threads.or(cached.miner_threads),
        cache_mb: overrides.cache_mb.or(cached.cache_mb),
        etherbase: overrides.etherbase.or(cached.etherbase),
    }
}

fn apply_partial(config: &mut MinerInstanceConfig, partial: &PartialConfig) {
    if let Some(threads) = partial.miner_threads {
        config.miner_threads = threads;
    }
    if let Some(cache) = partial.cache_mb {
        config.cache_mb = cache;
    }
    if partial.etherbase.is_some() {
        config.etherbase = partial.etherbase.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_tab_allocates_sequential_indices() {
        let service = MinerService::new(PathBuf::from("/bin/geth"));
        assert_eq!(service.add_tab(None).await, 1);
        assert_eq!(service.add_tab(None).await, 2);
        assert_eq!(service.add_tab(None).await, 3);
    }

    #[tokio::test]
    async fn indices_are_not_recycled_after_removing_the_max() {
        let service = MinerService::new(PathBuf::from("/bin/geth"));
        service.add_tab(None).await;
        let second = service.add_tab(None).await;
        service.remove_tab(second).await.unwrap();
        assert_eq!(service.add_tab(None).await, 3);
    }

    #[tokio::test]
    async fn get_tab_indices_reflects_registry() {
        let service = MinerService::new(PathBuf::from("/bin/geth"));
        service.add_tab(None).await;
        service.add_tab(None).await;
        assert_eq!(service.get_tab_indices().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn unknown_index_yields_none() {
        let service = MinerService::new(PathBuf::from("/bin/geth"));
        assert!(service.get_miner_state(42).await.is_none());
        assert!(service.get_rpc_url(42).await.is_none());
    }

    #[tokio::test]
    async fn stop_miner_on_unknown_index_is_a_no_op() {
        let service = MinerService::new(PathBuf::from("/bin/geth"));
        service.stop_miner(99).await.unwrap();
    }
}
