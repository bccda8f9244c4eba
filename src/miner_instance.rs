//! Owns a single child Geth process tied to a fixed miner index: its
//! ports, its stdout/stderr log stream, its PID file, and its periodic RPC
//! health probe.

use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use crate::error::{Result, SupervisorError};
use crate::genesis;
use crate::network::RpcClient;
use crate::platform::{self, PortTriple};

/// Fixed bootnodes for the Mars Credit network.
const BOOTNODES: &[&str] = &[
    "enode://a979fb575495b8d6db44f750317d0f4622bf4c2aa3365d6af7c284339968eef29b69ad0dce72a4d8db5ebb4968de0e3bec910127f134779fbcb0cb6d3331163@52.16.188.185:30303",
    "enode://3f1d12044546b76342d59d4a05532c14b85aa669704bfe1f864fe079415aa2c02d41f1a693f316e3eda72c1b5c55e9c15a7c9a7d/mars1@52.74.57.123:30303",
    "enode://78de8a0916848093c73790ad50da9ce9c2c1e55e37e38dde00f0c6f8be0f6aad9956b3e8944a5f22ab5254cf84a6feb9eae6bf/mars2@18.138.108.67:30303",
    "enode://158f8aab45f6d19c6cbf4a089c2670541a8da11978a2f90dbf6a502a4a4cc82728faac1c6c17b43c14e3112b04d5c24f4/mars3@13.228.42.229:30303",
];

/// Chain id 110110 ("Mars Credit").
const NETWORK_ID: u64 = 110110;

const HEALTH_INTERVAL: Duration = Duration::from_secs(5);
const HEALTH_FAILURE_THRESHOLD: u32 = 3;
const STARTUP_GRACE: Duration = Duration::from_secs(60);
const STOP_GRACE: Duration = Duration::from_secs(5);
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Created,
    Starting,
    Running,
    Stopping,
    Exited,
}

#[derive(Debug, Clone)]
pub struct MinerInstanceConfig {
    pub miner_index: u32,
    pub geth_binary_path: PathBuf,
    pub miner_threads: u32,
    pub cache_mb: u32,
    pub etherbase: Option<String>,
}

impl MinerInstanceConfig {
    pub fn new(miner_index: u32, geth_binary_path: PathBuf) -> Self {
        MinerInstanceConfig {
            miner_index,
            geth_binary_path,
            miner_threads: 1,
            cache_mb: 4096,
            etherbase: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceState {
    pub miner_index: u32,
    pub running: bool,
    pub pid: Option<u32>,
    pub rpc_url: String,
    pub config: MinerInstanceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub miner_index: u32,
    pub stream: LogStream,
    pub text: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDelta {
    pub miner_index: u32,
    pub running: bool,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ExitEvent {
    pub miner_index: u32,
    pub code: Option<i32>,
}

/// Event fanned out by a miner instance's broadcast channel — a tagged
/// variant rather than a string-keyed listener registry.
#[derive(Debug, Clone)]
pub enum InstanceEvent {
    Log(LogLine),
    State(StateDelta),
    Exited(ExitEvent),
}

struct RunningChild {
    child: Child,
    started_at: Instant,
}

pub struct MinerInstance {
    config: Mutex<MinerInstanceConfig>,
    child: Mutex<Option<RunningChild>>,
    events: broadcast::Sender<InstanceEvent>,
    health_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    rpc: RpcClient,
}

impl MinerInstance {
    pub fn new(config: MinerInstanceConfig) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(256);
        Arc::new(MinerInstance {
            config: Mutex::new(config),
            child: Mutex::new(None),
            events: tx,
            health_task: Mutex::new(None),
            rpc: RpcClient::new(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InstanceEvent> {
        self.events.subscribe()
    }

    pub async fn config(&self) -> MinerInstanceConfig {
        self.config.lock().await.clone()
    }

    pub async fn update_config(&self, f: impl FnOnce(&mut MinerInstanceConfig)) {
        let mut guard = self.config.lock().await;
        f(&mut guard);
    }

    pub async fn is_running(&self) -> bool {
        self.child.lock().await.is_some()
    }

    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(|c| c.child.id())
    }

    pub async fn rpc_url(&self) -> String {
        let index = self.config.lock().await.miner_index;
        format!("http://localhost:{}", platform::port_triple(index).http)
    }

    pub async fn state(&self) -> InstanceState {
        let config = self.config().await;
        InstanceState {
            miner_index: config.miner_index,
            running: self.is_running().await,
            pid: self.pid().await,
            rpc_url: self.rpc_url().await,
            config,
        }
    }

    /// Refuses if a process is already owned.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.is_running().await {
            let index = self.config().await.miner_index;
            return Err(SupervisorError::AlreadyRunning(index));
        }

        let config = self.config().await;
        let index = config.miner_index;

        genesis::init_miner_data_dir(&config.geth_binary_path, index, None)?;
        std::fs::create_dir_all(platform::miner_logs_dir(index))?;

        let ports = platform::port_triple(index);
        let data_dir = platform::miner_data_dir(index);
        let keystore_dir = platform::miner_keystore_dir(index);

        let mut cmd = Command::new(&config.geth_binary_path);
        cmd.arg("--datadir")
            .arg(&data_dir)
            .arg("--keystore")
            .arg(&keystore_dir)
            .arg("--syncmode")
            .arg("full")
            .arg("--gcmode")
            .arg("full")
            .arg("--http")
            .arg("--http.addr")
            .arg("localhost")
            .arg("--http.port")
            .arg(ports.http.to_string())
            .arg("--http.api")
            .arg("personal,eth,net,web3,miner,admin,debug")
            .arg("--http.vhosts")
            .arg("*")
            .arg("--http.corsdomain")
            .arg("*")
            .arg("--ws")
            .arg("--ws.addr")
            .arg("localhost")
            .arg("--ws.port")
            .arg(ports.ws.to_string())
            .arg("--ws.api")
            .arg("personal,eth,net,web3,miner,admin,debug")
            .arg("--port")
            .arg(ports.p2p.to_string())
            .arg("--networkid")
            .arg(NETWORK_ID.to_string())
            .arg("--bootnodes")
            .arg(BOOTNODES.join(","))
            .arg("--nat")
            .arg("any")
            .arg("--mine")
            .arg("--miner.threads")
            .arg(config.miner_threads.to_string())
            .arg("--verbosity")
            .arg("3")
            .arg("--maxpeers")
            .arg("50")
            .arg("--cache")
            .arg(config.cache_mb.to_string())
            .arg("--cache.database")
            .arg("75")
            .arg("--cache.trie")
            .arg("25")
            .arg("--cache.gc")
            .arg("25")
            .arg("--cache.snapshot")
            .arg("10")
            .arg("--txpool.globalslots")
            .arg("8192")
            .arg("--txpool.globalqueue")
            .arg("2048")
            .arg("--nousb")
            .arg("--metrics")
            .arg("--allow-insecure-unlock")
            .arg("--snapshot");

        if let Some(addr) = &config.etherbase {
            cmd.arg("--miner.etherbase").arg(addr);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            // Detach from the parent's process group so a supervisor exit
            // mid-operation cannot orphan-kill children.
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;

        let pid = child.id().unwrap_or(0);
        std::fs::write(platform::miner_pid_path(index), pid.to_string())?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        if let Some(stdout) = stdout {
            spawn_log_reader(self.events.clone(), index, LogStream::Stdout, stdout);
        }
        if let Some(stderr) = stderr {
            spawn_log_reader(self.events.clone(), index, LogStream::Stderr, stderr);
        }

        *self.child.lock().await = Some(RunningChild {
            child,
            started_at: Instant::now(),
        });

        let _ = self.events.send(InstanceEvent::State(StateDelta {
            miner_index: index,
            running: true,
            pid: Some(pid),
        }));

        self.spawn_health_checker().await;
        self.spawn_reaper(index);
        info!("miner {} started (pid {})", index, pid);
        Ok(())
    }

    async fn spawn_health_checker(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.health_loop().await;
        });
        *self.health_task.lock().await = Some(handle);
    }

    /// Watches the child independently of the health probe, so a spontaneous
    /// crash is noticed and cleaned up immediately rather than waiting out
    /// the health-failure threshold.
    fn spawn_reaper(self: &Arc<Self>, index: u32) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.reap_loop(index).await;
        });
    }

    async fn reap_loop(self: Arc<Self>, index: u32) {
        loop {
            tokio::time::sleep(REAP_POLL_INTERVAL).await;

            let mut guard = self.child.lock().await;
            let Some(running) = guard.as_mut() else {
                // Already taken by an explicit stop(); nothing left to reap.
                return;
            };

            match running.child.try_wait() {
                Ok(Some(status)) => {
                    guard.take();
                    drop(guard);
                    if let Some(task) = self.health_task.lock().await.take() {
                        task.abort();
                    }
                    warn!("miner {} exited unexpectedly (code {:?})", index, status.code());
                    self.finish_exit(index, status.code()).await;
                    return;
                }
                Ok(None) => {}
                Err(_) => {}
            }
        }
    }

    async fn health_loop(self: Arc<Self>) {
        let start = Instant::now();
        let mut failures = 0u32;

        loop {
            tokio::time::sleep(HEALTH_INTERVAL).await;

            if !self.is_running().await {
                return;
            }

            let url = self.rpc_url().await;
            match self.rpc.net_version(&url).await {
                Ok(_) => failures = 0,
                Err(e) => {
                    failures += 1;
                    warn!("miner {} health probe failed ({}): {}", self.index().await, failures, e);
                }
            }

            let threshold = if start.elapsed() < STARTUP_GRACE {
                HEALTH_FAILURE_THRESHOLD * 2
            } else {
                HEALTH_FAILURE_THRESHOLD
            };

            if failures >= threshold {
                error!(
                    "miner {} exceeded health failure threshold, self-stopping",
                    self.index().await
                );
                let _ = self.stop().await;
                return;
            }
        }
    }

    async fn index(&self) -> u32 {
        self.config.lock().await.miner_index
    }

    /// Idempotent and cooperative: aborts the health checker, sends a
    /// graceful termination signal, then falls back to a forced kill 5 s
    /// later if the child has not exited.
    pub async fn stop(&self) -> Result<()> {
        if let Some(task) = self.health_task.lock().await.take() {
            task.abort();
        }

        let index = self.index().await;

        let mut guard = self.child.lock().await;
        let Some(mut running) = guard.take() else {
            let _ = std::fs::remove_file(platform::miner_pid_path(index));
            return Ok(());
        };
        drop(guard);

        terminate_gracefully(&mut running.child).await;

        let code = match tokio::time::timeout(STOP_GRACE, running.child.wait()).await {
            Ok(Ok(status)) => status.code(),
            _ => {
                let _ = running.child.kill().await;
                let _ = running.child.wait().await;
                None
            }
        };

        self.finish_exit(index, code).await;
        Ok(())
    }

    /// Shared cleanup for both an explicit `stop()` and the reaper noticing
    /// a spontaneous exit: removes the PID file and emits `Exited`/`State`.
    async fn finish_exit(&self, index: u32, code: Option<i32>) {
        let _ = std::fs::remove_file(platform::miner_pid_path(index));
        let _ = self.events.send(InstanceEvent::Exited(ExitEvent {
            miner_index: index,
            code,
        }));
        let _ = self.events.send(InstanceEvent::State(StateDelta {
            miner_index: index,
            running: false,
            pid: None,
        }));
        info!("miner {} stopped (code {:?})", index, code);
    }
}

#[cfg(unix)]
async fn terminate_gracefully(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }
}

/// Windows has no portable graceful-termination signal from Rust's stdlib;
/// best-effort graceful here means an immediate forced kill, followed by
/// the same deadline bookkeeping as Unix so the state machine stays
/// symmetric.
#[cfg(not(unix))]
async fn terminate_gracefully(child: &mut Child) {
    let _ = child.kill().await;
}

fn spawn_log_reader<R>(
    events: broadcast::Sender<InstanceEvent>,
    miner_index: u32,
    stream: LogStream,
    pipe: R,
) where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.is_empty() {
                continue;
            }
            let _ = events.send(InstanceEvent::Log(LogLine {
                miner_index,
                stream: stream.clone(),
                text: line,
                timestamp: chrono::Utc::now().timestamp_millis(),
            }));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_has_documented_defaults() {
        let cfg = MinerInstanceConfig::new(1, PathBuf::from("/bin/geth"));
        assert_eq!(cfg.miner_threads, 1);
        assert_eq!(cfg.cache_mb, 4096);
        assert!(cfg.etherbase.is_none());
    }

    #[tokio::test]
    async fn created_instance_is_not_running() {
        let instance = MinerInstance::new(MinerInstanceConfig::new(7, PathBuf::from("/bin/geth")));
        assert!(!instance.is_running().await);
        assert!(instance.pid().await.is_none());
        assert_eq!(instance.rpc_url().await, "http://localhost:8558");
    }

    #[tokio::test]
    async fn stop_on_created_instance_is_a_no_op() {
        let instance = MinerInstance::new(MinerInstanceConfig::new(1, PathBuf::from("/bin/geth")));
        instance.stop().await.unwrap();
        assert!(!instance.is_running().await);
    }
}
