//! End-to-end miner service lifecycle scenarios, using a fake `geth` shell
//! script in place of a real binary (no real PoW node needed to exercise
//! process supervision).

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use miner_supervisor::miner_service::MinerService;
use serial_test::serial;

/// Writes a fake `geth` executable that handles `init` (exits 0
/// immediately, touching a chaindata marker) and otherwise sleeps,
/// simulating a long-running node that never serves RPC.
fn write_fake_geth(dir: &std::path::Path) -> PathBuf {
    let script_path = dir.join("geth");
    let script = r#"#!/bin/sh
if [ "$2" = "init" ] || [ "$1" = "init" ]; then
    # find --datadir argument
    datadir=""
    prev=""
    for arg in "$@"; do
        if [ "$prev" = "--datadir" ]; then
            datadir="$arg"
        fi
        prev="$arg"
    done
    mkdir -p "$datadir/geth/chaindata"
    exit 0
fi
if [ "$1" = "version" ]; then
    echo "geth version 1.0.0-fake"
    exit 0
fi
trap 'exit 0' TERM
sleep 300 &
wait $!
"#;
    std::fs::write(&script_path, script).unwrap();
    let mut perms = std::fs::metadata(&script_path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script_path, perms).unwrap();
    script_path
}

// HOME is process-wide; #[serial(home_env)] keeps these tests from
// clobbering each other's tempdir-backed root across threads.
fn with_isolated_home<T>(f: impl FnOnce(&std::path::Path) -> T) -> T {
    let home = tempfile::tempdir().unwrap();
    std::env::set_var("HOME", home.path());
    f(home.path())
}

#[tokio::test]
#[serial(home_env)]
async fn fresh_install_one_miner_starts_and_stops() {
    with_isolated_home(|home| async move {
        let geth = write_fake_geth(home);
        let service = MinerService::new(geth);

        let index = service.add_tab(None).await;
        assert_eq!(index, 1);

        service.start_miner(index, None).await.unwrap();
        let state = service.get_miner_state(index).await.unwrap();
        assert!(state.running);
        assert!(state.pid.is_some());
        assert_eq!(state.rpc_url, "http://localhost:8546");

        service.stop_miner(index).await.unwrap();
        let state = service.get_miner_state(index).await.unwrap();
        assert!(!state.running);
        assert!(state.pid.is_none());
        assert!(!miner_supervisor::platform::miner_pid_path(index).exists());
    })
    .await
}

#[tokio::test]
#[serial(home_env)]
async fn two_concurrent_miners_get_distinct_ports_and_dirs() {
    with_isolated_home(|home| async move {
        let geth = write_fake_geth(home);
        let service = MinerService::new(geth);

        let first = service.add_tab(None).await;
        let second = service.add_tab(None).await;
        assert_eq!((first, second), (1, 2));

        service.start_miner(first, None).await.unwrap();
        service.start_miner(second, None).await.unwrap();

        let rpc_one = service.get_rpc_url(first).await.unwrap();
        let rpc_two = service.get_rpc_url(second).await.unwrap();
        assert_eq!(rpc_one, "http://localhost:8546");
        assert_eq!(rpc_two, "http://localhost:8548");

        let dir_one = miner_supervisor::platform::miner_data_dir(first);
        let dir_two = miner_supervisor::platform::miner_data_dir(second);
        assert_ne!(dir_one, dir_two);

        service.stop_all().await;
        assert!(service.get_running_miner_indices().await.is_empty());
    })
    .await
}

#[tokio::test]
#[serial(home_env)]
async fn sleep_wake_cycle_restores_running_set() {
    with_isolated_home(|home| async move {
        let geth = write_fake_geth(home);
        let service = MinerService::new(geth);

        service.add_tab(None).await;
        service.add_tab(None).await;
        service.start_miner(1, None).await.unwrap();
        service.start_miner(2, None).await.unwrap();

        let snapshot = miner_supervisor::power::on_suspend(&service).await;
        assert_eq!(snapshot, vec![1, 2]);
        assert!(service.get_running_miner_indices().await.is_empty());

        miner_supervisor::power::on_resume(&service, &snapshot).await;
        let running = service.get_running_miner_indices().await;
        assert_eq!(running, vec![1, 2]);

        service.stop_all().await;
    })
    .await
}
