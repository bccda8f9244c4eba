//! Genesis initialization is a one-time, idempotent step per miner index.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use miner_supervisor::{genesis, platform};
use serial_test::serial;

fn write_fake_geth(dir: &std::path::Path) -> PathBuf {
    let script_path = dir.join("geth");
    let script = r#"#!/bin/sh
datadir=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "--datadir" ]; then
        datadir="$arg"
    fi
    prev="$arg"
done
mkdir -p "$datadir/geth/chaindata"
date +%s%N > "$datadir/geth/chaindata/init-count"
exit 0
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

#[test]
#[serial(home_env)]
fn init_creates_chaindata_and_supporting_dirs() {
    with_isolated_home(|home| {
        let geth = write_fake_geth(home);
        genesis::init_miner_data_dir(&geth, 3, None).unwrap();

        assert!(platform::miner_chaindata_dir(3).exists());
        assert!(platform::miner_keystore_dir(3).exists());
        assert!(platform::miner_logs_dir(3).exists());
    })
}

#[test]
#[serial(home_env)]
fn second_call_is_a_no_op() {
    with_isolated_home(|home| {
        let geth = write_fake_geth(home);
        genesis::init_miner_data_dir(&geth, 4, None).unwrap();

        let marker = platform::miner_chaindata_dir(4).join("init-count");
        let first_run = std::fs::read_to_string(&marker).unwrap();

        genesis::init_miner_data_dir(&geth, 4, None).unwrap();
        let after_second_call = std::fs::read_to_string(&marker).unwrap();

        assert_eq!(first_run, after_second_call);
    })
}

#[test]
#[serial(home_env)]
fn miner_indices_get_independent_chaindata() {
    with_isolated_home(|home| {
        let geth = write_fake_geth(home);
        genesis::init_miner_data_dir(&geth, 1, None).unwrap();
        genesis::init_miner_data_dir(&geth, 2, None).unwrap();

        assert_ne!(
            platform::miner_data_dir(1),
            platform::miner_data_dir(2)
        );
        assert!(platform::miner_chaindata_dir(1).exists());
        assert!(platform::miner_chaindata_dir(2).exists());
    })
}
