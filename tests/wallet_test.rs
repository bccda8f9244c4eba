//! Wallet Service testable properties from spec: address-only precedence,
//! keystore-derived address lookup, and round-trips through real files.

use miner_supervisor::{platform, wallet};
use serial_test::serial;

// HOME is process-wide; #[serial(home_env)] keeps these tests from
// clobbering each other's tempdir-backed root across threads.
fn with_isolated_home<T>(f: impl FnOnce() -> T) -> T {
    let home = tempfile::tempdir().unwrap();
    std::env::set_var("HOME", home.path());
    f()
}

#[test]
#[serial(home_env)]
fn set_address_only_then_get_stored_returns_it_canonicalized() {
    with_isolated_home(|| {
        let addr = "0x000000000000000000000000000000000000dEaD";
        wallet::set_address_only(addr).unwrap();
        let stored = wallet::get_stored_mining_address(None).unwrap();
        assert_eq!(stored.as_deref(), Some(addr));
    })
}

#[test]
#[serial(home_env)]
fn keystore_address_used_when_no_address_only_file_present() {
    with_isolated_home(|| {
        let generated = wallet::generate().unwrap();
        let written = wallet::write_keystore_to_miner(1, &generated.private_key, "pw").unwrap();
        assert_eq!(written, generated.address);

        let stored = wallet::get_stored_mining_address(Some(1)).unwrap();
        assert_eq!(stored.as_deref(), Some(generated.address.as_str()));
    })
}

#[test]
#[serial(home_env)]
fn address_only_file_takes_precedence_over_keystore() {
    with_isolated_home(|| {
        let generated = wallet::generate().unwrap();
        wallet::write_keystore_to_miner(1, &generated.private_key, "pw").unwrap();

        let preferred = "0x000000000000000000000000000000000000dEaD";
        wallet::set_address_only(preferred).unwrap();

        let stored = wallet::get_stored_mining_address(Some(1)).unwrap();
        assert_eq!(stored.as_deref(), Some(preferred));
    })
}

#[test]
#[serial(home_env)]
fn keystore_file_lands_under_miner_keystore_dir() {
    with_isolated_home(|| {
        let generated = wallet::generate().unwrap();
        wallet::write_keystore_to_miner(2, &generated.private_key, "pw").unwrap();

        let dir = platform::miner_keystore_dir(2);
        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].as_ref().unwrap().file_name();
        assert!(name.to_string_lossy().starts_with("UTC--"));
    })
}

#[test]
#[serial(home_env)]
fn invalid_address_is_rejected_before_any_filesystem_change() {
    with_isolated_home(|| {
        let result = wallet::set_address_only("not-an-address");
        assert!(result.is_err());
        assert!(!platform::mining_address_path().exists());
    })
}
