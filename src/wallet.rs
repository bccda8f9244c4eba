//! BIP39 wallet generation/import, address validation, Geth-compatible
//! keystore files, and the address-only mining target.
//!
//! Private keys never persist outside a Geth-format keystore envelope and
//! are never retained in process state beyond the call that produced or
//! consumed them.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng as AesOsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use bip39::Mnemonic;
use rand::rngs::OsRng;
use rand::RngCore;
use scrypt::Params as ScryptParams;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::path::Path;
use tiny_hderive::bip32::ExtendedPrivKey;

use crate::error::{Result, SupervisorError};
use crate::platform;

const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletMode {
    Full,
    AddressOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWallet {
    pub address: String,
    pub mnemonic: String,
    pub private_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedWallet {
    pub address: String,
    pub private_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub address: String,
    pub mode: String,
    pub has_mnemonic: bool,
    pub has_private_key: bool,
}

/// `^0x[0-9a-fA-F]{40}$`
pub fn is_valid_address(address: &str) -> bool {
    let Some(hex) = address.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

fn secret_key_to_address(secret: &SecretKey) -> String {
    let secp = Secp256k1::new();
    let public = PublicKey::from_secret_key(&secp, secret);
    let uncompressed = public.serialize_uncompressed();
    // Skip the 0x04 prefix byte; address is the last 20 bytes of
    // keccak256(pubkey_x || pubkey_y).
    let hash = Keccak256::digest(&uncompressed[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

fn seed_to_secret_key(seed: &[u8]) -> Result<SecretKey> {
    let extended = ExtendedPrivKey::derive(seed, DERIVATION_PATH)
        .map_err(|_| SupervisorError::InvalidMnemonic("derivation failed".into()))?;
    SecretKey::from_slice(&extended.secret())
        .map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))
}

fn parse_private_key(hex_key: &str) -> Result<SecretKey> {
    let stripped = hex_key.trim().strip_prefix("0x").unwrap_or(hex_key.trim());
    let bytes = hex::decode(stripped).map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;
    SecretKey::from_slice(&bytes).map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))
}

/// Generates a cryptographically random 12-word BIP39 seed and derives the
/// standard account (`m/44'/60'/0'/0/0`) from it.
pub fn generate() -> Result<GeneratedWallet> {
    let mut entropy = [0u8; 16]; // 128 bits -> 12 words
    OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;
    let seed = mnemonic.to_seed("");
    let secret = seed_to_secret_key(&seed)?;

    Ok(GeneratedWallet {
        address: secret_key_to_address(&secret),
        mnemonic: mnemonic.to_string(),
        private_key: format!("0x{}", hex::encode(secret.secret_bytes())),
    })
}

/// BIP39 phrase import; whitespace trimmed.
pub fn import_from_mnemonic(phrase: &str) -> Result<ImportedWallet> {
    let trimmed = phrase.trim();
    let mnemonic = Mnemonic::parse_normalized(trimmed)
        .map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;
    let seed = mnemonic.to_seed("");
    let secret = seed_to_secret_key(&seed)?;

    Ok(ImportedWallet {
        address: secret_key_to_address(&secret),
        private_key: format!("0x{}", hex::encode(secret.secret_bytes())),
    })
}

/// `0x` prefix optional.
pub fn import_from_private_key(hex_key: &str) -> Result<String> {
    let secret = parse_private_key(hex_key)?;
    Ok(secret_key_to_address(&secret))
}

/// Writes `0x…` to `mining_address.txt`, validated first.
pub fn set_address_only(address: &str) -> Result<()> {
    if !is_valid_address(address) {
        return Err(SupervisorError::InvalidAddress);
    }
    std::fs::create_dir_all(platform::root_dir())?;
    std::fs::write(platform::mining_address_path(), address)?;
    Ok(())
}

/// Prefers `mining_address.txt`; else, if `miner_index` is given, reads the
/// first keystore file in that miner's keystore dir and returns its
/// embedded address, canonicalized to `0x…`.
pub fn get_stored_mining_address(miner_index: Option<u32>) -> Result<Option<String>> {
    let address_file = platform::mining_address_path();
    if address_file.exists() {
        let contents = std::fs::read_to_string(&address_file)?;
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }

    let Some(index) = miner_index else {
        return Ok(None);
    };

    let keystore_dir = platform::miner_keystore_dir(index);
    if !keystore_dir.exists() {
        return Ok(None);
    }

    let mut entries: Vec<_> = std::fs::read_dir(&keystore_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let contents = std::fs::read_to_string(entry.path())?;
        let json: serde_json::Value = serde_json::from_str(&contents)?;
        if let Some(addr) = json.get("address").and_then(|a| a.as_str()) {
            return Ok(Some(format!("0x{}", addr.trim_start_matches("0x"))));
        }
    }

    Ok(None)
}

/// Encrypts `private_key` into a Geth-compatible V3 keystore envelope and
/// writes it to `miners/<i>/keystore/UTC--<timestamp>--<addressHex>`.
pub fn write_keystore_to_miner(miner_index: u32, private_key: &str, password: &str) -> Result<String> {
    let secret = parse_private_key(private_key)?;
    let address = secret_key_to_address(&secret);

    let keystore_dir = platform::miner_keystore_dir(miner_index);
    std::fs::create_dir_all(&keystore_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S%.9fZ").to_string();
    let file_name = format!("UTC--{}--{}", timestamp, address.trim_start_matches("0x"));

    let mut rng = rand::thread_rng();
    eth_keystore::encrypt_key(
        &keystore_dir,
        &mut rng,
        secret.secret_bytes(),
        password,
        Some(&file_name),
    )
    .map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;

    restrict_to_owner(&keystore_dir.join(&file_name))?;

    Ok(address)
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------
// Mnemonic store: scrypt key stretching + AES-256-GCM, replacing the
// weaker XOR-with-password scheme the upstream source used. That legacy
// format is migration input only and is not reproduced here.
// ---------------------------------------------------------------------

const SCRYPT_LOG_N: u8 = 15; // matches Geth keystore's default N = 2^15
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const SALT_LEN: usize = 16;

#[derive(Serialize, Deserialize)]
struct EncryptedMnemonicFile {
    version: u8,
    salt: String,
    nonce: String,
    ciphertext: String,
}

fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let params = ScryptParams::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
        .map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;
    let mut key = [0u8; 32];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut key)
        .map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;
    Ok(key)
}

/// Stores `mnemonic` encrypted under a key stretched from `password`.
pub fn save_mnemonic(mnemonic: &str, password: &str) -> Result<()> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key_bytes = derive_key(password, &salt)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Aes256Gcm::generate_nonce(&mut AesOsRng);
    let ciphertext = cipher
        .encrypt(&nonce, mnemonic.as_bytes())
        .map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;

    let file = EncryptedMnemonicFile {
        version: 1,
        salt: hex::encode(salt),
        nonce: hex::encode(nonce),
        ciphertext: hex::encode(ciphertext),
    };

    std::fs::create_dir_all(platform::root_dir())?;
    std::fs::write(platform::wallet_enc_path(), serde_json::to_string(&file)?)?;
    Ok(())
}

/// Returns the stored mnemonic, or `None` if no store exists. A wrong
/// password surfaces as an error (decryption failure), not as `None`.
pub fn load_mnemonic(password: &str) -> Result<Option<String>> {
    let path = platform::wallet_enc_path();
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let file: EncryptedMnemonicFile = serde_json::from_str(&contents)?;

    let salt = hex::decode(&file.salt).map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;
    let nonce_bytes =
        hex::decode(&file.nonce).map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;
    let ciphertext =
        hex::decode(&file.ciphertext).map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?;

    let key_bytes = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext.as_ref())
        .map_err(|_| SupervisorError::InvalidMnemonic("wrong password or corrupt store".into()))?;

    Ok(Some(
        String::from_utf8(plaintext).map_err(|e| SupervisorError::InvalidMnemonic(e.to_string()))?,
    ))
}

/// Summarizes persisted wallet state for `miner_index` (or global
/// address-only state when `None`).
pub fn get_wallet_info(miner_index: Option<u32>) -> Result<Option<WalletInfo>> {
    let address = match get_stored_mining_address(miner_index)? {
        Some(a) => a,
        None => return Ok(None),
    };

    let mode = if platform::mining_address_path().exists() {
        WalletMode::AddressOnly
    } else {
        WalletMode::Full
    };

    Ok(Some(WalletInfo {
        address,
        mode: match mode {
            WalletMode::Full => "full".to_string(),
            WalletMode::AddressOnly => "address_only".to_string(),
        },
        has_mnemonic: platform::wallet_enc_path().exists(),
        has_private_key: miner_index
            .map(|i| platform::miner_keystore_dir(i).exists())
            .unwrap_or(false),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn validates_addresses() {
        assert!(is_valid_address("0x000000000000000000000000000000000000dEaD"));
        assert!(!is_valid_address("0x123"));
        assert!(!is_valid_address("000000000000000000000000000000000000dEaD"));
        assert!(!is_valid_address("0xzzzz000000000000000000000000000000dEaD"));
    }

    #[test]
    fn generate_then_import_mnemonic_round_trips() {
        let generated = generate().unwrap();
        let imported = import_from_mnemonic(&generated.mnemonic).unwrap();
        assert_eq!(generated.address, imported.address);
        assert_eq!(generated.private_key, imported.private_key);
    }

    #[test]
    fn import_private_key_ignores_0x_prefix() {
        let generated = generate().unwrap();
        let without_prefix = generated.private_key.trim_start_matches("0x");
        let a = import_from_private_key(without_prefix).unwrap();
        let b = import_from_private_key(&generated.private_key).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, generated.address);
    }

    #[test]
    #[serial(home_env)]
    fn mnemonic_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", dir.path());

        save_mnemonic("test phrase words here", "hunter2").unwrap();
        let loaded = load_mnemonic("hunter2").unwrap();
        assert_eq!(loaded.as_deref(), Some("test phrase words here"));
    }

    #[test]
    #[serial(home_env)]
    fn mnemonic_store_rejects_wrong_password() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", dir.path());

        save_mnemonic("another phrase", "correct-password").unwrap();
        assert!(load_mnemonic("wrong-password").is_err());
    }
}
