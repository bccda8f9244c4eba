use crate::wallet::{self, GeneratedWallet, ImportedWallet, WalletInfo};

#[tauri::command]
pub async fn wallet_generate() -> Result<GeneratedWallet, String> {
    wallet::generate().map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn wallet_import_mnemonic(phrase: String) -> Result<ImportedWallet, String> {
    wallet::import_from_mnemonic(&phrase).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn wallet_import_private_key(private_key: String) -> Result<String, String> {
    wallet::import_from_private_key(&private_key).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn wallet_set_address_only(address: String) -> Result<(), String> {
    wallet::set_address_only(&address).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn wallet_get_stored_address(miner_index: Option<u32>) -> Result<Option<String>, String> {
    wallet::get_stored_mining_address(miner_index).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn wallet_save_mnemonic(mnemonic: String, password: String) -> Result<(), String> {
    wallet::save_mnemonic(&mnemonic, &password).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn wallet_load_mnemonic(password: String) -> Result<Option<String>, String> {
    wallet::load_mnemonic(&password).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn wallet_write_keystore_to_miner(
    miner_index: u32,
    private_key: String,
    password: String,
) -> Result<String, String> {
    wallet::write_keystore_to_miner(miner_index, &private_key, &password).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn wallet_is_valid_address(address: String) -> Result<bool, String> {
    Ok(wallet::is_valid_address(&address))
}

#[tauri::command]
pub async fn wallet_get_info(miner_index: Option<u32>) -> Result<Option<WalletInfo>, String> {
    wallet::get_wallet_info(miner_index).map_err(|e| e.to_string())
}
