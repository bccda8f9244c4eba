#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

use std::sync::Arc;
use tauri::{
    menu::{Menu, MenuItem},
    tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent},
    Manager,
};
use tracing::{error, info};

use miner_supervisor::commands::{geth, miner, network, wallet};
use miner_supervisor::miner_service::MinerService;
use miner_supervisor::{logger, platform};

fn main() {
    let _log_guard = logger::init(&platform::logs_dir()).expect("failed to initialize logging");
    info!("starting Mars Credit miner supervisor");

    let service = MinerService::new(MinerService::default_geth_path());

    tauri::Builder::default()
        .manage(service.clone())
        .invoke_handler(tauri::generate_handler![
            geth::geth_is_available,
            geth::geth_download,
            geth::geth_get_path,
            miner::miner_add_tab,
            miner::miner_remove_tab,
            miner::miner_start,
            miner::miner_stop,
            miner::miner_get_state,
            miner::miner_get_tab_indices,
            miner::miner_get_rpc_url,
            wallet::wallet_generate,
            wallet::wallet_import_mnemonic,
            wallet::wallet_import_private_key,
            wallet::wallet_set_address_only,
            wallet::wallet_get_stored_address,
            wallet::wallet_save_mnemonic,
            wallet::wallet_load_mnemonic,
            wallet::wallet_write_keystore_to_miner,
            wallet::wallet_is_valid_address,
            wallet::wallet_get_info,
            network::network_get_balance,
            network::network_miner_set_etherbase,
            network::network_miner_start,
            network::network_miner_stop,
            network::network_eth_mining,
            network::network_eth_hashrate,
            network::network_eth_block_number,
            network::network_eth_syncing,
            network::network_net_peer_count,
            network::network_get_remote_rpc_url,
        ])
        .plugin(tauri_plugin_process::init())
        .plugin(tauri_plugin_os::init())
        .plugin(tauri_plugin_shell::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(move |app| {
            service.set_app_handle(app.handle().clone());

            let show_i = MenuItem::with_id(app, "show", "Show", true, None::<&str>)?;
            let hide_i = MenuItem::with_id(app, "hide", "Hide", true, None::<&str>)?;
            let quit_i = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
            let menu = Menu::with_items(app, &[&show_i, &hide_i, &quit_i])?;

            let _tray = TrayIconBuilder::new()
                .icon(app.default_window_icon().unwrap().clone())
                .menu(&menu)
                .tooltip("Mars Credit Miner Supervisor")
                .show_menu_on_left_click(false)
                .on_tray_icon_event(|tray, event| {
                    if let TrayIconEvent::Click {
                        button: MouseButton::Left,
                        button_state: MouseButtonState::Up,
                        ..
                    } = event
                    {
                        let app = tray.app_handle();
                        if let Some(window) = app.get_webview_window("main") {
                            let _ = window.unminimize();
                            let _ = window.show();
                            let _ = window.set_focus();
                        }
                    }
                })
                .on_menu_event(|app, event| match event.id.as_ref() {
                    "show" => {
                        if let Some(window) = app.get_webview_window("main") {
                            let _ = window.show();
                            let _ = window.set_focus();
                        }
                    }
                    "hide" => {
                        if let Some(window) = app.get_webview_window("main") {
                            let _ = window.hide();
                        }
                    }
                    "quit" => app.exit(0),
                    _ => {}
                })
                .build(app)?;

            if let Some(window) = app.get_webview_window("main") {
                window.show()?;
                window.set_focus()?;

                let app_handle = app.handle().clone();
                window.on_window_event(move |event| {
                    if let tauri::WindowEvent::CloseRequested { api, .. } = event {
                        api.prevent_close();
                        if let Some(window) = app_handle.get_webview_window("main") {
                            let _ = window.hide();
                        }
                    }
                });
            }

            let signal_service = service.clone();
            tauri::async_runtime::spawn(async move {
                wait_for_shutdown_signal().await;
                info!("shutdown signal received, stopping all miners");
                signal_service.stop_all().await;
                std::process::exit(0);
            });

            Ok(())
        })
        .run(tauri::generate_context!())
        .unwrap_or_else(|e| error!("error while running tauri application: {}", e));
}

/// Registers OS signal handlers once at startup; they invoke `stop_all()`
/// on the one `MinerService` value threaded through the app, rather than
/// reaching for a process-wide singleton.
async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
