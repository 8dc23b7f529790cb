//! SetuBACnet - BACnet/IP bridge daemon
//!
//! Binds one UDP socket on the configured interface, seeds the property
//! store, and drives the protocol engine at a fixed tick. The default
//! binary runs with a diagnostics engine; deployments link the vendor
//! protocol stack through the [`setu_bacnet::core::engine::Engine`]
//! trait.

use setu_bacnet::app::App;
use setu_bacnet::config::AppConfig;
use setu_bacnet::core::engine::DiagnosticEngine;
use setu_bacnet::error::Result;
use std::env;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `setu-bacnet <path>` (positional)
/// - `setu-bacnet --config <path>` (flag-based)
/// - `setu-bacnet -c <path>` (short flag)
///
/// Defaults to `/etc/setu-bacnet.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/setu-bacnet.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = AppConfig::from_file(&config_path)?;

    // Env filter wins over the configured level when set.
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.clone()),
    )
    .init();

    log::info!(
        "SetuBACnet v{} starting...",
        env!("CARGO_PKG_VERSION")
    );
    log::info!("Using config: {}", config_path);
    log::info!(
        "Device: {} ({})",
        config.device.instance,
        config.device.name
    );

    let mut app = App::new(config, DiagnosticEngine::new())?;
    app.run()
}
