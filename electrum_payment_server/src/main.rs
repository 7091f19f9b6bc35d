use std::{env, process::ExitCode};

use dotenvy::dotenv;
use electrum_payment_server::{config::AppConfig, server::run_server};
use log::{error, info, warn};

#[actix_web::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();

    let config_path = config_path();
    info!("🚀️ using config file: {config_path}");
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("boot: {e}");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        },
    };
    if !preflight_check(&config) {
        eprintln!("🚦️ Preflight check failed. Check the logs for details.");
        return ExitCode::FAILURE;
    }

    match run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server: {e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        },
    }
}

fn config_path() -> String {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--conf" || arg == "-c" {
            if let Some(path) = args.next() {
                return path;
            }
        }
    }
    env::var("ELECTRUM_CONFIG").unwrap_or_else(|_| "config.yml".to_string())
}

fn preflight_check(config: &AppConfig) -> bool {
    info!("🚦️ Running preflight checks...");
    if !config.store.enabled {
        error!("🚦️ The store is disabled. Electrum persists every order and reply; enable store in the configuration.");
        return false;
    }
    if config.merchant.secret.reveal().is_empty()
        || config.merchant.code.is_empty()
        || config.merchant.terminal.is_empty()
    {
        // Not fatal: payment calls fail individually until the merchant is configured.
        warn!("🚦️ Merchant secret/code/terminal are not fully configured; payment requests will be rejected.");
    }
    info!("🚦️ Preflight check PASSED.");
    true
}
