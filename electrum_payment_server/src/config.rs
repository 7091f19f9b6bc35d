//! Configuration loading.
//!
//! A YAML file (`config.yml` by default, `--conf <path>` to override) provides the base values;
//! `ELECTRUM__SECTION__FIELD` environment variables override the file. The parsed value is plain
//! data passed by reference; there is no global configuration singleton.

use config::{Config, Environment, File, FileFormat};
use electrum_payment_engine::MerchantConfig;
use epg_common::Secret;
use serde::Deserialize;

use crate::errors::ServerError;

const DEFAULT_REQUEST_URL: &str = "https://sis-t.redsys.es:25443/sis/rest/trataPeticionREST";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub is_debug: bool,
    /// Bill transactions without contacting the gateway (test mode).
    pub disable_payment: bool,
    /// Settle a transaction as fully billed on the first hard payment error.
    pub close_ledger_on_error: bool,
    /// Reject inbound notifications with a bad signature.
    pub verify_notify: bool,
    /// Keep at most this many rows in the payment log; 0 keeps everything.
    pub log_records: i64,
    pub listen: ListenConfig,
    pub store: StoreConfig,
    pub merchant: MerchantSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            is_debug: false,
            disable_payment: false,
            close_ledger_on_error: true,
            verify_notify: true,
            log_records: 0,
            listen: ListenConfig::default(),
            store: StoreConfig::default(),
            merchant: MerchantSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub bind_ip: String,
    pub port: u16,
    pub tls_enabled: bool,
    pub cert_file: String,
    pub key_file: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind_ip: "0.0.0.0".to_string(),
            port: 5100,
            tls_enabled: false,
            cert_file: String::new(),
            key_file: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub database: String,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "electrum".to_string(),
            password: Secret::new(String::new()),
            database: "electrum".to_string(),
            max_connections: 25,
        }
    }
}

impl StoreConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user,
            self.password.reveal(),
            self.host,
            self.port,
            self.database
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MerchantSettings {
    /// Base64-encoded merchant secret as issued by the gateway.
    pub secret: Secret<String>,
    pub code: String,
    pub terminal: String,
    pub request_url: String,
}

impl Default for MerchantSettings {
    fn default() -> Self {
        Self {
            secret: Secret::new(String::new()),
            code: String::new(),
            terminal: String::new(),
            request_url: DEFAULT_REQUEST_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the YAML file (when present) and applies environment overrides on top.
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let settings = Config::builder()
            .add_source(File::new(path, FileFormat::Yaml).required(false))
            .add_source(Environment::with_prefix("ELECTRUM").separator("__").try_parsing(true))
            .build()
            .map_err(|e| ServerError::Configuration(e.to_string()))?;
        settings.try_deserialize().map_err(|e| ServerError::Configuration(e.to_string()))
    }

    pub fn merchant_config(&self) -> MerchantConfig {
        MerchantConfig {
            secret: self.merchant.secret.clone(),
            code: self.merchant.code.clone(),
            terminal: self.merchant.terminal.clone(),
            disable_payment: self.disable_payment,
            close_ledger_on_error: self.close_ledger_on_error,
            verify_notify: self.verify_notify,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_point_at_the_sandbox() {
        let config = AppConfig::default();
        assert_eq!(config.merchant.request_url, DEFAULT_REQUEST_URL);
        assert_eq!(config.listen.port, 5100);
        assert!(config.close_ledger_on_error);
        assert!(config.verify_notify);
        assert!(!config.store.enabled);
    }

    #[test]
    fn store_url_carries_the_credentials() {
        let mut store = StoreConfig::default();
        store.user = "pg".to_string();
        store.password = Secret::new("pw".to_string());
        store.database = "payments".to_string();
        assert_eq!(store.url(), "postgres://pg:pw@127.0.0.1:5432/payments");
    }
}
