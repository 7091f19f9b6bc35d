//! Console logging with a persistent copy.
//!
//! Payment events are worth keeping next to the money they describe: every record written through
//! this logger also lands in the store's `payment_log` collection, fire-and-forget, so an audit
//! never depends on console scrollback.

use std::fmt::Display;

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::{db_types::LogRecord, traits::PaymentStore};

#[derive(Clone)]
pub struct StoreLogger<B> {
    store: B,
    category: &'static str,
    debug_mode: bool,
}

impl<B: PaymentStore> StoreLogger<B> {
    pub fn new(category: &'static str, store: B, debug_mode: bool) -> Self {
        Self { store, category, debug_mode }
    }

    pub fn info(&self, text: &str) {
        info!("{}: {text}", self.category);
        self.persist("info", text);
    }

    pub fn warn(&self, text: &str) {
        warn!("{}: {text}", self.category);
        self.persist("warn", text);
    }

    pub fn error(&self, event: &str, err: &dyn Display) {
        let text = format!("{event}: {err}");
        error!("{}: {text}", self.category);
        self.persist("error", &text);
    }

    /// Debug records are dropped entirely unless debug mode is on.
    pub fn debug(&self, text: &str) {
        if !self.debug_mode {
            return;
        }
        debug!("{}: {text}", self.category);
        self.persist("debug", text);
    }

    fn persist(&self, level: &str, text: &str) {
        let record = LogRecord {
            time: Utc::now(),
            category: self.category.to_string(),
            level: level.to_string(),
            text: text.to_string(),
        };
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.write_log_message(&record).await {
                error!("logger: write to store: {e}");
            }
        });
    }
}
