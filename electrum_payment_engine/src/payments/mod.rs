//! The payment state machine.
//!
//! One API struct, generic over the store and gateway seams, owns the whole pipeline: method
//! resolution, order allocation, background dispatch and reply reconciliation. Gateway calls and
//! notify processing run as detached tasks so a cancelled HTTP caller can never abort a partially
//! issued financial operation; every such task is panic-isolated.

mod api;
mod errors;
mod locks;

use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use futures::FutureExt;
use log::error;

pub use api::{MerchantConfig, PaymentsApi, ORDER_SEED};
pub use errors::PaymentsError;

/// Spawns a background task that logs a panic instead of unwinding the worker.
pub(crate) fn spawn_guarded<F>(label: &'static str, fut: F)
where F: Future<Output = ()> + Send + 'static {
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
            error!("💳️ panic in {label}: {}", panic_message(panic.as_ref()));
        }
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
