//! Electrum payment engine
//!
//! Charges stored card credentials (credential-on-file tokens) for completed EV charging sessions
//! through the Redsys REST gateway, and keeps the transaction ledger consistent across retries,
//! out-of-band notifications and partial failures.
//!
//! The crate is split along its seams:
//! 1. `db_types` holds the persisted data model; `traits` the store contract; `postgres` the
//!    concrete backend. You should never need the backend directly; go through the engine API.
//! 2. `payments` is the engine proper: method resolution, order allocation, background dispatch
//!    and reconciliation of gateway replies.
//! 3. `signer` and `gateway` implement the wire contract: the 3DES/HMAC request signature and the
//!    REST envelope exchange.

pub mod db_types;
pub mod gateway;
pub mod payments;
mod postgres;
pub mod signer;
mod storelog;
pub mod test_utils;
pub mod traits;

pub use gateway::{GatewayError, PaymentGateway, RedsysClient};
pub use payments::{MerchantConfig, PaymentsApi, PaymentsError, ORDER_SEED};
pub use postgres::PgStore;
pub use storelog::StoreLogger;
pub use traits::{PaymentStore, PaymentStoreError};
