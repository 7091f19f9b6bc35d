mod payment_store;

pub use payment_store::{PaymentStore, PaymentStoreError};
