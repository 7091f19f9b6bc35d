mod cents;
mod helpers;
pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError, EUR_CURRENCY_CODE};
pub use helpers::mask;
pub use secret::Secret;
