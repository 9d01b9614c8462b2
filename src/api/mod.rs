pub mod error;
pub mod mexc;
pub mod telegram;

pub use error::GatewayError;
pub use mexc::{MexcClient, MEXC_API_BASE};
pub use telegram::TelegramNotifier;
