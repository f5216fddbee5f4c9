//! Adapters - concrete implementations of ports (traits)

mod cryptoki_token;
mod rusb_bus;

#[cfg(test)]
pub mod mock_token;
#[cfg(test)]
pub mod mock_usb;

// Re-export for convenience
pub use cryptoki_token::{CryptokiModule, CryptokiProvider, CryptokiSession};
pub use rusb_bus::RusbBus;
