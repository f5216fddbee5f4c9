//! Ports (traits) for token authentication
//!
//! These traits define the capabilities the core verification logic depends
//! on. They represent ports in hexagonal architecture: the session manager
//! and the device monitor work against these abstractions, and the adapters
//! bind them to cryptoki and rusb.

mod contract_tests;
mod token;
mod usb;

pub use token::{KeyClass, RsaPublicParts, TokenModule, TokenProvider, TokenSession};
pub use usb::{UsbBus, UsbHotplugSink};

#[cfg(test)]
pub(crate) use contract_tests::session_contract;
