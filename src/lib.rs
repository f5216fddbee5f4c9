//! Hardware-token authentication over PKCS#11
//!
//! Verifies that a connected USB token holds the private half of the
//! application's embedded trusted RSA key, using a challenge-response
//! protocol: a fresh random challenge is signed on the token and the
//! signature is checked locally under the trusted key. The subsystem also
//! watches the USB bus for allow-listed tokens and exports the token's
//! public key for enrollment.
//!
//! The core works against the traits in [`ports`]; the [`adapters`] bind
//! them to cryptoki (PKCS#11) and rusb.

pub mod adapters;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod export;
pub mod manager;
pub mod model;
pub mod monitor;
pub mod ports;
pub mod translate;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use events::{AuthEvent, EventSink};
pub use manager::{DriverTestReport, ManagerStatus, TokenSessionManager};
pub use model::{Pin, TokenId, VerificationResult};
pub use monitor::DeviceMonitor;

/// Session manager bound to the system PKCS#11 implementation.
pub type Pkcs11SessionManager = TokenSessionManager<adapters::CryptokiProvider>;
