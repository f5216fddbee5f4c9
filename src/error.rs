//! Error types for the token authentication subsystem
//!
//! Errors are organized hierarchically and use thiserror for implementation.
//! Vendor-level failures never escape the verification/export boundaries as
//! raw driver errors; they are translated into user-facing messages by the
//! `translate` module.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for token authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Top-level error type for all token authentication operations
#[derive(Error, Debug)]
pub enum AuthError {
    /// Native driver resolution and loading errors
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Token and session errors
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Cryptographic verification errors
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// USB device monitoring errors
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),
}

impl AuthError {
    /// The raw vendor numeric code, when the underlying failure carried one.
    pub fn vendor_code(&self) -> Option<u64> {
        match self {
            AuthError::Token(TokenError::Login { code, .. })
            | AuthError::Token(TokenError::DeviceCommunication { code, .. })
            | AuthError::Token(TokenError::InvalidSlot { code })
            | AuthError::Token(TokenError::Vendor { code, .. }) => *code,
            _ => None,
        }
    }
}

/// Native PKCS#11 driver errors
#[derive(Error, Debug)]
pub enum DriverError {
    /// No candidate driver path exists on this system
    #[error("no PKCS#11 driver found; searched {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    /// The driver exists but the native module could not be loaded
    #[error("failed to load PKCS#11 library {path}: {reason}")]
    ModuleLoad { path: PathBuf, reason: String },
}

/// Token and session errors
#[derive(Error, Debug)]
pub enum TokenError {
    /// Slot enumeration returned no token
    #[error("no token present; connect the token and try again")]
    NoTokenPresent,

    /// PIN login failed
    #[error("login failed ({kind}): {reason}")]
    Login {
        kind: LoginFailureKind,
        code: Option<u64>,
        reason: String,
    },

    /// No key object with the configured label (and no fallback candidate)
    #[error("key with label {label:?} not found on the token")]
    KeyNotFound { label: String },

    /// The driver reported a device-level communication failure
    #[error("device communication error: {reason}")]
    DeviceCommunication { code: Option<u64>, reason: String },

    /// The driver rejected the slot identifier
    #[error("invalid slot identifier")]
    InvalidSlot { code: Option<u64> },

    /// Any other vendor-reported failure, with its raw code when available
    #[error("vendor error: {message}")]
    Vendor { code: Option<u64>, message: String },
}

/// Subtypes of a failed PIN login, mirroring the vendor code table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailureKind {
    IncorrectPin,
    InvalidPin,
    PinLenRange,
    Other,
}

impl fmt::Display for LoginFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginFailureKind::IncorrectPin => write!(f, "incorrect PIN"),
            LoginFailureKind::InvalidPin => write!(f, "invalid PIN"),
            LoginFailureKind::PinLenRange => write!(f, "PIN length out of range"),
            LoginFailureKind::Other => write!(f, "PIN login error"),
        }
    }
}

/// Cryptographic verification errors
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The signature produced by the token does not verify under the
    /// application's embedded trusted public key
    #[error("signature verification failed: the key on the device does not match the embedded trusted public key")]
    SignatureMismatch,

    /// The embedded trusted public key could not be parsed
    #[error("embedded trusted public key is invalid: {reason}")]
    TrustedKey { reason: String },

    /// The token failed to produce a signature
    #[error("signing failed: {reason}")]
    SignFailed { reason: String },

    /// The public key components read from the token cannot be encoded
    #[error("public key export failed: {reason}")]
    KeyExport { reason: String },
}

/// USB monitoring errors
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("USB error: {0}")]
    Usb(String),
}
