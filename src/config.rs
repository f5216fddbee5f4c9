//! Construction-time configuration
//!
//! Everything here is fixed when the manager/monitor is built; there is no
//! dynamic reload. The default PIN can be overridden through the `TOKEN_PIN`
//! environment variable.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::{Pin, SignatureMechanism, TokenId};

/// The application's trusted RSA public key. Only a token signature that
/// verifies under this key is accepted; the key exported by the token itself
/// is never trusted.
pub const TRUSTED_PUBLIC_KEY_PEM: &str = "-----BEGIN PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAwkfAnsjNiiVRqT8banyC
h6Df3pgIna9ZIhah9A1L9yjWh83M5KgFaEVqosNjUW5pB6M+sQEIkvhV2xLJLqRS
71xq/SZjgJt8nhjjqJQuBRDs6o7NKyDIZ9aXQhKTcw7Envu6xr0bfJN5LUd0wkwe
QX7bHfyM6IABB5/6XN2kdOPZoUlvcttacAaYHAtdhb6x3qf2xjvorqmkQiusDgd/
g5gHVPjlusE7WNvv1eTbhMW2BKBBqj9fj4gwFZ4+sFlOtEu5g6JD/EBRO+uqa4n9
wjRxJpTXfmb4SiL0M5uCjftVgvVpaANi79sgyO8W9floMcuks9yX3p044HxAgB+R
EwIDAQAB
-----END PUBLIC KEY-----";

/// Label used to locate both the public and the private key object on the
/// token.
pub const DEFAULT_KEY_LABEL: &str = "TokenGateKey";

/// Environment variable overriding the default PIN.
pub const PIN_ENV_VAR: &str = "TOKEN_PIN";

const DEFAULT_PIN: &str = "1234";

/// Size of the random challenge signed by the token, in bytes.
pub const CHALLENGE_SIZE: usize = 256;

/// Configuration for the authentication subsystem.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded trusted RSA public key used for local verification
    pub trusted_public_key_pem: String,
    /// Label of the key objects on the token
    pub key_label: String,
    /// PIN used when the caller supplies none
    pub default_pin: Pin,
    /// Signature mechanism for the challenge-response protocol
    pub mechanism: SignatureMechanism,
    /// Allow-listed USB vendor/product pairs
    pub allowed_tokens: Vec<TokenId>,
    /// Device monitor poll interval
    pub poll_interval: Duration,
    /// Time-to-live of a cached successful verification
    pub cache_ttl: Duration,
    /// Candidate driver paths, highest priority first
    pub driver_candidates: Vec<PathBuf>,
    /// Challenge size in bytes
    pub challenge_size: usize,
    /// When true, a missing labeled private key fails instead of falling
    /// back to the first private key on the token
    pub strict_key_label: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            trusted_public_key_pem: TRUSTED_PUBLIC_KEY_PEM.to_string(),
            key_label: DEFAULT_KEY_LABEL.to_string(),
            default_pin: Pin::new(
                env::var(PIN_ENV_VAR).unwrap_or_else(|_| DEFAULT_PIN.to_string()),
            ),
            mechanism: SignatureMechanism::Sha256RsaPkcs,
            // Feitian ePass3003
            allowed_tokens: vec![TokenId::new(0x096e, 0x0703)],
            poll_interval: Duration::from_millis(2000),
            cache_ttl: Duration::from_secs(5 * 60),
            driver_candidates: default_driver_candidates(),
            challenge_size: CHALLENGE_SIZE,
            strict_key_label: false,
        }
    }
}

/// Platform-specific candidate paths for the vendor driver, in priority
/// order: bundled next to the executable, then the development tree, then
/// the system-installed location.
pub fn default_driver_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from));

    if cfg!(target_os = "windows") {
        if let Some(dir) = &exe_dir {
            candidates.push(dir.join("lib").join("win32").join("shuttle_p11.dll"));
        }
        candidates.push(PathBuf::from("Token/lib/win32/shuttle_p11.dll"));
        let system_root = env::var("SystemRoot").unwrap_or_else(|_| "C:\\Windows".to_string());
        candidates.push(PathBuf::from(system_root).join("System32").join("shuttle_p11.dll"));
    } else if cfg!(target_os = "linux") {
        if let Some(dir) = &exe_dir {
            candidates.push(dir.join("lib").join("libshuttle_p11v220.so.1.0.0"));
        }
        candidates.push(PathBuf::from("Token/lib/libshuttle_p11v220.so.1.0.0"));
        candidates.push(PathBuf::from("/usr/local/lib/libshuttle_p11v220.so"));
        candidates.push(PathBuf::from("/usr/lib/libshuttle_p11v220.so"));
    }

    candidates
}
