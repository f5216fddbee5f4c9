//! Token session manager
//!
//! Owns the challenge-response verification protocol: load the native
//! module, open a session on the first token slot, log in, sign a fresh
//! random challenge with the token's private key and verify the signature
//! locally under the application's embedded trusted public key. The key the
//! token claims to hold is never trusted for verification.
//!
//! One token operation runs at a time. Successful verifications are cached
//! for a bounded interval so that repeated checks do not hit the hardware.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::driver::DriverLocator;
use crate::error::{AuthError, AuthResult, CryptoError, TokenError};
use crate::events::{AuthEvent, EventSink};
use crate::export::build_public_key_pem;
use crate::model::{Pin, SlotDescriptor, VerificationDetails, VerificationResult};
use crate::ports::{KeyClass, TokenModule, TokenProvider, TokenSession};
use crate::translate::translate;

/// Snapshot of manager state for status queries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStatus {
    pub last_verification: Option<VerificationResult>,
    pub is_initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_path: Option<String>,
    pub provider_available: bool,
}

/// Outcome of a driver self-test: the resolved driver plus whatever slots it
/// reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverTestReport {
    pub driver_path: String,
    pub slots: Vec<SlotDescriptor>,
}

struct CacheEntry {
    result: VerificationResult,
    stored_at: Instant,
}

pub struct TokenSessionManager<P: TokenProvider> {
    provider: P,
    config: AuthConfig,
    locator: DriverLocator,
    driver_path: Mutex<Option<PathBuf>>,
    cache: Mutex<Option<CacheEntry>>,
    op_lock: Mutex<()>,
    subscribers: Vec<Arc<dyn EventSink>>,
}

impl<P: TokenProvider> TokenSessionManager<P> {
    pub fn new(provider: P, config: AuthConfig) -> Self {
        let locator = DriverLocator::new(config.driver_candidates.clone());
        Self {
            provider,
            config,
            locator,
            driver_path: Mutex::new(None),
            cache: Mutex::new(None),
            op_lock: Mutex::new(()),
            subscribers: Vec::new(),
        }
    }

    /// Register an observer for verification results. Must be called before
    /// the manager is shared.
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.subscribers.push(sink);
    }

    /// Resolve the driver path without loading the module. The resolved path
    /// is kept for the lifetime of the manager; token operations reuse it.
    pub fn initialize(&self) -> AuthResult<PathBuf> {
        self.ensure_driver()
    }

    /// Run the challenge-response protocol, or reuse a recent successful
    /// result.
    ///
    /// Never returns an error: every failure is folded into a rejected
    /// [`VerificationResult`] with a user-facing message. `pin` of `None`
    /// uses the configured default PIN.
    pub fn perform_verification(
        &self,
        pin: Option<&str>,
        force_refresh: bool,
    ) -> VerificationResult {
        // Held for the whole operation; concurrent callers queue up.
        let _flight = self.op_lock.lock();

        if !force_refresh {
            if let Some(cached) = self.cached_success() {
                debug!("reusing cached verification result");
                return cached;
            }
        }

        let result = match self.run_protocol(pin) {
            Ok(result) => result,
            Err(e) => self.rejection_from(e),
        };

        *self.cache.lock() = Some(CacheEntry {
            result: result.clone(),
            stored_at: Instant::now(),
        });

        self.notify(&AuthEvent::verification(result.clone()));
        result
    }

    /// Drop any cached verification result. Called when the token leaves
    /// the bus.
    pub fn invalidate_cache(&self) {
        self.cache.lock().take();
    }

    /// Resolve the driver, load it and report the slots it sees.
    ///
    /// Slot enumeration failures are downgraded to an empty slot list so
    /// that a driver that loads but sees no token still produces a report.
    pub fn test_driver(&self) -> AuthResult<DriverTestReport> {
        let _flight = self.op_lock.lock();

        let driver = self.ensure_driver()?;
        let module = self.provider.load_module(&driver)?;
        let slots = match module.slots() {
            Ok(slots) => slots,
            Err(e) => {
                warn!("slot enumeration failed during driver test: {e}");
                Vec::new()
            }
        };
        if let Err(e) = module.unload() {
            warn!("module unload failed after driver test: {e}");
        }
        Ok(DriverTestReport {
            driver_path: driver.display().to_string(),
            slots,
        })
    }

    pub fn get_status(&self) -> ManagerStatus {
        let driver_path = self.driver_path.lock().clone();
        ManagerStatus {
            last_verification: self.cache.lock().as_ref().map(|e| e.result.clone()),
            is_initialized: driver_path.is_some(),
            driver_path: driver_path.map(|p| p.display().to_string()),
            provider_available: self.provider.is_available(),
        }
    }

    /// Export the labeled public key object as a PEM `PUBLIC KEY` block.
    ///
    /// Uses a read-only session without login; public objects are visible
    /// to everyone.
    pub fn export_public_key_pem(&self) -> AuthResult<String> {
        let _flight = self.op_lock.lock();

        let driver = self.ensure_driver()?;
        let module = self.provider.load_module(&driver)?;
        let parts = (|| {
            let slots = module.slots()?;
            if slots.is_empty() {
                return Err(TokenError::NoTokenPresent.into());
            }
            let session = module.open_session(0, false)?;
            let outcome = self.read_public_parts(&session);
            if let Err(e) = session.close() {
                warn!("session close failed after key export: {e}");
            }
            outcome
        })();
        if let Err(e) = module.unload() {
            warn!("module unload failed after key export: {e}");
        }
        build_public_key_pem(&parts?)
    }

    /// Encrypt `data` with the labeled public key object on the token.
    pub fn encrypt_with_public_key(&self, data: &[u8]) -> AuthResult<Vec<u8>> {
        let _flight = self.op_lock.lock();

        let driver = self.ensure_driver()?;
        let module = self.provider.load_module(&driver)?;
        let result = (|| {
            let slots = module.slots()?;
            if slots.is_empty() {
                return Err(TokenError::NoTokenPresent.into());
            }
            let session = module.open_session(0, false)?;
            let outcome = (|| {
                let key = self.labeled_key(&session, KeyClass::Public)?;
                session.encrypt(&key, data)
            })();
            if let Err(e) = session.close() {
                warn!("session close failed after encryption: {e}");
            }
            outcome
        })();
        if let Err(e) = module.unload() {
            warn!("module unload failed after encryption: {e}");
        }
        result
    }

    /// Decrypt `data` with the private key object on the token. Requires a
    /// PIN login.
    pub fn decrypt_with_private_key(&self, pin: Option<&str>, data: &[u8]) -> AuthResult<Vec<u8>> {
        let _flight = self.op_lock.lock();

        let driver = self.ensure_driver()?;
        let module = self.provider.load_module(&driver)?;
        let result = (|| {
            let slots = module.slots()?;
            if slots.is_empty() {
                return Err(TokenError::NoTokenPresent.into());
            }
            let session = module.open_session(0, true)?;
            let outcome = (|| {
                session.login(&self.effective_pin(pin))?;
                let key = self.locate_private_key(&session)?;
                session.decrypt(&key, data)
            })();
            if let Err(e) = session.logout() {
                debug!("logout failed after decryption: {e}");
            }
            if let Err(e) = session.close() {
                warn!("session close failed after decryption: {e}");
            }
            outcome
        })();
        if let Err(e) = module.unload() {
            warn!("module unload failed after decryption: {e}");
        }
        result
    }

    fn cached_success(&self) -> Option<VerificationResult> {
        let mut cache = self.cache.lock();
        match cache.as_ref() {
            Some(entry)
                if entry.result.success && entry.stored_at.elapsed() < self.config.cache_ttl =>
            {
                Some(entry.result.clone())
            }
            Some(_) => {
                // Expired or failed entries are dropped on first lookup.
                cache.take();
                None
            }
            None => None,
        }
    }

    fn run_protocol(&self, pin: Option<&str>) -> AuthResult<VerificationResult> {
        let driver = self.ensure_driver()?;
        let module = self.provider.load_module(&driver)?;
        let result = self.verify_with_module(&module, &driver, pin);
        if let Err(e) = module.unload() {
            warn!("module unload failed after verification: {e}");
        }
        result
    }

    fn verify_with_module(
        &self,
        module: &P::Module,
        driver: &std::path::Path,
        pin: Option<&str>,
    ) -> AuthResult<VerificationResult> {
        let slots = module.slots()?;
        let slot = slots.first().ok_or(TokenError::NoTokenPresent)?;

        let session = module.open_session(0, true)?;
        let outcome = self.challenge_response(&session, slot, driver, pin);
        if let Err(e) = session.logout() {
            debug!("logout failed after verification: {e}");
        }
        if let Err(e) = session.close() {
            warn!("session close failed after verification: {e}");
        }
        outcome
    }

    fn challenge_response<S: TokenSession>(
        &self,
        session: &S,
        slot: &SlotDescriptor,
        driver: &std::path::Path,
        pin: Option<&str>,
    ) -> AuthResult<VerificationResult> {
        session.login(&self.effective_pin(pin))?;
        let key = self.locate_private_key(session)?;

        let challenge = fresh_challenge(self.config.challenge_size);
        let signature = session.sign(&key, self.config.mechanism, &challenge)?;
        verify_local(&self.config.trusted_public_key_pem, &challenge, &signature)?;

        info!(
            slot = %slot.description,
            signature_size = signature.len(),
            "token signature verified against the trusted key"
        );
        Ok(VerificationResult::verified(
            "Token verified successfully",
            VerificationDetails::Protocol {
                challenge_size: challenge.len(),
                signature_size: signature.len(),
                public_key_match: true,
                slot_description: slot.description.clone(),
                driver_path: driver.display().to_string(),
            },
        ))
    }

    fn effective_pin(&self, pin: Option<&str>) -> Pin {
        match pin {
            Some(pin) => Pin::new(pin),
            None => self.config.default_pin.clone(),
        }
    }

    fn locate_private_key<S: TokenSession>(&self, session: &S) -> AuthResult<S::Key> {
        if let Some(key) = session.find_key(KeyClass::Private, &self.config.key_label)? {
            return Ok(key);
        }
        if self.config.strict_key_label {
            return Err(TokenError::KeyNotFound {
                label: self.config.key_label.clone(),
            }
            .into());
        }
        match session.first_key(KeyClass::Private)? {
            Some(key) => {
                warn!(
                    label = %self.config.key_label,
                    "labeled private key missing, falling back to the first private key"
                );
                Ok(key)
            }
            None => Err(TokenError::KeyNotFound {
                label: self.config.key_label.clone(),
            }
            .into()),
        }
    }

    fn labeled_key<S: TokenSession>(&self, session: &S, class: KeyClass) -> AuthResult<S::Key> {
        session
            .find_key(class, &self.config.key_label)?
            .ok_or_else(|| {
                TokenError::KeyNotFound {
                    label: self.config.key_label.clone(),
                }
                .into()
            })
    }

    fn read_public_parts<S: TokenSession>(
        &self,
        session: &S,
    ) -> AuthResult<crate::ports::RsaPublicParts> {
        let key = self.labeled_key(session, KeyClass::Public)?;
        session.rsa_public_parts(&key)
    }

    fn ensure_driver(&self) -> AuthResult<PathBuf> {
        let mut cached = self.driver_path.lock();
        if let Some(path) = cached.as_ref() {
            return Ok(path.clone());
        }
        let path = self.locator.locate()?;
        *cached = Some(path.clone());
        Ok(path)
    }

    fn rejection_from(&self, err: AuthError) -> VerificationResult {
        let translated = translate(&err);
        warn!("verification failed: {err}");
        VerificationResult::rejected(translated.message, err.to_string(), translated.code)
    }

    fn notify(&self, event: &AuthEvent) {
        for sink in &self.subscribers {
            sink.on_event(event);
        }
    }
}

/// A fresh random challenge. Never reused across attempts.
fn fresh_challenge(size: usize) -> Vec<u8> {
    let mut challenge = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut challenge);
    challenge
}

/// Verify the token's signature over `challenge` under the embedded trusted
/// public key.
fn verify_local(trusted_pem: &str, challenge: &[u8], signature: &[u8]) -> AuthResult<()> {
    let key = RsaPublicKey::from_public_key_pem(trusted_pem).map_err(|e| CryptoError::TrustedKey {
        reason: e.to_string(),
    })?;
    let digest = Sha256::digest(challenge);
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .map_err(|_| CryptoError::SignatureMismatch.into())
}
