//! Mock token adapter for testing ports (traits)
//!
//! Backed by a real in-memory RSA keypair so that signatures produced by the
//! mock verify under the key it exports. Only available in test scope.

use std::cell::Cell;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{AuthResult, CryptoError, LoginFailureKind, TokenError};
use crate::model::{Pin, SignatureMechanism, SlotDescriptor};
use crate::ports::{KeyClass, RsaPublicParts, TokenModule, TokenProvider, TokenSession};

#[derive(Debug)]
struct MockState {
    private: RsaPrivateKey,
    public: RsaPublicKey,
    pin: String,
    key_label: String,
    token_present: bool,
    load_count: AtomicUsize,
}

/// Mock provider carrying one token with one RSA keypair.
#[derive(Debug, Clone)]
pub struct MockProvider {
    state: Arc<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_options("1234", "TokenGateKey", true)
    }

    pub fn with_options(pin: &str, key_label: &str, token_present: bool) -> Self {
        let private =
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("mock keypair generation");
        let public = RsaPublicKey::from(&private);
        Self {
            state: Arc::new(MockState {
                private,
                public,
                pin: pin.to_string(),
                key_label: key_label.to_string(),
                token_present,
                load_count: AtomicUsize::new(0),
            }),
        }
    }

    /// PEM of the mock keypair's public half, for use as the trusted key in
    /// success-path tests.
    pub fn public_key_pem(&self) -> String {
        self.state
            .public
            .to_public_key_pem(LineEnding::LF)
            .expect("PEM encoding")
    }

    /// How many times `load_module` has been called.
    pub fn load_count(&self) -> usize {
        self.state.load_count.load(Ordering::SeqCst)
    }
}

impl TokenProvider for MockProvider {
    type Module = MockModule;

    fn is_available(&self) -> bool {
        true
    }

    fn load_module(&self, _path: &Path) -> AuthResult<Self::Module> {
        self.state.load_count.fetch_add(1, Ordering::SeqCst);
        Ok(MockModule {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockModule {
    state: Arc<MockState>,
}

impl TokenModule for MockModule {
    type Session = MockSession;

    fn slots(&self) -> AuthResult<Vec<SlotDescriptor>> {
        if !self.state.token_present {
            return Ok(Vec::new());
        }
        Ok(vec![SlotDescriptor {
            slot_id: 0,
            description: "Mock token slot".to_string(),
            token_label: "MockToken".to_string(),
            token_present: true,
        }])
    }

    fn open_session(&self, slot_index: usize, _read_write: bool) -> AuthResult<Self::Session> {
        if !self.state.token_present || slot_index > 0 {
            return Err(TokenError::InvalidSlot { code: Some(0x03) }.into());
        }
        Ok(MockSession {
            state: Arc::clone(&self.state),
            logged_in: Cell::new(false),
        })
    }

    fn unload(self) -> AuthResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockSession {
    state: Arc<MockState>,
    logged_in: Cell<bool>,
}

/// Key handle of the mock session. Carries only the class; the session owns
/// the key material.
#[derive(Debug, Clone)]
pub struct MockKey {
    class: KeyClass,
}

impl TokenSession for MockSession {
    type Key = MockKey;

    fn login(&self, pin: &Pin) -> AuthResult<()> {
        if pin.as_str() == self.state.pin {
            self.logged_in.set(true);
            Ok(())
        } else {
            Err(TokenError::Login {
                kind: LoginFailureKind::IncorrectPin,
                code: Some(0xa0),
                reason: "CKR_PIN_INCORRECT".to_string(),
            }
            .into())
        }
    }

    fn logout(&self) -> AuthResult<()> {
        self.logged_in.set(false);
        Ok(())
    }

    fn find_key(&self, class: KeyClass, label: &str) -> AuthResult<Option<Self::Key>> {
        // Private objects stay invisible until login, like a real token.
        if class == KeyClass::Private && !self.logged_in.get() {
            return Ok(None);
        }
        if label == self.state.key_label {
            Ok(Some(MockKey { class }))
        } else {
            Ok(None)
        }
    }

    fn first_key(&self, class: KeyClass) -> AuthResult<Option<Self::Key>> {
        if class == KeyClass::Private && !self.logged_in.get() {
            return Ok(None);
        }
        Ok(Some(MockKey { class }))
    }

    fn sign(
        &self,
        key: &Self::Key,
        mechanism: SignatureMechanism,
        data: &[u8],
    ) -> AuthResult<Vec<u8>> {
        assert_eq!(key.class, KeyClass::Private);
        assert_eq!(mechanism, SignatureMechanism::Sha256RsaPkcs);
        let digest = Sha256::digest(data);
        self.state
            .private
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| {
                CryptoError::SignFailed {
                    reason: e.to_string(),
                }
                .into()
            })
    }

    fn rsa_public_parts(&self, key: &Self::Key) -> AuthResult<RsaPublicParts> {
        assert_eq!(key.class, KeyClass::Public);
        use rsa::traits::PublicKeyParts;
        Ok(RsaPublicParts {
            modulus: self.state.public.n().to_bytes_be(),
            public_exponent: self.state.public.e().to_bytes_be(),
        })
    }

    fn encrypt(&self, key: &Self::Key, data: &[u8]) -> AuthResult<Vec<u8>> {
        assert_eq!(key.class, KeyClass::Public);
        self.state
            .public
            .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, data)
            .map_err(|e| {
                TokenError::Vendor {
                    code: None,
                    message: e.to_string(),
                }
                .into()
            })
    }

    fn decrypt(&self, key: &Self::Key, data: &[u8]) -> AuthResult<Vec<u8>> {
        assert_eq!(key.class, KeyClass::Private);
        self.state
            .private
            .decrypt(Pkcs1v15Encrypt, data)
            .map_err(|e| {
                TokenError::Vendor {
                    code: None,
                    message: e.to_string(),
                }
                .into()
            })
    }

    fn close(self) -> AuthResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod contract {
    use super::*;
    use crate::contract_tests_for;
    use crate::ports::session_contract;

    contract_tests_for!(
        mock_token_contract,
        make = || MockProvider::new()
            .load_module(Path::new("mock"))
            .unwrap(),
        tests = {
            slot_enumeration => session_contract::test_slot_enumeration,
            login_success => session_contract::test_login_success,
            login_wrong_pin => session_contract::test_login_wrong_pin,
            labeled_key_lookup => session_contract::test_labeled_key_lookup,
            private_keys_hidden_without_login => session_contract::test_sign_requires_login,
            sign_verifies_under_exported_key => session_contract::test_sign_verifies_under_exported_key,
            encrypt_decrypt => session_contract::test_encrypt_with_public_decrypt_with_private,
        }
    );
}
