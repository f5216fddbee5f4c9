//! Token provider traits
//!
//! The provider loads a native module from a path; the module enumerates
//! slots and opens sessions; the session does everything that requires a
//! token. A loaded module and an open session are consumed by `unload` and
//! `close` so that cleanup is explicit in the use cases.

use std::fmt::Debug;
use std::path::Path;

use crate::error::AuthResult;
use crate::model::{Pin, SignatureMechanism, SlotDescriptor};

/// Kind of key object looked up on the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Private,
    Public,
}

/// Raw RSA public key components read from a token key object,
/// big-endian byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicParts {
    pub modulus: Vec<u8>,
    pub public_exponent: Vec<u8>,
}

/// Capability to load a PKCS#11 module from a native library path.
pub trait TokenProvider {
    type Module: TokenModule;

    /// Whether the provider can work on this system at all
    /// (e.g. a driver candidate path exists).
    fn is_available(&self) -> bool;

    /// Load and initialize the native module at `path`.
    fn load_module(&self, path: &Path) -> AuthResult<Self::Module>;
}

/// A loaded and initialized PKCS#11 module.
pub trait TokenModule {
    type Session: TokenSession;

    /// Slots that currently have a token present.
    fn slots(&self) -> AuthResult<Vec<SlotDescriptor>>;

    /// Open a session on the slot at `slot_index` into [`Self::slots`].
    fn open_session(&self, slot_index: usize, read_write: bool) -> AuthResult<Self::Session>;

    /// Finalize and release the native module.
    fn unload(self) -> AuthResult<()>;
}

/// An open session on a token.
pub trait TokenSession {
    /// Opaque handle to a key object, valid for the lifetime of the session.
    type Key: Clone + Debug;

    fn login(&self, pin: &Pin) -> AuthResult<()>;

    fn logout(&self) -> AuthResult<()>;

    /// Look up a key object by class and label.
    fn find_key(&self, class: KeyClass, label: &str) -> AuthResult<Option<Self::Key>>;

    /// First key object of the given class, regardless of label.
    fn first_key(&self, class: KeyClass) -> AuthResult<Option<Self::Key>>;

    /// Sign `data` with the given key on the token.
    fn sign(&self, key: &Self::Key, mechanism: SignatureMechanism, data: &[u8])
        -> AuthResult<Vec<u8>>;

    /// Read the RSA public components of a key object.
    fn rsa_public_parts(&self, key: &Self::Key) -> AuthResult<RsaPublicParts>;

    /// RSA PKCS#1 v1.5 encryption with a public key object.
    fn encrypt(&self, key: &Self::Key, data: &[u8]) -> AuthResult<Vec<u8>>;

    /// RSA PKCS#1 v1.5 decryption with a private key object on the token.
    fn decrypt(&self, key: &Self::Key, data: &[u8]) -> AuthResult<Vec<u8>>;

    /// Close the session.
    fn close(self) -> AuthResult<()>;
}
