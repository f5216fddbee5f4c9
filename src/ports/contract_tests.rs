#[macro_export]
macro_rules! contract_tests_for {
      (
          $mod_name:ident,
          make = $make:expr,
          tests = {
            $( $test_name:ident => $tmpl:path ),+ $(,)?
        }
      ) => {
          mod $mod_name {
              use super::*;

              $(
                  #[test]
                  fn $test_name() {
                      let module = ($make)();
                      $tmpl(module);
                  }
              )+
          }
      };
  }

#[cfg(test)]
pub(crate) mod session_contract {
    use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
    use sha2::{Digest, Sha256};

    use crate::error::{AuthError, LoginFailureKind, TokenError};
    use crate::model::{Pin, SignatureMechanism};
    use crate::ports::{KeyClass, TokenModule, TokenSession};

    /// PIN every contract implementation accepts.
    pub(crate) const CONTRACT_PIN: &str = "1234";
    /// Label of the keypair every contract implementation carries.
    pub(crate) const CONTRACT_LABEL: &str = "TokenGateKey";

    fn open<M: TokenModule>(module: &M) -> M::Session {
        module
            .open_session(0, true)
            .expect("failed to open session on slot 0")
    }

    pub(crate) fn test_slot_enumeration(module: impl TokenModule) {
        let slots = module.slots().expect("slot enumeration failed");
        assert!(!slots.is_empty());
        assert!(slots[0].token_present);
        assert!(!slots[0].description.is_empty());
        module.unload().unwrap();
    }

    pub(crate) fn test_login_success(module: impl TokenModule) {
        let session = open(&module);
        session.login(&Pin::new(CONTRACT_PIN)).expect("login failed");
        session.logout().expect("logout failed");
        session.close().unwrap();
        module.unload().unwrap();
    }

    pub(crate) fn test_login_wrong_pin(module: impl TokenModule) {
        let session = open(&module);
        let result = session.login(&Pin::new("999999"));
        match result.unwrap_err() {
            AuthError::Token(TokenError::Login { kind, code, .. }) => {
                assert_eq!(kind, LoginFailureKind::IncorrectPin);
                assert_eq!(code, Some(0xa0));
            }
            other => panic!("expected login failure, got {other:?}"),
        }
        session.close().unwrap();
        module.unload().unwrap();
    }

    pub(crate) fn test_labeled_key_lookup(module: impl TokenModule) {
        let session = open(&module);
        session.login(&Pin::new(CONTRACT_PIN)).expect("login failed");

        let key = session.find_key(KeyClass::Private, CONTRACT_LABEL).unwrap();
        assert!(key.is_some());

        let missing = session.find_key(KeyClass::Private, "NoSuchLabel").unwrap();
        assert!(missing.is_none());

        let first = session.first_key(KeyClass::Private).unwrap();
        assert!(first.is_some());

        session.close().unwrap();
        module.unload().unwrap();
    }

    pub(crate) fn test_sign_requires_login(module: impl TokenModule) {
        let session = open(&module);
        let key = session
            .find_key(KeyClass::Public, CONTRACT_LABEL)
            .unwrap()
            .expect("public key must be visible without login");
        // Public objects are visible without login; private operations are not.
        assert!(session
            .find_key(KeyClass::Private, CONTRACT_LABEL)
            .unwrap()
            .is_none());
        drop(key);
        session.close().unwrap();
        module.unload().unwrap();
    }

    pub(crate) fn test_sign_verifies_under_exported_key(module: impl TokenModule) {
        let session = open(&module);
        session.login(&Pin::new(CONTRACT_PIN)).expect("login failed");

        let private = session
            .find_key(KeyClass::Private, CONTRACT_LABEL)
            .unwrap()
            .expect("labeled private key missing");
        let data = b"challenge bytes for the signing contract";
        let signature = session
            .sign(&private, SignatureMechanism::Sha256RsaPkcs, data)
            .expect("signing failed");

        let public = session
            .find_key(KeyClass::Public, CONTRACT_LABEL)
            .unwrap()
            .expect("labeled public key missing");
        let parts = session.rsa_public_parts(&public).unwrap();
        let key = RsaPublicKey::new(
            BigUint::from_bytes_be(&parts.modulus),
            BigUint::from_bytes_be(&parts.public_exponent),
        )
        .expect("exported components do not form a valid key");

        let digest = Sha256::digest(data);
        key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
            .expect("signature does not verify under the exported key");

        session.close().unwrap();
        module.unload().unwrap();
    }

    pub(crate) fn test_encrypt_with_public_decrypt_with_private(module: impl TokenModule) {
        let session = open(&module);
        session.login(&Pin::new(CONTRACT_PIN)).expect("login failed");

        let public = session
            .find_key(KeyClass::Public, CONTRACT_LABEL)
            .unwrap()
            .expect("labeled public key missing");
        let private = session
            .find_key(KeyClass::Private, CONTRACT_LABEL)
            .unwrap()
            .expect("labeled private key missing");

        let plaintext = b"short secret";
        let ciphertext = session.encrypt(&public, plaintext).expect("encrypt failed");
        assert_ne!(&ciphertext[..], &plaintext[..]);

        let recovered = session.decrypt(&private, &ciphertext).expect("decrypt failed");
        assert_eq!(&recovered[..], &plaintext[..]);

        session.close().unwrap();
        module.unload().unwrap();
    }
}
