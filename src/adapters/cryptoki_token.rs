//! PKCS#11 adapter over the cryptoki crate
//!
//! Binds the token ports to a vendor native module. All cryptoki errors are
//! mapped at this boundary into the crate's error types, with the numeric
//! return value preserved so callers and the message translation layer can
//! still see the raw code.

use std::path::Path;

use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::error::{Error as CkError, RvError};
use cryptoki::mechanism::Mechanism;
use cryptoki::object::{Attribute, AttributeType, ObjectClass, ObjectHandle};
use cryptoki::session::{Session, UserType};
use cryptoki::types::AuthPin;
use tracing::debug;

use crate::error::{AuthError, AuthResult, DriverError, LoginFailureKind, TokenError};
use crate::model::{Pin, SignatureMechanism, SlotDescriptor};
use crate::ports::{KeyClass, RsaPublicParts, TokenModule, TokenProvider, TokenSession};

/// Provider backed by the system's PKCS#11 implementation.
#[derive(Debug, Clone, Default)]
pub struct CryptokiProvider;

impl CryptokiProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TokenProvider for CryptokiProvider {
    type Module = CryptokiModule;

    fn is_available(&self) -> bool {
        true
    }

    fn load_module(&self, path: &Path) -> AuthResult<Self::Module> {
        let ctx = Pkcs11::new(path).map_err(|e| DriverError::ModuleLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        match ctx.initialize(CInitializeArgs::OsThreads) {
            Ok(()) | Err(CkError::AlreadyInitialized) => {}
            Err(e) => {
                return Err(DriverError::ModuleLoad {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
                .into())
            }
        }
        debug!(path = %path.display(), "PKCS#11 module initialized");
        Ok(CryptokiModule { ctx })
    }
}

/// A loaded PKCS#11 module. Finalization happens on drop.
#[derive(Debug)]
pub struct CryptokiModule {
    ctx: Pkcs11,
}

impl TokenModule for CryptokiModule {
    type Session = CryptokiSession;

    fn slots(&self) -> AuthResult<Vec<SlotDescriptor>> {
        let slots = self.ctx.get_slots_with_token().map_err(map_pkcs11_err)?;
        let mut descriptors = Vec::with_capacity(slots.len());
        for slot in slots {
            let slot_info = self.ctx.get_slot_info(slot).map_err(map_pkcs11_err)?;
            let token_info = self.ctx.get_token_info(slot).map_err(map_pkcs11_err)?;
            descriptors.push(SlotDescriptor {
                slot_id: slot.id(),
                description: slot_info.slot_description().trim_end().to_string(),
                token_label: token_info.label().trim_end().to_string(),
                token_present: true,
            });
        }
        Ok(descriptors)
    }

    fn open_session(&self, slot_index: usize, read_write: bool) -> AuthResult<Self::Session> {
        let slots = self.ctx.get_slots_with_token().map_err(map_pkcs11_err)?;
        let slot = slots
            .get(slot_index)
            .copied()
            .ok_or(TokenError::InvalidSlot { code: Some(0x03) })?;
        let session = if read_write {
            self.ctx.open_rw_session(slot)
        } else {
            self.ctx.open_ro_session(slot)
        }
        .map_err(map_pkcs11_err)?;
        Ok(CryptokiSession { session })
    }

    fn unload(self) -> AuthResult<()> {
        // Drop of the Pkcs11 context finalizes the native module.
        drop(self);
        Ok(())
    }
}

/// An open cryptoki session.
pub struct CryptokiSession {
    session: Session,
}

impl TokenSession for CryptokiSession {
    type Key = ObjectHandle;

    fn login(&self, pin: &Pin) -> AuthResult<()> {
        let auth_pin = AuthPin::new(pin.as_str().to_string());
        match self.session.login(UserType::User, Some(&auth_pin)) {
            Ok(()) | Err(CkError::Pkcs11(RvError::UserAlreadyLoggedIn, _)) => Ok(()),
            Err(e) => Err(map_pkcs11_err(e)),
        }
    }

    fn logout(&self) -> AuthResult<()> {
        match self.session.logout() {
            Ok(()) | Err(CkError::Pkcs11(RvError::UserNotLoggedIn, _)) => Ok(()),
            Err(e) => Err(map_pkcs11_err(e)),
        }
    }

    fn find_key(&self, class: KeyClass, label: &str) -> AuthResult<Option<Self::Key>> {
        let template = [
            Attribute::Class(object_class(class)),
            Attribute::Label(label.as_bytes().to_vec()),
        ];
        let objects = self.session.find_objects(&template).map_err(map_pkcs11_err)?;
        Ok(objects.first().copied())
    }

    fn first_key(&self, class: KeyClass) -> AuthResult<Option<Self::Key>> {
        let template = [Attribute::Class(object_class(class))];
        let objects = self.session.find_objects(&template).map_err(map_pkcs11_err)?;
        Ok(objects.first().copied())
    }

    fn sign(
        &self,
        key: &Self::Key,
        mechanism: SignatureMechanism,
        data: &[u8],
    ) -> AuthResult<Vec<u8>> {
        let mechanism = match mechanism {
            SignatureMechanism::Sha256RsaPkcs => Mechanism::Sha256RsaPkcs,
        };
        self.session
            .sign(&mechanism, *key, data)
            .map_err(map_pkcs11_err)
    }

    fn rsa_public_parts(&self, key: &Self::Key) -> AuthResult<RsaPublicParts> {
        let attributes = self
            .session
            .get_attributes(*key, &[AttributeType::Modulus, AttributeType::PublicExponent])
            .map_err(map_pkcs11_err)?;
        let mut modulus = None;
        let mut public_exponent = None;
        for attribute in attributes {
            match attribute {
                Attribute::Modulus(bytes) => modulus = Some(bytes),
                Attribute::PublicExponent(bytes) => public_exponent = Some(bytes),
                _ => {}
            }
        }
        match (modulus, public_exponent) {
            (Some(modulus), Some(public_exponent)) => Ok(RsaPublicParts {
                modulus,
                public_exponent,
            }),
            _ => Err(TokenError::Vendor {
                code: None,
                message: "key object does not expose RSA public components".to_string(),
            }
            .into()),
        }
    }

    fn encrypt(&self, key: &Self::Key, data: &[u8]) -> AuthResult<Vec<u8>> {
        self.session
            .encrypt(&Mechanism::RsaPkcs, *key, data)
            .map_err(map_pkcs11_err)
    }

    fn decrypt(&self, key: &Self::Key, data: &[u8]) -> AuthResult<Vec<u8>> {
        self.session
            .decrypt(&Mechanism::RsaPkcs, *key, data)
            .map_err(map_pkcs11_err)
    }

    fn close(self) -> AuthResult<()> {
        // Drop of the Session closes it.
        drop(self);
        Ok(())
    }
}

fn object_class(class: KeyClass) -> ObjectClass {
    match class {
        KeyClass::Private => ObjectClass::PRIVATE_KEY,
        KeyClass::Public => ObjectClass::PUBLIC_KEY,
    }
}

/// Map a cryptoki error. Every decoded return value keeps its numeric code;
/// the codes with a fixed meaning for the supported tokens get a dedicated
/// classification, the rest fall through as vendor errors.
fn map_pkcs11_err(e: CkError) -> AuthError {
    match e {
        CkError::Pkcs11(rv, function) => {
            let reason = format!("{rv:?} in {function:?}");
            let token_err = match rv {
                RvError::PinIncorrect => TokenError::Login {
                    kind: LoginFailureKind::IncorrectPin,
                    code: Some(0xa0),
                    reason,
                },
                RvError::PinInvalid => TokenError::Login {
                    kind: LoginFailureKind::InvalidPin,
                    code: Some(0xa1),
                    reason,
                },
                RvError::PinLenRange => TokenError::Login {
                    kind: LoginFailureKind::PinLenRange,
                    code: Some(0xa2),
                    reason,
                },
                RvError::TokenNotPresent | RvError::TokenNotRecognized => TokenError::Vendor {
                    code: Some(0xe1),
                    message: reason,
                },
                RvError::DeviceError | RvError::DeviceRemoved => TokenError::DeviceCommunication {
                    code: Some(0xe0),
                    reason,
                },
                RvError::SlotIdInvalid => TokenError::InvalidSlot { code: Some(0x03) },
                other => TokenError::Vendor {
                    code: Some(rv_code(other)),
                    message: reason,
                },
            };
            token_err.into()
        }
        other => TokenError::Vendor {
            code: None,
            message: other.to_string(),
        }
        .into(),
    }
}

/// Numeric `CK_RV` for a decoded return value. The binding only hands out
/// the decoded enum, so the table from the PKCS#11 header is restated here
/// for the codes the classification above does not already pin down.
fn rv_code(rv: RvError) -> u64 {
    use cryptoki_sys::*;
    let code = match rv {
        RvError::Cancel => CKR_CANCEL,
        RvError::HostMemory => CKR_HOST_MEMORY,
        RvError::SlotIdInvalid => CKR_SLOT_ID_INVALID,
        RvError::GeneralError => CKR_GENERAL_ERROR,
        RvError::FunctionFailed => CKR_FUNCTION_FAILED,
        RvError::ArgumentsBad => CKR_ARGUMENTS_BAD,
        RvError::NoEvent => CKR_NO_EVENT,
        RvError::NeedToCreateThreads => CKR_NEED_TO_CREATE_THREADS,
        RvError::CantLock => CKR_CANT_LOCK,
        RvError::AttributeReadOnly => CKR_ATTRIBUTE_READ_ONLY,
        RvError::AttributeSensitive => CKR_ATTRIBUTE_SENSITIVE,
        RvError::AttributeTypeInvalid => CKR_ATTRIBUTE_TYPE_INVALID,
        RvError::AttributeValueInvalid => CKR_ATTRIBUTE_VALUE_INVALID,
        RvError::ActionProhibited => CKR_ACTION_PROHIBITED,
        RvError::DataInvalid => CKR_DATA_INVALID,
        RvError::DataLenRange => CKR_DATA_LEN_RANGE,
        RvError::DeviceError => CKR_DEVICE_ERROR,
        RvError::DeviceMemory => CKR_DEVICE_MEMORY,
        RvError::DeviceRemoved => CKR_DEVICE_REMOVED,
        RvError::EncryptedDataInvalid => CKR_ENCRYPTED_DATA_INVALID,
        RvError::EncryptedDataLenRange => CKR_ENCRYPTED_DATA_LEN_RANGE,
        RvError::FunctionCanceled => CKR_FUNCTION_CANCELED,
        RvError::FunctionNotParallel => CKR_FUNCTION_NOT_PARALLEL,
        RvError::FunctionNotSupported => CKR_FUNCTION_NOT_SUPPORTED,
        RvError::CurveNotSupported => CKR_CURVE_NOT_SUPPORTED,
        RvError::KeyHandleInvalid => CKR_KEY_HANDLE_INVALID,
        RvError::KeySizeRange => CKR_KEY_SIZE_RANGE,
        RvError::KeyTypeInconsistent => CKR_KEY_TYPE_INCONSISTENT,
        RvError::KeyNotNeeded => CKR_KEY_NOT_NEEDED,
        RvError::KeyChanged => CKR_KEY_CHANGED,
        RvError::KeyNeeded => CKR_KEY_NEEDED,
        RvError::KeyIndigestible => CKR_KEY_INDIGESTIBLE,
        RvError::KeyFunctionNotPermitted => CKR_KEY_FUNCTION_NOT_PERMITTED,
        RvError::KeyNotWrappable => CKR_KEY_NOT_WRAPPABLE,
        RvError::KeyUnextractable => CKR_KEY_UNEXTRACTABLE,
        RvError::MechanismInvalid => CKR_MECHANISM_INVALID,
        RvError::MechanismParamInvalid => CKR_MECHANISM_PARAM_INVALID,
        RvError::ObjectHandleInvalid => CKR_OBJECT_HANDLE_INVALID,
        RvError::OperationActive => CKR_OPERATION_ACTIVE,
        RvError::OperationNotInitialized => CKR_OPERATION_NOT_INITIALIZED,
        RvError::PinIncorrect => CKR_PIN_INCORRECT,
        RvError::PinInvalid => CKR_PIN_INVALID,
        RvError::PinLenRange => CKR_PIN_LEN_RANGE,
        RvError::PinExpired => CKR_PIN_EXPIRED,
        RvError::PinLocked => CKR_PIN_LOCKED,
        RvError::SessionClosed => CKR_SESSION_CLOSED,
        RvError::SessionCount => CKR_SESSION_COUNT,
        RvError::SessionHandleInvalid => CKR_SESSION_HANDLE_INVALID,
        RvError::SessionParallelNotSupported => CKR_SESSION_PARALLEL_NOT_SUPPORTED,
        RvError::SessionReadOnly => CKR_SESSION_READ_ONLY,
        RvError::SessionExists => CKR_SESSION_EXISTS,
        RvError::SessionReadOnlyExists => CKR_SESSION_READ_ONLY_EXISTS,
        RvError::SessionReadWriteSoExists => CKR_SESSION_READ_WRITE_SO_EXISTS,
        RvError::SignatureInvalid => CKR_SIGNATURE_INVALID,
        RvError::SignatureLenRange => CKR_SIGNATURE_LEN_RANGE,
        RvError::TemplateIncomplete => CKR_TEMPLATE_INCOMPLETE,
        RvError::TemplateInconsistent => CKR_TEMPLATE_INCONSISTENT,
        RvError::TokenNotPresent => CKR_TOKEN_NOT_PRESENT,
        RvError::TokenNotRecognized => CKR_TOKEN_NOT_RECOGNIZED,
        RvError::TokenWriteProtected => CKR_TOKEN_WRITE_PROTECTED,
        RvError::UnwrappingKeyHandleInvalid => CKR_UNWRAPPING_KEY_HANDLE_INVALID,
        RvError::UnwrappingKeySizeRange => CKR_UNWRAPPING_KEY_SIZE_RANGE,
        RvError::UnwrappingKeyTypeInconsistent => CKR_UNWRAPPING_KEY_TYPE_INCONSISTENT,
        RvError::UserAlreadyLoggedIn => CKR_USER_ALREADY_LOGGED_IN,
        RvError::UserNotLoggedIn => CKR_USER_NOT_LOGGED_IN,
        RvError::UserPinNotInitialized => CKR_USER_PIN_NOT_INITIALIZED,
        RvError::UserTypeInvalid => CKR_USER_TYPE_INVALID,
        RvError::UserAnotherAlreadyLoggedIn => CKR_USER_ANOTHER_ALREADY_LOGGED_IN,
        RvError::UserTooManyTypes => CKR_USER_TOO_MANY_TYPES,
        RvError::WrappedKeyInvalid => CKR_WRAPPED_KEY_INVALID,
        RvError::WrappedKeyLenRange => CKR_WRAPPED_KEY_LEN_RANGE,
        RvError::WrappingKeyHandleInvalid => CKR_WRAPPING_KEY_HANDLE_INVALID,
        RvError::WrappingKeySizeRange => CKR_WRAPPING_KEY_SIZE_RANGE,
        RvError::WrappingKeyTypeInconsistent => CKR_WRAPPING_KEY_TYPE_INCONSISTENT,
        RvError::RandomSeedNotSupported => CKR_RANDOM_SEED_NOT_SUPPORTED,
        RvError::RandomNoRng => CKR_RANDOM_NO_RNG,
        RvError::DomainParamsInvalid => CKR_DOMAIN_PARAMS_INVALID,
        RvError::BufferTooSmall => CKR_BUFFER_TOO_SMALL,
        RvError::SavedStateInvalid => CKR_SAVED_STATE_INVALID,
        RvError::InformationSensitive => CKR_INFORMATION_SENSITIVE,
        RvError::StateUnsaveable => CKR_STATE_UNSAVEABLE,
        RvError::CryptokiNotInitialized => CKR_CRYPTOKI_NOT_INITIALIZED,
        RvError::CryptokiAlreadyInitialized => CKR_CRYPTOKI_ALREADY_INITIALIZED,
        RvError::MutexBad => CKR_MUTEX_BAD,
        RvError::MutexNotLocked => CKR_MUTEX_NOT_LOCKED,
        RvError::NewPinMode => CKR_NEW_PIN_MODE,
        RvError::NextOtp => CKR_NEXT_OTP,
        RvError::ExceededMaxIterations => CKR_EXCEEDED_MAX_ITERATIONS,
        RvError::FipsSelfTestFailed => CKR_FIPS_SELF_TEST_FAILED,
        RvError::LibraryLoadFailed => CKR_LIBRARY_LOAD_FAILED,
        RvError::PinTooWeak => CKR_PIN_TOO_WEAK,
        RvError::PublicKeyInvalid => CKR_PUBLIC_KEY_INVALID,
        RvError::FunctionRejected => CKR_FUNCTION_REJECTED,
        RvError::VendorDefined => CKR_VENDOR_DEFINED,
    };
    code as u64
}
