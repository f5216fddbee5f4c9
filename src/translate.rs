//! Vendor error translation
//!
//! Maps vendor-specific numeric error codes, and as a fallback substrings of
//! the error text, to a small set of user-facing messages. This is a
//! best-effort heuristic layer over an open-ended vendor error space, not an
//! exhaustive mapping: unknown codes are surfaced with their hex value and
//! the raw text.

use crate::error::AuthError;

/// Vendor numeric codes with a fixed message mapping.
pub mod codes {
    pub const PIN_INCORRECT: u64 = 0x0000_00a0;
    pub const PIN_INVALID: u64 = 0x0000_00a1;
    pub const PIN_LEN_RANGE: u64 = 0x0000_00a2;
    pub const DEVICE_COMMUNICATION: u64 = 0x0000_00e0;
    pub const TOKEN_NOT_FOUND: u64 = 0x0000_00e1;
    pub const INVALID_SLOT: u64 = 0x0000_0003;
}

/// A vendor error translated for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedError {
    pub message: String,
    pub code: Option<u64>,
}

/// Translate an error into a user-facing message.
///
/// When the error carries a vendor numeric code the fixed table decides;
/// otherwise the message text is matched case-insensitively against a few
/// keywords to pick a category.
pub fn translate(err: &AuthError) -> TranslatedError {
    let raw = err.to_string();
    match err.vendor_code() {
        Some(code) => TranslatedError {
            message: message_for_code(code, &raw),
            code: Some(code),
        },
        None => TranslatedError {
            message: message_for_text(&raw),
            code: None,
        },
    }
}

fn message_for_code(code: u64, raw: &str) -> String {
    match code {
        codes::PIN_INCORRECT => "The PIN you entered is incorrect.".to_string(),
        codes::PIN_INVALID => "The PIN is invalid.".to_string(),
        codes::PIN_LEN_RANGE => "The PIN length is out of the allowed range.".to_string(),
        codes::DEVICE_COMMUNICATION => {
            "Error communicating with the token device. Please reconnect it.".to_string()
        }
        codes::TOKEN_NOT_FOUND => "Token not found. Please connect it.".to_string(),
        codes::INVALID_SLOT => "The slot identifier is invalid.".to_string(),
        _ => format!("PKCS#11 error 0x{code:x}: {raw}"),
    }
}

fn message_for_text(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains("pin") {
        "There is a problem with the token PIN.".to_string()
    } else if lower.contains("token") {
        "There is a problem with the security token.".to_string()
    } else if lower.contains("driver") || lower.contains("library") {
        "There is a problem with the token driver.".to_string()
    } else if lower.contains("slot") {
        "There is a problem with the token slot.".to_string()
    } else {
        format!("Security error: {raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoginFailureKind, TokenError};

    fn vendor(code: u64, message: &str) -> AuthError {
        AuthError::Token(TokenError::Vendor {
            code: Some(code),
            message: message.to_string(),
        })
    }

    #[test]
    fn test_pin_incorrect_code_wins_over_text() {
        // The code decides regardless of the accompanying raw text.
        let translated = translate(&vendor(codes::PIN_INCORRECT, "something about the driver"));
        assert_eq!(translated.message, "The PIN you entered is incorrect.");
        assert_eq!(translated.code, Some(0xa0));
    }

    #[test]
    fn test_fixed_code_table() {
        for (code, expect) in [
            (codes::PIN_INVALID, "The PIN is invalid."),
            (
                codes::PIN_LEN_RANGE,
                "The PIN length is out of the allowed range.",
            ),
            (
                codes::DEVICE_COMMUNICATION,
                "Error communicating with the token device. Please reconnect it.",
            ),
            (codes::TOKEN_NOT_FOUND, "Token not found. Please connect it."),
            (codes::INVALID_SLOT, "The slot identifier is invalid."),
        ] {
            assert_eq!(translate(&vendor(code, "raw")).message, expect);
        }
    }

    #[test]
    fn test_unknown_code_formats_hex() {
        let translated = translate(&vendor(0x1234, "CKR_MECHANISM_INVALID"));
        assert_eq!(
            translated.message,
            "PKCS#11 error 0x1234: token error: vendor error: CKR_MECHANISM_INVALID"
        );
        assert_eq!(translated.code, Some(0x1234));
    }

    #[test]
    fn test_login_failure_maps_through_its_code() {
        let err = AuthError::Token(TokenError::Login {
            kind: LoginFailureKind::IncorrectPin,
            code: Some(codes::PIN_INCORRECT),
            reason: "CKR_PIN_INCORRECT".to_string(),
        });
        assert_eq!(translate(&err).message, "The PIN you entered is incorrect.");
    }

    #[test]
    fn test_substring_fallback_categories() {
        let err = AuthError::Token(TokenError::NoTokenPresent);
        assert_eq!(
            translate(&err).message,
            "There is a problem with the security token."
        );

        let err = AuthError::Driver(crate::error::DriverError::NotFound {
            searched: Vec::new(),
        });
        assert_eq!(
            translate(&err).message,
            "There is a problem with the token driver."
        );
        assert_eq!(translate(&err).code, None);
    }

    #[test]
    fn test_generic_fallback_wraps_raw_text() {
        let err = AuthError::Crypto(crate::error::CryptoError::SignFailed {
            reason: "mechanism rejected".to_string(),
        });
        let translated = translate(&err);
        assert!(translated.message.starts_with("Security error: "));
        assert!(translated.message.contains("mechanism rejected"));
    }
}
