//! SubjectPublicKeyInfo assembly from raw RSA components
//!
//! The token exposes only the raw modulus and exponent of a key object. The
//! DER prefixes below are the fixed SubjectPublicKeyInfo and RSAPublicKey
//! framing for a 2048-bit modulus with a 3-byte exponent, which is the only
//! shape the supported tokens produce.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{AuthResult, CryptoError};
use crate::ports::RsaPublicParts;

/// SubjectPublicKeyInfo prefix: rsaEncryption OID, NULL parameters, and the
/// BIT STRING header for a 271-byte RSAPublicKey.
const SPKI_HEADER: [u8; 24] = [
    0x30, 0x82, 0x01, 0x22, 0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01,
    0x01, 0x01, 0x05, 0x00, 0x03, 0x82, 0x01, 0x0f, 0x00,
];

/// RSAPublicKey SEQUENCE and modulus INTEGER header, including the leading
/// zero byte that keeps the 2048-bit modulus positive.
const KEY_STRUCTURE_HEADER: [u8; 9] = [0x30, 0x82, 0x01, 0x0a, 0x02, 0x82, 0x01, 0x01, 0x00];

/// INTEGER header for the 3-byte public exponent.
const EXPONENT_TAG: [u8; 2] = [0x02, 0x03];

const MODULUS_LEN: usize = 256;
const EXPONENT_LEN: usize = 3;

const PEM_LINE_WIDTH: usize = 64;

/// Assemble a PEM `PUBLIC KEY` block from raw token components.
pub fn build_public_key_pem(parts: &RsaPublicParts) -> AuthResult<String> {
    if parts.modulus.len() != MODULUS_LEN {
        return Err(CryptoError::KeyExport {
            reason: format!(
                "unsupported modulus length {} (expected {MODULUS_LEN})",
                parts.modulus.len()
            ),
        }
        .into());
    }
    if parts.public_exponent.len() != EXPONENT_LEN {
        return Err(CryptoError::KeyExport {
            reason: format!(
                "unsupported exponent length {} (expected {EXPONENT_LEN})",
                parts.public_exponent.len()
            ),
        }
        .into());
    }

    let mut der = Vec::with_capacity(
        SPKI_HEADER.len() + KEY_STRUCTURE_HEADER.len() + MODULUS_LEN + EXPONENT_TAG.len()
            + EXPONENT_LEN,
    );
    der.extend_from_slice(&SPKI_HEADER);
    der.extend_from_slice(&KEY_STRUCTURE_HEADER);
    der.extend_from_slice(&parts.modulus);
    der.extend_from_slice(&EXPONENT_TAG);
    der.extend_from_slice(&parts.public_exponent);

    Ok(wrap_pem(&BASE64.encode(der)))
}

fn wrap_pem(base64: &str) -> String {
    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    let mut rest = base64;
    while rest.len() > PEM_LINE_WIDTH {
        let (line, tail) = rest.split_at(PEM_LINE_WIDTH);
        pem.push_str(line);
        pem.push('\n');
        rest = tail;
    }
    if !rest.is_empty() {
        pem.push_str(rest);
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}
