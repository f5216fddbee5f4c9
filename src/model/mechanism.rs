use std::fmt;

/// Signature mechanism used for the challenge-response protocol.
///
/// The token digests the challenge with SHA-256 and signs with RSA PKCS#1
/// v1.5 padding; local verification uses the same scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureMechanism {
    #[default]
    Sha256RsaPkcs,
}

impl fmt::Display for SignatureMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureMechanism::Sha256RsaPkcs => write!(f, "SHA256-RSA-PKCS"),
        }
    }
}
