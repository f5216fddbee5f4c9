use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one challenge-response verification attempt.
///
/// Immutable once produced. This is the record the UI collaborator consumes;
/// field names follow the wire schema (`camelCase`, `errorCode` carrying the
/// raw vendor numeric code when one was reported).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub details: VerificationDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u64>,
}

/// Details attached to a verification result: the protocol evidence on
/// success, the raw error text on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerificationDetails {
    #[serde(rename_all = "camelCase")]
    Protocol {
        challenge_size: usize,
        signature_size: usize,
        public_key_match: bool,
        slot_description: String,
        driver_path: String,
    },
    Raw(String),
}

impl VerificationResult {
    pub fn verified(message: impl Into<String>, details: VerificationDetails) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp: Utc::now(),
            details,
            error_code: None,
        }
    }

    pub fn rejected(
        message: impl Into<String>,
        raw_error: impl Into<String>,
        error_code: Option<u64>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp: Utc::now(),
            details: VerificationDetails::Raw(raw_error.into()),
            error_code,
        }
    }

    /// True when the result carries successful protocol evidence.
    pub fn public_key_match(&self) -> bool {
        matches!(
            self.details,
            VerificationDetails::Protocol {
                public_key_match: true,
                ..
            }
        )
    }
}
