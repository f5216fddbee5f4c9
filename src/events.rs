//! Events raised to subscribers
//!
//! Subscribers are registered explicitly on the manager and the monitor at
//! construction, keeping the subsystem independent of any UI transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{TokenId, VerificationResult};

/// Events raised by the session manager and the device monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum AuthEvent {
    #[serde(rename_all = "camelCase")]
    TokenConnected {
        vendor_id: u16,
        product_id: u16,
        connected: bool,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    TokenDisconnected {
        vendor_id: u16,
        product_id: u16,
        connected: bool,
        timestamp: DateTime<Utc>,
    },
    TokenVerificationResult {
        #[serde(flatten)]
        result: VerificationResult,
    },
}

impl AuthEvent {
    pub fn connected(id: TokenId) -> Self {
        AuthEvent::TokenConnected {
            vendor_id: id.vendor_id,
            product_id: id.product_id,
            connected: true,
            timestamp: Utc::now(),
        }
    }

    pub fn disconnected(id: TokenId) -> Self {
        AuthEvent::TokenDisconnected {
            vendor_id: id.vendor_id,
            product_id: id.product_id,
            connected: false,
            timestamp: Utc::now(),
        }
    }

    pub fn verification(result: VerificationResult) -> Self {
        AuthEvent::TokenVerificationResult { result }
    }
}

/// Observer notified of [`AuthEvent`]s.
///
/// Implementations must be cheap and non-blocking; events are delivered
/// synchronously from the emitting component.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &AuthEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_names() {
        let event = AuthEvent::connected(TokenId::new(0x096e, 0x0703));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "token-connected");
        assert_eq!(json["vendorId"], 0x096e);
        assert_eq!(json["productId"], 0x0703);
        assert_eq!(json["connected"], true);
        assert!(json["timestamp"].is_string());

        let event = AuthEvent::disconnected(TokenId::new(1, 2));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "token-disconnected");
        assert_eq!(json["connected"], false);
    }

    #[test]
    fn test_verification_event_flattens_result() {
        let result = VerificationResult::rejected("no driver", "driver missing", None);
        let event = AuthEvent::verification(result);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "token-verification-result");
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "no driver");
    }
}
