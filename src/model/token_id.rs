use std::fmt;

use serde::{Deserialize, Serialize};

/// USB vendor/product identity of a hardware token.
///
/// This is the key of the connected-token set and the unit of the allow-list.
/// Two physically distinct tokens of the same model share a `TokenId`; the
/// monitor cannot tell them apart. Accepted limitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl TokenId {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}
