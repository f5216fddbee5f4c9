use serde::{Deserialize, Serialize};

/// Descriptor of one hardware slot, as reported by `test_driver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDescriptor {
    /// Native slot handle
    pub slot_id: u64,
    /// Slot description string from the driver
    pub description: String,
    /// Label of the token in the slot
    pub token_label: String,
    /// Whether the driver reports a token present in the slot
    pub token_present: bool,
}
