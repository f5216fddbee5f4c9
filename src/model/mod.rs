mod mechanism;
mod pin;
mod slot_info;
mod token_id;
mod verification;

pub use mechanism::SignatureMechanism;
pub use pin::Pin;
pub use slot_info::SlotDescriptor;
pub use token_id::TokenId;
pub use verification::{VerificationDetails, VerificationResult};
