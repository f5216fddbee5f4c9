//! Native driver resolution
//!
//! The vendor PKCS#11 module is looked up on the filesystem from a fixed
//! candidate list, highest priority first. The first path that exists wins.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{AuthResult, DriverError};

/// Resolves the native PKCS#11 driver path from a candidate list.
#[derive(Debug, Clone)]
pub struct DriverLocator {
    candidates: Vec<PathBuf>,
}

impl DriverLocator {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// First candidate that exists on disk.
    pub fn locate(&self) -> AuthResult<PathBuf> {
        for candidate in &self.candidates {
            if candidate.exists() {
                debug!(path = %candidate.display(), "resolved PKCS#11 driver");
                return Ok(candidate.clone());
            }
            debug!(path = %candidate.display(), "driver candidate not present");
        }
        Err(DriverError::NotFound {
            searched: self.candidates.clone(),
        }
        .into())
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }
}
