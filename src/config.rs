//! Runtime configuration

use serde::{Deserialize, Serialize};

use crate::cipher::DEFAULT_KDF_ITERATIONS;
use crate::error::{ErrorCategory, ErrorKind, FileSealError, Result};

/// Tunables for a [`FileSeal`](crate::FileSeal) instance.
///
/// Deserializable so embedding applications can carry it in their own
/// configuration files; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// PBKDF2 iterations for every cipher segment. Envelopes can only be
    /// opened with the count they were sealed with; the format itself does
    /// not record it.
    pub kdf_iterations: u32,

    /// Flush and fsync the temp file before the renames of an in-place
    /// file operation.
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            sync_writes: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.kdf_iterations == 0 {
            return Err(FileSealError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidConfig,
                "kdf_iterations must be >= 1",
            ));
        }
        Ok(())
    }
}
