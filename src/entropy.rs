//! Random sources for salts and IVs

use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::error::{ErrorCategory, ErrorKind, FileSealError, Result};

/// Source of the random bytes drawn for every salt and IV.
///
/// Implementations must be cryptographically secure outside of tests.
pub trait EntropySource {
    /// Fill `dest` entirely with random bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// The operating system generator. It carries no state, so it is shared
/// without any locking.
impl EntropySource for OsRng {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(dest).map_err(|e| {
            FileSealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Entropy,
                "operating system random source failed",
                e,
            )
        })
    }
}

/// Any stateful cryptographic generator, typically a seeded one in tests.
impl<R> EntropySource for Mutex<R>
where
    R: RngCore + CryptoRng + Send,
{
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        let mut rng = self.lock().map_err(|_| {
            FileSealError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Entropy,
                "random source lock poisoned",
            )
        })?;
        rng.try_fill_bytes(dest).map_err(|e| {
            FileSealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Entropy,
                "random source failed",
                e,
            )
        })
    }
}

impl<E: EntropySource + ?Sized> EntropySource for &E {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        (**self).fill(dest)
    }
}
