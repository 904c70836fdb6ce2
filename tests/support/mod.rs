//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Mutex;

use fileseal::{Config, FileSeal};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Counts upward from `next`, one byte at a time, wrapping at 256.
///
/// Salts and IVs drawn from it are fully predictable, so envelopes built
/// with it can be compared against precomputed bytes.
#[derive(Debug, Clone)]
pub struct SequenceRng {
    next: u8,
}

impl SequenceRng {
    pub fn starting_at(next: u8) -> Self {
        Self { next }
    }
}

impl RngCore for SequenceRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for byte in dest {
            *byte = self.next;
            self.next = self.next.wrapping_add(1);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

// Test-only: predictable by construction.
impl CryptoRng for SequenceRng {}

/// A sealer whose salts and IVs come from a [`SequenceRng`].
pub fn sequence_seal(start: u8) -> FileSeal<Mutex<SequenceRng>> {
    FileSeal::with_entropy(Config::default(), Mutex::new(SequenceRng::starting_at(start)))
        .expect("default config is valid")
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
    pub revision: u32,
}

pub fn note() -> Note {
    Note {
        title: "quarterly report".into(),
        revision: 3,
    }
}

pub const CONTENT: &[u8] = b"The quick brown fox jumps over the lazy dog";
pub const PASSWORD: &str = "correct horse";

/// Passwords known to fail padding for envelopes built by
/// `sequence_seal(0)` from [`note`] and [`CONTENT`] under [`PASSWORD`].
pub const WRONG_PASSWORDS: [&str; 3] = ["battery staple", "Correct horse", "correct horse "];
