//! Password-based encryption of byte blobs
//!
//! This module implements the cipher segment used for both protected
//! metadata and payloads:
//! - PBKDF2-HMAC-SHA1 derives a 256-bit key from the password and salt
//! - Rijndael with a 256-bit block, CBC mode, PKCS#7 padding
//!
//! The binary format is:
//! - salt: 32 bytes
//! - iv: 32 bytes
//! - ciphertext: variable length, a positive multiple of 32 bytes
//!
//! There is no authentication tag. A wrong password is detected only
//! when the padding of the final block fails validation, which is an
//! oracle an attacker can query. The format is kept as-is for
//! compatibility with existing envelopes.

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use tracing::trace;
use zeroize::{Zeroize, Zeroizing};

use crate::entropy::EntropySource;
use crate::error::{ErrorCategory, ErrorKind, FileSealError, Result};
use crate::rijndael::Rijndael;

/// Length of salt in bytes
pub const SALT_LEN: usize = 32;

/// Length of IV in bytes; equal to the block length
pub const IV_LEN: usize = 32;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// Cipher block length in bytes
pub const BLOCK_LEN: usize = 32;

/// Bytes preceding the ciphertext in every cipher segment
pub const PREFIX_LEN: usize = SALT_LEN + IV_LEN;

/// PBKDF2 iteration count of the envelope format
pub const DEFAULT_KDF_ITERATIONS: u32 = 1000;

/// Encrypts and decrypts cipher segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherEngine {
    iterations: u32,
}

impl Default for CipherEngine {
    fn default() -> Self {
        Self::new(DEFAULT_KDF_ITERATIONS)
    }
}

impl CipherEngine {
    /// Segments are only readable by an engine using the same iteration count.
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, self.iterations, &mut key[..]);
        key
    }

    fn keyed_cipher(&self, password: &str, salt: &[u8]) -> Result<Rijndael> {
        let key = self.derive_key(password, salt);
        Rijndael::new(&key[..], BLOCK_LEN)
    }

    /// Encrypt plaintext with a password using a fresh random salt and IV
    ///
    /// Returns the binary format: salt(32) + iv(32) + ciphertext(variable)
    pub fn encrypt<E>(&self, entropy: &E, password: &str, plaintext: &[u8]) -> Result<Vec<u8>>
    where
        E: EntropySource + ?Sized,
    {
        let mut salt = [0u8; SALT_LEN];
        entropy.fill(&mut salt)?;

        let mut iv = [0u8; IV_LEN];
        entropy.fill(&mut iv)?;

        self.seal(password, plaintext, &salt, &iv)
    }

    /// Encrypt plaintext with a password using the provided salt and IV
    ///
    /// Output is fully determined by the inputs. Reusing a salt/IV pair
    /// for different plaintexts leaks information; outside of known-answer
    /// tests use `encrypt()`, which draws both from an entropy source.
    pub fn seal(
        &self,
        password: &str,
        plaintext: &[u8],
        salt: &[u8; SALT_LEN],
        iv: &[u8; IV_LEN],
    ) -> Result<Vec<u8>> {
        let cipher = self.keyed_cipher(password, salt)?;

        let pad = BLOCK_LEN - plaintext.len() % BLOCK_LEN;
        let mut output = Vec::with_capacity(PREFIX_LEN + plaintext.len() + pad);
        output.extend_from_slice(salt);
        output.extend_from_slice(iv);
        output.extend_from_slice(plaintext);
        output.resize(output.len() + pad, pad as u8);

        let mut chain = *iv;
        for block in output[PREFIX_LEN..].chunks_exact_mut(BLOCK_LEN) {
            xor_in_place(block, &chain);
            cipher.encrypt_block(block);
            chain.copy_from_slice(block);
        }

        trace!(
            plaintext_len = plaintext.len(),
            segment_len = output.len(),
            "sealed cipher segment"
        );
        Ok(output)
    }

    /// Decrypt a cipher segment with a password
    ///
    /// Fails with `ErrorKind::CryptoFailure` only when the padding is
    /// invalid, which is what a wrong password looks like. A ciphertext that
    /// is empty or not block aligned was cut short or corrupted and fails
    /// with `ErrorKind::TruncatedInput` before any key is derived.
    pub fn decrypt(&self, password: &str, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < PREFIX_LEN {
            return Err(FileSealError::with_kind(
                ErrorCategory::User,
                ErrorKind::TruncatedInput,
                "input likely truncated while reading salt and IV",
            ));
        }
        let (salt, rest) = blob.split_at(SALT_LEN);
        let (iv, ciphertext) = rest.split_at(IV_LEN);

        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(FileSealError::with_kind(
                ErrorCategory::User,
                ErrorKind::TruncatedInput,
                format!(
                    "truncated or corrupt input; ciphertext length {} is not a positive multiple of the {}-byte block",
                    ciphertext.len(),
                    BLOCK_LEN
                ),
            ));
        }

        let cipher = self.keyed_cipher(password, salt)?;

        let mut plaintext = ciphertext.to_vec();
        let mut chain = [0u8; BLOCK_LEN];
        chain.copy_from_slice(iv);
        for block in plaintext.chunks_exact_mut(BLOCK_LEN) {
            let mut saved = [0u8; BLOCK_LEN];
            saved.copy_from_slice(block);
            cipher.decrypt_block(block);
            xor_in_place(block, &chain);
            chain = saved;
        }

        match padding_len(&plaintext) {
            Some(pad) => {
                plaintext.truncate(plaintext.len() - pad);
                Ok(plaintext)
            }
            None => {
                plaintext.zeroize();
                Err(FileSealError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::CryptoFailure,
                    "invalid padding: wrong password or corrupted data",
                ))
            }
        }
    }
}

fn xor_in_place(block: &mut [u8], other: &[u8; BLOCK_LEN]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}

/// Returns the PKCS#7 padding length if the padding is well-formed.
fn padding_len(plaintext: &[u8]) -> Option<usize> {
    let pad = *plaintext.last()? as usize;
    if pad == 0 || pad > BLOCK_LEN || pad > plaintext.len() {
        return None;
    }
    plaintext[plaintext.len() - pad..]
        .iter()
        .all(|&b| b as usize == pad)
        .then_some(pad)
}
