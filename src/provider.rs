//! Public operations on envelopes and files

use std::path::Path;

use rand::rngs::OsRng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::cipher::CipherEngine;
use crate::config::Config;
use crate::entropy::EntropySource;
use crate::envelope;
use crate::error::{ErrorKind, FileSealError, Result};
use crate::file_ops::{self, Direction};
use crate::metadata;

/// Encrypts content together with a metadata value, in memory or in
/// place on disk.
///
/// Content that is not an envelope passes through the decrypting
/// operations unchanged, with default metadata.
#[derive(Debug, Clone)]
pub struct FileSeal<E = OsRng> {
    engine: CipherEngine,
    config: Config,
    entropy: E,
}

impl FileSeal<OsRng> {
    /// Default configuration, operating system randomness.
    pub fn new() -> Self {
        Self {
            engine: CipherEngine::default(),
            config: Config::default(),
            entropy: OsRng,
        }
    }

    pub fn with_config(config: Config) -> Result<Self> {
        Self::with_entropy(config, OsRng)
    }
}

impl Default for FileSeal<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntropySource> FileSeal<E> {
    /// Draw salts and IVs from `entropy` instead of the operating system.
    pub fn with_entropy(config: Config, entropy: E) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: CipherEngine::new(config.kdf_iterations),
            config,
            entropy,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Encrypt `content` into an envelope carrying `metadata`
    ///
    /// With `encrypt_metadata` the metadata is protected by the same
    /// password; otherwise anyone can read it with [`FileSeal::metadata`].
    pub fn encrypt<M>(
        &self,
        metadata: Option<&M>,
        content: &[u8],
        password: &str,
        encrypt_metadata: bool,
    ) -> Result<Vec<u8>>
    where
        M: Serialize + ?Sized,
    {
        let metadata = metadata::to_json_bytes(metadata)?;
        envelope::build(
            &self.engine,
            &self.entropy,
            &metadata,
            encrypt_metadata,
            content,
            password,
        )
    }

    /// Decrypt an envelope into its content and metadata.
    pub fn decrypt<M>(&self, content: &[u8], password: &str) -> Result<(Vec<u8>, M)>
    where
        M: DeserializeOwned + Default,
    {
        let Some(parsed) = envelope::parse(content)? else {
            debug!(len = content.len(), "not an envelope; passing content through");
            return Ok((content.to_vec(), M::default()));
        };

        let metadata =
            metadata::resolve_segment(&self.engine, parsed.metadata_segment(), Some(password))?;
        let plaintext = self
            .engine
            .decrypt(password, parsed.payload_segment())
            .map_err(|e| {
                if e.is(ErrorKind::CryptoFailure) {
                    FileSealError::wrong_password("wrong password provided", password)
                } else {
                    e.with_context("failed to decrypt content")
                }
            })?;

        debug!(
            envelope_len = content.len(),
            content_len = plaintext.len(),
            "envelope decrypted"
        );
        Ok((plaintext, metadata))
    }

    /// Decrypt an envelope, discarding its metadata.
    pub fn decrypt_content(&self, content: &[u8], password: &str) -> Result<Vec<u8>> {
        let (plaintext, _) = self.decrypt::<Value>(content, password)?;
        Ok(plaintext)
    }

    /// Replace the file at `path` with an envelope of its content.
    pub fn encrypt_file<M>(
        &self,
        metadata: Option<&M>,
        path: impl AsRef<Path>,
        password: &str,
        encrypt_metadata: bool,
    ) -> Result<()>
    where
        M: Serialize + ?Sized,
    {
        file_ops::apply(
            path.as_ref(),
            Direction::Encrypt,
            self.config.sync_writes,
            |original| self.encrypt(metadata, original, password, encrypt_metadata),
        )
    }

    /// Replace the envelope at `path` with its decrypted content and
    /// return the metadata it carried.
    pub fn decrypt_file<M>(&self, path: impl AsRef<Path>, password: &str) -> Result<M>
    where
        M: DeserializeOwned + Default,
    {
        let mut metadata = None;
        file_ops::apply(
            path.as_ref(),
            Direction::Decrypt,
            self.config.sync_writes,
            |original| {
                let (plaintext, resolved) = self.decrypt::<M>(original, password)?;
                metadata = Some(resolved);
                Ok(plaintext)
            },
        )?;
        Ok(metadata.unwrap_or_default())
    }

    /// Read the metadata of an envelope. `password` is only needed when
    /// the metadata is protected.
    pub fn metadata<M>(&self, content: &[u8], password: Option<&str>) -> Result<M>
    where
        M: DeserializeOwned + Default,
    {
        metadata::resolve(&self.engine, content, password)
    }

    /// Read the metadata of the envelope stored at `path`.
    pub fn file_metadata<M>(&self, path: impl AsRef<Path>, password: Option<&str>) -> Result<M>
    where
        M: DeserializeOwned + Default,
    {
        let content = file_ops::read_validated(path.as_ref())?;
        self.metadata(&content, password)
    }

    pub fn is_encrypted(&self, content: &[u8]) -> bool {
        envelope::is_envelope(content)
    }

    /// Only the leading magic bytes of the file are read.
    pub fn is_file_encrypted(&self, path: impl AsRef<Path>) -> Result<bool> {
        let prefix = file_ops::read_prefix(path.as_ref(), envelope::MAGIC.len())?;
        Ok(envelope::is_envelope(&prefix))
    }
}
