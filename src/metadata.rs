//! Metadata serialization and resolution
//!
//! Metadata is any `serde` value, stored as JSON. A stored segment is
//! either the JSON text itself or a cipher segment wrapping it, and the
//! envelope does not record which. Resolution therefore tries the segment
//! as plain JSON first and only falls back to decryption when that parse
//! fails.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;
use zeroize::Zeroizing;

use crate::cipher::CipherEngine;
use crate::envelope;
use crate::error::{ErrorCategory, ErrorKind, FileSealError, Result};

pub use crate::envelope::is_envelope;

/// Schema-less metadata for ad hoc use.
pub type MetadataMap = serde_json::Map<String, Value>;

/// Serialize metadata for storage. `None` is stored as JSON `null`.
pub fn to_json_bytes<M>(metadata: Option<&M>) -> Result<Vec<u8>>
where
    M: Serialize + ?Sized,
{
    match metadata {
        Some(metadata) => serde_json::to_vec(metadata).map_err(|e| {
            FileSealError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::MetadataFormat,
                "failed to serialize metadata",
                e,
            )
        }),
        None => Ok(b"null".to_vec()),
    }
}

/// Parse a stored segment as plain JSON, or `None` if it is not JSON and
/// so must be a protected segment.
pub fn parse_as_plain_metadata(segment: &[u8]) -> Option<Value> {
    serde_json::from_slice(segment).ok()
}

/// Resolve the metadata of `data`
///
/// Content that is not an envelope has no metadata and resolves to
/// `M::default()`.
pub fn resolve<M>(engine: &CipherEngine, data: &[u8], password: Option<&str>) -> Result<M>
where
    M: DeserializeOwned + Default,
{
    match envelope::parse(data)? {
        Some(parsed) => resolve_segment(engine, parsed.metadata_segment(), password),
        None => Ok(M::default()),
    }
}

/// Resolve a stored metadata segment to a typed value
///
/// A protected segment needs a non-empty password; an empty password is
/// treated as missing.
pub fn resolve_segment<M>(engine: &CipherEngine, segment: &[u8], password: Option<&str>) -> Result<M>
where
    M: DeserializeOwned + Default,
{
    if let Some(value) = parse_as_plain_metadata(segment) {
        trace!(segment_len = segment.len(), "metadata stored as plain JSON");
        return from_json_value(value);
    }

    let password = password.filter(|p| !p.is_empty()).ok_or_else(|| {
        FileSealError::password_required("metadata is encrypted; a password is required but missing")
    })?;

    let decrypted = engine
        .decrypt(password, segment)
        .map(Zeroizing::new)
        .map_err(|e| {
            if e.is(ErrorKind::CryptoFailure) {
                FileSealError::wrong_password("unable to read metadata from cipher", password)
            } else {
                e.with_context("failed to decrypt metadata")
            }
        })?;
    trace!(segment_len = segment.len(), "metadata decrypted");

    // Padding alone passes for roughly one wrong password in 256; the
    // garbage it yields is not JSON.
    let value = parse_as_plain_metadata(&decrypted).ok_or_else(|| {
        FileSealError::wrong_password("unable to read metadata from cipher", password)
    })?;
    from_json_value(value)
}

/// `null` stands for "no metadata" and becomes the type's default.
fn from_json_value<M>(value: Value) -> Result<M>
where
    M: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(M::default());
    }
    serde_json::from_value(value).map_err(|e| {
        FileSealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::MetadataFormat,
            "stored metadata does not match the requested type",
            e,
        )
    })
}
