//! Envelope framing
//!
//! The envelope format is:
//! - magic: 5 bytes, `FA 15 EC 0D E5`
//! - metadata segment: ASCII `MetaLength:`, the decimal byte length `N`,
//!   `|`, then `N` bytes of metadata (JSON text, or a cipher segment
//!   wrapping JSON text when the metadata is protected)
//! - payload: a cipher segment holding the encrypted content, running to
//!   the end of the input
//!
//! Nothing in the framing says whether the metadata is protected; see
//! [`crate::metadata`] for how that is resolved.

use std::borrow::Cow;

use tracing::debug;

use crate::cipher::CipherEngine;
use crate::entropy::EntropySource;
use crate::error::{ErrorCategory, ErrorKind, FileSealError, Result};

/// Every envelope starts with these bytes
pub const MAGIC: [u8; 5] = [0xFA, 0x15, 0xEC, 0x0D, 0xE5];

const META_TAG: &[u8] = b"MetaLength:";

const DELIMITER: u8 = b'|';

/// How far past the tag the length delimiter is searched for
const MAX_LENGTH_SCAN: usize = 200;

/// Returns true if `data` starts with the envelope magic.
pub fn is_envelope(data: &[u8]) -> bool {
    data.starts_with(&MAGIC)
}

/// Borrowed view of the two segments of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedEnvelope<'a> {
    metadata: &'a [u8],
    payload: &'a [u8],
    payload_offset: usize,
}

impl<'a> ParsedEnvelope<'a> {
    /// Stored metadata bytes: JSON text or a cipher segment.
    pub fn metadata_segment(&self) -> &'a [u8] {
        self.metadata
    }

    /// The payload cipher segment.
    pub fn payload_segment(&self) -> &'a [u8] {
        self.payload
    }

    /// Offset of the payload cipher segment within the envelope.
    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }
}

/// Build an envelope around `payload`
///
/// `metadata` is the serialized metadata. With `encrypt_metadata` it is
/// stored as its own cipher segment; otherwise it is stored verbatim. The
/// payload is always encrypted. Metadata and payload each draw their own
/// salt and IV, metadata first.
pub fn build<E>(
    engine: &CipherEngine,
    entropy: &E,
    metadata: &[u8],
    encrypt_metadata: bool,
    payload: &[u8],
    password: &str,
) -> Result<Vec<u8>>
where
    E: EntropySource + ?Sized,
{
    let metadata_segment = if encrypt_metadata {
        Cow::Owned(
            engine
                .encrypt(entropy, password, metadata)
                .map_err(|e| e.with_context("failed to encrypt metadata"))?,
        )
    } else {
        Cow::Borrowed(metadata)
    };
    let payload_segment = engine
        .encrypt(entropy, password, payload)
        .map_err(|e| e.with_context("failed to encrypt content"))?;

    let length = metadata_segment.len().to_string();
    let mut envelope = Vec::with_capacity(
        MAGIC.len()
            + META_TAG.len()
            + length.len()
            + 1
            + metadata_segment.len()
            + payload_segment.len(),
    );
    envelope.extend_from_slice(&MAGIC);
    envelope.extend_from_slice(META_TAG);
    envelope.extend_from_slice(length.as_bytes());
    envelope.push(DELIMITER);
    envelope.extend_from_slice(&metadata_segment);
    envelope.extend_from_slice(&payload_segment);

    debug!(
        metadata_len = metadata_segment.len(),
        protected_metadata = encrypt_metadata,
        envelope_len = envelope.len(),
        "built envelope"
    );
    Ok(envelope)
}

/// Split an envelope into its metadata and payload segments
///
/// Returns `Ok(None)` when `data` does not start with the magic, which
/// callers treat as content that was never encrypted. Once the magic is
/// present, any framing problem is an error.
pub fn parse(data: &[u8]) -> Result<Option<ParsedEnvelope<'_>>> {
    if !is_envelope(data) {
        return Ok(None);
    }

    let tag_end = MAGIC.len() + META_TAG.len();
    if data.get(MAGIC.len()..tag_end) != Some(META_TAG) {
        return Err(malformed("metadata length tag missing after magic"));
    }

    let scan_end = data.len().min(tag_end + MAX_LENGTH_SCAN);
    let delimiter = data[tag_end..scan_end]
        .iter()
        .position(|&b| b == DELIMITER)
        .map(|pos| tag_end + pos)
        .ok_or_else(|| {
            malformed(format!(
                "metadata length delimiter not found within {} bytes",
                MAX_LENGTH_SCAN
            ))
        })?;

    let metadata_len = parse_decimal(&data[tag_end..delimiter])
        .ok_or_else(|| malformed("metadata length is not a decimal number"))?;

    let metadata_start = delimiter + 1;
    let payload_offset = metadata_start
        .checked_add(metadata_len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            FileSealError::with_kind(
                ErrorCategory::User,
                ErrorKind::TruncatedInput,
                format!(
                    "truncated or corrupt envelope; metadata length {} exceeds available input",
                    metadata_len
                ),
            )
        })?;

    Ok(Some(ParsedEnvelope {
        metadata: &data[metadata_start..payload_offset],
        payload: &data[payload_offset..],
        payload_offset,
    }))
}

fn parse_decimal(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn malformed(msg: impl Into<String>) -> FileSealError {
    FileSealError::with_kind(ErrorCategory::User, ErrorKind::MalformedEnvelope, msg)
}
