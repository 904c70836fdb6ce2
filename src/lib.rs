//! fileseal - password-encrypted envelopes carrying content plus metadata,
//! applied to files in place

#![forbid(unsafe_code)]

pub mod cipher;
pub mod config;
pub mod entropy;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod metadata;
#[cfg(feature = "provenance")]
pub mod provenance;
pub mod provider;
mod rijndael;

pub use config::Config;
pub use entropy::EntropySource;
pub use error::{ErrorCategory, ErrorKind, FileSealError, InvalidArgument, Result};
pub use metadata::MetadataMap;
#[cfg(feature = "provenance")]
pub use provenance::FileProvenance;
pub use provider::FileSeal;
