use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The caller provided invalid input (a wrong password, a missing file,
    /// a corrupt envelope) or requested something impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Metadata is protected and no password was supplied to read it.
    PasswordRequired,
    /// Padding validation failed while decrypting metadata or payload.
    WrongPassword,
    /// An in-place file operation failed; the underlying cause is attached
    /// as the error source.
    FileEncryption,
    /// The magic marker is present but the metadata framing is unusable.
    MalformedEnvelope,
    /// Input data ended before the expected component could be read.
    TruncatedInput,
    /// Padding validation failed after decryption.
    CryptoFailure,
    /// Metadata could not be serialized, or stored metadata does not match
    /// the requested type.
    MetadataFormat,
    /// The random source failed to produce salt or IV bytes.
    Entropy,
    /// A configuration value is out of range.
    InvalidConfig,
    /// Unexpected state reached within fileseal logic.
    InternalInvariant,
}

#[derive(Error)]
#[error("{msg}")]
pub struct FileSealError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
    rejected_password: Option<Zeroizing<String>>,
}

impl FileSealError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
            rejected_password: None,
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            ..Self::new(category, msg)
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(category, msg)
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: Some(kind),
            source: Some(Box::new(source)),
            ..Self::new(category, msg)
        }
    }

    /// Protected metadata was read without a password.
    pub fn password_required(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::PasswordRequired, msg)
    }

    /// Decryption with `password` failed padding validation. The password
    /// is retained for diagnostics and is redacted from `Debug` output.
    pub fn wrong_password(msg: impl Into<String>, password: &str) -> Self {
        Self {
            rejected_password: Some(Zeroizing::new(password.to_owned())),
            ..Self::with_kind(ErrorCategory::User, ErrorKind::WrongPassword, msg)
        }
    }

    /// An in-place file operation failed because of `source`.
    pub fn file_encryption(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::with_kind_and_source(category, ErrorKind::FileEncryption, msg, source)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// The password rejected by a `WrongPassword` failure.
    pub fn rejected_password(&self) -> Option<&str> {
        self.rejected_password.as_ref().map(|p| p.as_str())
    }

    /// True when the error is tagged with `kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(mut self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        let rejected_password = self.rejected_password.take();
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
            rejected_password,
        }
    }
}

impl fmt::Debug for FileSealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSealError")
            .field("category", &self.category)
            .field("kind", &self.kind)
            .field("msg", &self.msg)
            .field("source", &self.source)
            .field(
                "rejected_password",
                &self.rejected_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Argument validation failure, attached as the source of file errors that
/// are raised before any bytes are touched.
#[derive(Debug, Error)]
#[error("invalid argument `{name}`: {reason}")]
pub struct InvalidArgument {
    pub name: &'static str,
    pub reason: String,
}

impl InvalidArgument {
    pub fn new(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            reason: reason.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, FileSealError>;
