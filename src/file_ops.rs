//! In-place file transformation
//!
//! A file is rewritten through an explicit sequence of states:
//!
//! 1. `Validated`: the path names an existing regular file and no backup
//!    from an interrupted run is lying next to it
//! 2. `Transformed`: the whole file was read and transformed in memory
//! 3. `Swapped`: the new bytes sit in a sibling temp file
//!    (`<path>.encoded` or `<path>.decoded`)
//! 4. `Committed`: the original was renamed to `<path>.orig`, the temp
//!    file renamed onto the path, and the backup deleted
//!
//! Until the first rename the original file is never touched, so any
//! failure before `Committed` is safe to retry. The target path always
//! holds either the complete old or the complete new content. A crash
//! between the two renames leaves `<path>.orig` behind; it is not
//! recovered automatically, and its presence makes later operations on
//! the same path fail until it is dealt with.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, FileSealError, InvalidArgument, Result};

/// Suffix of the backup holding the original during the renames
pub const BACKUP_SUFFIX: &str = "orig";

/// Which way a file is being transformed; selects the temp file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    pub fn temp_suffix(self) -> &'static str {
        match self {
            Direction::Encrypt => "encoded",
            Direction::Decrypt => "decoded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Validated,
    Transformed,
    Swapped,
    Committed,
}

/// One in-place rewrite of one file.
pub struct FileTransaction {
    path: PathBuf,
    temp_path: PathBuf,
    backup_path: PathBuf,
    direction: Direction,
    sync_writes: bool,
    state: TransactionState,
    replacement: Option<Zeroizing<Vec<u8>>>,
}

impl FileTransaction {
    /// Validate `path` and start a transaction on it.
    pub fn open(path: &Path, direction: Direction, sync_writes: bool) -> Result<Self> {
        validate_path(path)?;

        let backup_path = sibling(path, BACKUP_SUFFIX);
        if fs::symlink_metadata(&backup_path).is_ok() {
            return Err(FileSealError::file_encryption(
                ErrorCategory::User,
                format!(
                    "backup {} left by an interrupted operation; recover or remove it first",
                    backup_path.display()
                ),
                InvalidArgument::new("path", "a stale backup file exists next to it"),
            ));
        }

        debug!(path = %path.display(), ?direction, "file transaction validated");
        Ok(Self {
            path: path.to_path_buf(),
            temp_path: sibling(path, direction.temp_suffix()),
            backup_path,
            direction,
            sync_writes,
            state: TransactionState::Validated,
            replacement: None,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Read the file and compute its replacement in memory
    ///
    /// Errors from `transform` are returned unchanged; nothing has been
    /// written at that point.
    pub fn transform<F>(&mut self, transform: F) -> Result<()>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>>,
    {
        self.expect_state(TransactionState::Validated, "transform")?;

        let original = Zeroizing::new(fs::read(&self.path).map_err(|e| read_error(&self.path, e))?);
        let replacement = transform(&original)?;

        debug!(
            path = %self.path.display(),
            original_len = original.len(),
            replacement_len = replacement.len(),
            "file transformed in memory"
        );
        self.replacement = Some(Zeroizing::new(replacement));
        self.state = TransactionState::Transformed;
        Ok(())
    }

    /// Write the replacement to the sibling temp file
    ///
    /// On failure the partial temp file is removed and the original is
    /// left untouched.
    pub fn write_temp(&mut self) -> Result<()> {
        self.expect_state(TransactionState::Transformed, "write_temp")?;

        let replacement = self.replacement.take().ok_or_else(|| {
            FileSealError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "transformed state without replacement bytes",
            )
        })?;

        if let Err(e) = self.write_temp_file(&replacement) {
            let _ = fs::remove_file(&self.temp_path);
            return Err(e);
        }

        debug!(temp = %self.temp_path.display(), "replacement staged");
        self.state = TransactionState::Swapped;
        Ok(())
    }

    /// Swap the temp file into place and delete the backup.
    pub fn commit(&mut self) -> Result<()> {
        self.expect_state(TransactionState::Swapped, "commit")?;

        if let Err(e) = fs::rename(&self.path, &self.backup_path) {
            let _ = fs::remove_file(&self.temp_path);
            return Err(FileSealError::file_encryption(
                io_category(&e),
                format!("failed to move {} aside", self.path.display()),
                e,
            ));
        }

        if let Err(e) = fs::rename(&self.temp_path, &self.path) {
            return Err(self.restore_backup(e));
        }

        fs::remove_file(&self.backup_path).map_err(|e| {
            FileSealError::file_encryption(
                io_category(&e),
                format!(
                    "{} was replaced but its backup {} could not be deleted",
                    self.path.display(),
                    self.backup_path.display()
                ),
                e,
            )
        })?;

        debug!(path = %self.path.display(), direction = ?self.direction, "file transaction committed");
        self.state = TransactionState::Committed;
        Ok(())
    }

    fn write_temp_file(&self, contents: &[u8]) -> Result<()> {
        let mut file = File::create(&self.temp_path).map_err(|e| write_error(&self.temp_path, e))?;
        file.write_all(contents)
            .map_err(|e| write_error(&self.temp_path, e))?;

        // Flush and fsync() such that the rename later, if it succeeds, will
        // always point to a valid file.
        if self.sync_writes {
            file.flush().map_err(|e| write_error(&self.temp_path, e))?;
            file.sync_all().map_err(|e| write_error(&self.temp_path, e))?;
        }
        drop(file);

        let permissions = fs::metadata(&self.path)
            .map_err(|e| read_error(&self.path, e))?
            .permissions();
        fs::set_permissions(&self.temp_path, permissions)
            .map_err(|e| write_error(&self.temp_path, e))?;
        Ok(())
    }

    fn restore_backup(&self, cause: io::Error) -> FileSealError {
        match fs::rename(&self.backup_path, &self.path) {
            Ok(()) => {
                let _ = fs::remove_file(&self.temp_path);
                warn!(path = %self.path.display(), error = %cause, "replacement failed; original restored");
                FileSealError::file_encryption(
                    io_category(&cause),
                    format!(
                        "failed to move new content into {}; original restored",
                        self.path.display()
                    ),
                    cause,
                )
            }
            Err(restore_error) => {
                warn!(
                    path = %self.path.display(),
                    backup = %self.backup_path.display(),
                    error = %restore_error,
                    "original could not be restored; backup kept for manual recovery"
                );
                FileSealError::file_encryption(
                    ErrorCategory::Internal,
                    format!(
                        "failed to move new content into {}; original kept at {}",
                        self.path.display(),
                        self.backup_path.display()
                    ),
                    cause,
                )
            }
        }
    }

    fn expect_state(&self, expected: TransactionState, step: &str) -> Result<()> {
        if self.state != expected {
            return Err(FileSealError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                format!(
                    "{} requires state {:?} but transaction is {:?}",
                    step, expected, self.state
                ),
            ));
        }
        Ok(())
    }
}

/// Run a whole transaction: validate, transform, stage, commit.
pub fn apply<F>(path: &Path, direction: Direction, sync_writes: bool, transform: F) -> Result<()>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>>,
{
    let mut transaction = FileTransaction::open(path, direction, sync_writes)?;
    transaction.transform(transform)?;
    transaction.write_temp()?;
    transaction.commit()
}

/// Read a whole file after the same validation a transaction performs.
pub fn read_validated(path: &Path) -> Result<Vec<u8>> {
    validate_path(path)?;
    fs::read(path).map_err(|e| read_error(path, e))
}

/// Read at most `len` leading bytes of a file after the same validation
/// a transaction performs. Shorter files yield all their bytes.
pub fn read_prefix(path: &Path, len: usize) -> Result<Vec<u8>> {
    validate_path(path)?;
    let file = File::open(path).map_err(|e| read_error(path, e))?;

    let mut prefix = Vec::with_capacity(len);
    file.take(len as u64)
        .read_to_end(&mut prefix)
        .map_err(|e| read_error(path, e))?;
    Ok(prefix)
}

fn validate_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(FileSealError::file_encryption(
            ErrorCategory::User,
            "file path is missing",
            InvalidArgument::new("path", "file path is empty"),
        ));
    }
    if !path.is_file() {
        return Err(FileSealError::file_encryption(
            ErrorCategory::User,
            format!("file does not exist: {}", path.display()),
            InvalidArgument::new("path", format!("{} is not an existing file", path.display())),
        ));
    }
    Ok(())
}

/// `<path>.<suffix>`, keeping any existing extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn io_category(err: &io::Error) -> ErrorCategory {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => ErrorCategory::User,
        _ => ErrorCategory::Internal,
    }
}

fn read_error(path: &Path, err: io::Error) -> FileSealError {
    FileSealError::file_encryption(
        io_category(&err),
        format!("can not read file: {}", path.display()),
        err,
    )
}

fn write_error(path: &Path, err: io::Error) -> FileSealError {
    FileSealError::file_encryption(
        io_category(&err),
        format!("can not write temp file: {}", path.display()),
        err,
    )
}
