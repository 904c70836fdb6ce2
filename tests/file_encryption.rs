//! In-place file encryption through the public API

mod support;

use std::fs;
use std::path::Path;

use fileseal::{ErrorKind, FileSeal, InvalidArgument};
use rand::RngCore;
use tempfile::TempDir;

use support::{CONTENT, Note, PASSWORD, WRONG_PASSWORDS, note, sequence_seal};

fn sibling_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_random_file_roundtrip_in_place() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.bin");
    let mut original = vec![0u8; 1024];
    rand::thread_rng().fill_bytes(&mut original);
    fs::write(&path, &original).unwrap();

    let seal = FileSeal::new();
    seal.encrypt_file(Some(&note()), &path, PASSWORD, true).unwrap();

    let sealed = fs::read(&path).unwrap();
    assert_ne!(sealed, original);
    assert!(seal.is_file_encrypted(&path).unwrap());
    assert_eq!(sibling_names(dir.path()), ["data.bin"]);

    let metadata: Note = seal.decrypt_file(&path, PASSWORD).unwrap();
    assert_eq!(metadata, note());
    assert_eq!(fs::read(&path).unwrap(), original);
    assert!(!seal.is_file_encrypted(&path).unwrap());
    assert_eq!(sibling_names(dir.path()), ["data.bin"]);
}

#[test]
fn test_file_metadata() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.txt");
    fs::write(&path, CONTENT).unwrap();

    let seal = FileSeal::new();
    seal.encrypt_file(Some(&note()), &path, PASSWORD, false).unwrap();

    let metadata: Note = seal.file_metadata(&path, None).unwrap();
    assert_eq!(metadata, note());
}

#[test]
fn test_file_metadata_of_plain_file_is_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.txt");
    fs::write(&path, CONTENT).unwrap();

    let seal = FileSeal::new();
    let metadata: Note = seal.file_metadata(&path, None).unwrap();
    assert_eq!(metadata, Note::default());
    assert!(!seal.is_file_encrypted(&path).unwrap());
}

#[test]
fn test_is_file_encrypted_checks_leading_magic() {
    let dir = TempDir::new().unwrap();
    let seal = FileSeal::new();
    let magic = fileseal::envelope::MAGIC;

    let cases: [(&str, Vec<u8>, bool); 4] = [
        ("empty", Vec::new(), false),
        ("partial", magic[..4].to_vec(), false),
        ("magic-only", magic.to_vec(), true),
        ("large", [&magic[..], &vec![0u8; 1 << 20][..]].concat(), true),
    ];
    for (name, contents, expected) in cases {
        let path = dir.path().join(name);
        fs::write(&path, &contents).unwrap();
        assert_eq!(seal.is_file_encrypted(&path).unwrap(), expected, "{}", name);
    }
}

#[test]
fn test_missing_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.txt");
    let seal = FileSeal::new();

    let err = seal
        .encrypt_file(Some(&note()), &path, PASSWORD, false)
        .unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::FileEncryption));
    let cause = err.source_error().unwrap();
    assert!(cause.downcast_ref::<InvalidArgument>().is_some());

    let err = seal.decrypt_file::<Note>(&path, PASSWORD).unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::FileEncryption));

    let err = seal.is_file_encrypted(&path).unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::FileEncryption));

    let err = seal.file_metadata::<Note>(&path, None).unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::FileEncryption));

    assert!(sibling_names(dir.path()).is_empty());
}

#[test]
fn test_directory_rejected() {
    let dir = TempDir::new().unwrap();
    let seal = FileSeal::new();
    let err = seal
        .encrypt_file(Some(&note()), dir.path(), PASSWORD, false)
        .unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::FileEncryption));
}

#[test]
fn test_wrong_password_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("note.txt");
    fs::write(&path, CONTENT).unwrap();

    sequence_seal(0)
        .encrypt_file(Some(&note()), &path, PASSWORD, false)
        .unwrap();
    let sealed = fs::read(&path).unwrap();

    let seal = FileSeal::new();
    for password in WRONG_PASSWORDS {
        let err = seal.decrypt_file::<Note>(&path, password).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::WrongPassword));
        assert_eq!(fs::read(&path).unwrap(), sealed);
        assert_eq!(sibling_names(dir.path()), ["note.txt"]);
    }

    let metadata: Note = seal.decrypt_file(&path, PASSWORD).unwrap();
    assert_eq!(metadata, note());
    assert_eq!(fs::read(&path).unwrap(), CONTENT);
}

#[test]
fn test_decrypting_plain_file_keeps_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.txt");
    fs::write(&path, CONTENT).unwrap();

    let seal = FileSeal::new();
    let metadata: Note = seal.decrypt_file(&path, PASSWORD).unwrap();
    assert_eq!(metadata, Note::default());
    assert_eq!(fs::read(&path).unwrap(), CONTENT);
    assert_eq!(sibling_names(dir.path()), ["plain.txt"]);
}

#[test]
fn test_stale_backup_blocks_operation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.txt");
    fs::write(&path, CONTENT).unwrap();
    fs::write(dir.path().join("doc.txt.orig"), b"left over").unwrap();

    let seal = FileSeal::new();
    let err = seal
        .encrypt_file(Some(&note()), &path, PASSWORD, false)
        .unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::FileEncryption));
    assert_eq!(fs::read(&path).unwrap(), CONTENT);
}

#[test]
fn test_empty_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty");
    fs::write(&path, b"").unwrap();

    let seal = FileSeal::new();
    seal.encrypt_file::<Note>(None, &path, PASSWORD, true).unwrap();
    assert!(seal.is_file_encrypted(&path).unwrap());

    let metadata: Note = seal.decrypt_file(&path, PASSWORD).unwrap();
    assert_eq!(metadata, Note::default());
    assert!(fs::read(&path).unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn test_permissions_preserved() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("secret.txt");
    fs::write(&path, CONTENT).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

    FileSeal::new()
        .encrypt_file(Some(&note()), &path, PASSWORD, false)
        .unwrap();
    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
}
