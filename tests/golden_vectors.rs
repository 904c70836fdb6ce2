//! Golden test vector validation
//!
//! Each vector is a complete envelope built from a counting random source
//! starting at `rng_start`, so encryption must reproduce it byte for byte.

mod support;

use anyhow::Result;
use fileseal::FileSeal;
use serde::Deserialize;
use serde_json::Value;

use support::sequence_seal;

#[derive(Debug, Deserialize)]
struct GoldenVector {
    comment: String,
    password: String,
    /// Metadata as JSON text; keys are sorted so it reserializes identically.
    metadata: String,
    encrypt_metadata: bool,
    content: String,
    rng_start: u8,
    envelope: String,
}

fn load_golden_vectors() -> Result<Vec<GoldenVector>> {
    let json_data = include_str!("../testdata/golden-vectors.json");
    let vectors: Vec<GoldenVector> = serde_json::from_str(json_data)?;
    Ok(vectors)
}

#[test]
fn test_encryption_reproduces_golden_envelopes() {
    let vectors = load_golden_vectors().expect("failed to load golden vectors");
    assert!(!vectors.is_empty(), "No golden vectors were tested");

    for (i, vector) in vectors.iter().enumerate() {
        let metadata: Value = serde_json::from_str(&vector.metadata).unwrap();
        let content = hex::decode(&vector.content).unwrap();
        let metadata = (!metadata.is_null()).then_some(metadata);

        let envelope = sequence_seal(vector.rng_start)
            .encrypt(
                metadata.as_ref(),
                &content,
                &vector.password,
                vector.encrypt_metadata,
            )
            .unwrap();

        assert_eq!(
            hex::encode(&envelope),
            vector.envelope,
            "vector {} ({}): envelope mismatch",
            i,
            vector.comment
        );
    }
}

#[test]
fn test_decryption_of_golden_envelopes() {
    let vectors = load_golden_vectors().expect("failed to load golden vectors");
    let seal = FileSeal::new();

    for (i, vector) in vectors.iter().enumerate() {
        let envelope = hex::decode(&vector.envelope).unwrap();
        let expected_metadata: Value = serde_json::from_str(&vector.metadata).unwrap();
        let expected_content = hex::decode(&vector.content).unwrap();

        assert!(seal.is_encrypted(&envelope), "vector {}", i);

        let (content, metadata): (Vec<u8>, Value) =
            seal.decrypt(&envelope, &vector.password).unwrap();
        assert_eq!(content, expected_content, "vector {} ({})", i, vector.comment);
        assert_eq!(metadata, expected_metadata, "vector {} ({})", i, vector.comment);

        if !vector.encrypt_metadata {
            let metadata: Value = seal.metadata(&envelope, None).unwrap();
            assert_eq!(metadata, expected_metadata, "vector {}", i);
        }
    }
}
