//! Integration tests for the credential vault file format and lifecycle.

use gluco_bridge::infrastructure::vault::{
    CredentialVault, EncryptedBlob, KdfParams, KeySource, KeySourceKind, VaultError,
};
use gluco_core::{Credentials, Region};
use tempfile::TempDir;

fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 1_024,
        iterations: 1,
        ..KdfParams::default()
    }
}

fn vault(dir: &TempDir) -> CredentialVault {
    CredentialVault::new(dir.path().join("dexcom_credentials.json")).with_kdf(fast_kdf())
}

#[test]
fn test_round_trip_for_every_region() {
    let dir = TempDir::new().unwrap();
    let vault = vault(&dir);
    let key = KeySource::passphrase("a long passphrase");

    for region in [Region::Us, Region::Ous, Region::Jp] {
        let creds = Credentials::new("carol@example.com", "pä$$wörd", region);
        vault.save(&creds, &key).unwrap();
        assert_eq!(vault.load(&key).unwrap(), creds);
    }
}

#[test]
fn test_file_is_json_with_base64_fields_and_version_tag() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let vault = vault(&dir);
    vault
        .save(
            &Credentials::new("dave", "pw", Region::Us),
            &KeySource::passphrase("p"),
        )
        .unwrap();

    // Act
    let raw = std::fs::read_to_string(vault.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

    // Assert
    assert_eq!(json["version"], 1);
    assert_eq!(json["key_source"], "passphrase");
    assert_eq!(json["cipher"], "chacha20poly1305");
    assert_eq!(json["kdf"]["algorithm"], "argon2id");
    for field in ["salt", "nonce", "ciphertext"] {
        assert!(json[field].is_string(), "{field} must be a base64 string");
    }
    assert!(!raw.contains("dave"));
}

#[test]
fn test_wrong_passphrase_never_yields_credentials() {
    let dir = TempDir::new().unwrap();
    let vault = vault(&dir);
    vault
        .save(
            &Credentials::new("erin", "pw", Region::Ous),
            &KeySource::passphrase("right"),
        )
        .unwrap();

    let result = vault.load(&KeySource::passphrase("Right"));

    assert!(matches!(result, Err(VaultError::CorruptOrWrongKey)));
}

#[test]
fn test_tampered_file_fails_closed() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let vault = vault(&dir);
    let key = KeySource::passphrase("p");
    vault
        .save(&Credentials::new("frank", "pw", Region::Jp), &key)
        .unwrap();
    let mut blob: EncryptedBlob =
        serde_json::from_str(&std::fs::read_to_string(vault.path()).unwrap()).unwrap();
    blob.key_source = KeySourceKind::Passphrase;
    blob.kdf.iterations += 1;
    std::fs::write(vault.path(), serde_json::to_vec(&blob).unwrap()).unwrap();

    // Act
    let result = vault.load(&key);

    // Assert
    assert!(matches!(result, Err(VaultError::CorruptOrWrongKey)));
}

#[test]
fn test_future_version_is_rejected_by_load_and_peek() {
    let dir = TempDir::new().unwrap();
    let vault = vault(&dir);
    let key = KeySource::passphrase("p");
    vault
        .save(&Credentials::new("gina", "pw", Region::Us), &key)
        .unwrap();
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(vault.path()).unwrap()).unwrap();
    json["version"] = serde_json::json!(7);
    std::fs::write(vault.path(), json.to_string()).unwrap();

    assert!(matches!(
        vault.load(&key),
        Err(VaultError::UnsupportedVersion(7))
    ));
    assert!(matches!(
        vault.peek_key_source(),
        Err(VaultError::UnsupportedVersion(7))
    ));
}

#[test]
fn test_missing_file_reports_not_found_with_path() {
    let dir = TempDir::new().unwrap();
    let vault = vault(&dir);

    let err = vault.peek_key_source().unwrap_err();

    match err {
        VaultError::NotFound { path } => assert_eq!(path, vault.path()),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_machine_key_round_trip_when_identity_available() {
    let dir = TempDir::new().unwrap();
    let vault = vault(&dir);
    let creds = Credentials::new("hank", "pw", Region::Us);

    match vault.save(&creds, &KeySource::Machine) {
        Ok(_) => {
            assert_eq!(vault.peek_key_source().unwrap(), KeySourceKind::Machine);
            assert_eq!(vault.load(&KeySource::Machine).unwrap(), creds);
        }
        // Containers without a machine id, host name or user name.
        Err(VaultError::NoMachineKey) => {}
        Err(other) => panic!("unexpected error: {other:?}"),
    }
}
