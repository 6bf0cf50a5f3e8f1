//! On-disk envelope for encrypted credentials.
//!
//! ```json
//! {
//!   "version": 1,
//!   "key_source": "passphrase",
//!   "kdf": { "algorithm": "argon2id", "memory_kib": 19456, "iterations": 2, "parallelism": 1 },
//!   "cipher": "chacha20poly1305",
//!   "salt": "<base64, 16 bytes>",
//!   "nonce": "<base64, 12 bytes>",
//!   "ciphertext": "<base64>"
//! }
//! ```
//!
//! Everything except `ciphertext` is readable without the key.  The header
//! fields are bound to the ciphertext as associated data, so editing the
//! version, key source or KDF costs makes decryption fail.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use gluco_core::Credentials;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::key::{derive_key, KdfParams, KeySource, KeySourceKind};
use super::VaultError;

/// Current envelope version.
pub const BLOB_VERSION: u32 = 1;

/// Cipher name recorded in the header.
pub const CIPHER_NAME: &str = "chacha20poly1305";

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;

/// Encrypted credential envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    pub version: u32,
    pub key_source: KeySourceKind,
    pub kdf: KdfParams,
    pub cipher: String,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// The unencrypted part of the envelope.  Parsed on its own by
/// `peek_key_source` so a damaged ciphertext does not hide the key kind.
#[derive(Debug, Deserialize)]
pub(crate) struct BlobHeader {
    pub version: u32,
    pub key_source: KeySourceKind,
}

impl EncryptedBlob {
    fn associated_data(&self) -> Vec<u8> {
        format!(
            "dexcom-osc-bridge|v{}|{}|{}|{}|{}|{}|{}",
            self.version,
            self.key_source,
            self.kdf.algorithm,
            self.kdf.memory_kib,
            self.kdf.iterations,
            self.kdf.parallelism,
            self.cipher
        )
        .into_bytes()
    }
}

/// Encrypts `credentials` under a key derived from `source`.
///
/// A fresh salt and nonce are drawn from the OS RNG on every call.
///
/// # Errors
///
/// Propagates key derivation failures and returns
/// [`VaultError::Serialize`] if the credentials cannot be encoded.
pub fn seal(
    credentials: &Credentials,
    source: &KeySource,
    kdf: &KdfParams,
) -> Result<EncryptedBlob, VaultError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(source, &salt, kdf)?;
    let plaintext = Zeroizing::new(
        serde_json::to_vec(credentials).map_err(|e| VaultError::Serialize(e.to_string()))?,
    );

    let mut blob = EncryptedBlob {
        version: BLOB_VERSION,
        key_source: source.kind(),
        kdf: kdf.clone(),
        cipher: CIPHER_NAME.to_string(),
        salt: STANDARD.encode(salt),
        nonce: STANDARD.encode(nonce),
        ciphertext: String::new(),
    };

    let aad = blob.associated_data();
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| VaultError::Serialize("encryption failed".to_string()))?;

    blob.ciphertext = STANDARD.encode(ciphertext);
    Ok(blob)
}

/// Decrypts and authenticates `blob` with a key derived from `source`.
///
/// Any base64, length, authentication or plaintext-shape problem is reported
/// as [`VaultError::CorruptOrWrongKey`]; no partial data is ever returned.
///
/// # Errors
///
/// - [`VaultError::UnsupportedVersion`] / [`VaultError::UnsupportedCipher`]
///   for envelopes this build cannot read.
/// - [`VaultError::KeySourceMismatch`] when `source` is not the kind that
///   sealed the blob.
/// - [`VaultError::CorruptOrWrongKey`] as above.
pub fn open(blob: &EncryptedBlob, source: &KeySource) -> Result<Credentials, VaultError> {
    if blob.version != BLOB_VERSION {
        return Err(VaultError::UnsupportedVersion(blob.version));
    }
    if blob.cipher != CIPHER_NAME {
        return Err(VaultError::UnsupportedCipher(blob.cipher.clone()));
    }
    if blob.key_source != source.kind() {
        return Err(VaultError::KeySourceMismatch {
            expected: blob.key_source,
            actual: source.kind(),
        });
    }

    let salt = STANDARD
        .decode(&blob.salt)
        .map_err(|_| VaultError::CorruptOrWrongKey)?;
    let nonce = STANDARD
        .decode(&blob.nonce)
        .map_err(|_| VaultError::CorruptOrWrongKey)?;
    let ciphertext = STANDARD
        .decode(&blob.ciphertext)
        .map_err(|_| VaultError::CorruptOrWrongKey)?;
    if nonce.len() != NONCE_LEN || salt.len() != SALT_LEN {
        return Err(VaultError::CorruptOrWrongKey);
    }

    // Header costs are unauthenticated until decryption.
    if !blob.kdf.within_limits() {
        return Err(VaultError::CorruptOrWrongKey);
    }
    let key = derive_key(source, &salt, &blob.kdf).map_err(|e| match e {
        VaultError::Kdf(_) => VaultError::CorruptOrWrongKey,
        other => other,
    })?;
    let aad = blob.associated_data();
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| VaultError::CorruptOrWrongKey)?,
    );

    serde_json::from_slice(&plaintext).map_err(|_| VaultError::CorruptOrWrongKey)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use gluco_core::Region;

    fn light() -> KdfParams {
        KdfParams {
            memory_kib: 1_024,
            iterations: 1,
            ..KdfParams::default()
        }
    }

    fn creds() -> Credentials {
        Credentials::new("alice@example.com", "s3cret!", Region::Ous)
    }

    #[test]
    fn test_seal_then_open_returns_original_credentials() {
        // Arrange
        let key = KeySource::passphrase("pass phrase");

        // Act
        let blob = seal(&creds(), &key, &light()).unwrap();
        let restored = open(&blob, &key).unwrap();

        // Assert
        assert_eq!(restored, creds());
        assert_eq!(blob.version, BLOB_VERSION);
        assert_eq!(blob.key_source, KeySourceKind::Passphrase);
    }

    #[test]
    fn test_ciphertext_does_not_contain_plaintext() {
        let blob = seal(&creds(), &KeySource::passphrase("p"), &light()).unwrap();
        let json = serde_json::to_string(&blob).unwrap();
        assert!(!json.contains("s3cret!"));
        assert!(!json.contains("alice@example.com"));
    }

    #[test]
    fn test_each_seal_uses_fresh_salt_and_nonce() {
        let key = KeySource::passphrase("p");
        let a = seal(&creds(), &key, &light()).unwrap();
        let b = seal(&creds(), &key, &light()).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_wrong_passphrase_fails_closed() {
        let blob = seal(&creds(), &KeySource::passphrase("right"), &light()).unwrap();
        let result = open(&blob, &KeySource::passphrase("wrong"));
        assert!(matches!(result, Err(VaultError::CorruptOrWrongKey)));
    }

    #[test]
    fn test_flipped_ciphertext_byte_fails_closed() {
        // Arrange
        let key = KeySource::passphrase("p");
        let mut blob = seal(&creds(), &key, &light()).unwrap();
        let mut raw = STANDARD.decode(&blob.ciphertext).unwrap();
        raw[0] ^= 0x01;
        blob.ciphertext = STANDARD.encode(raw);

        // Act
        let result = open(&blob, &key);

        // Assert
        assert!(matches!(result, Err(VaultError::CorruptOrWrongKey)));
    }

    #[test]
    fn test_edited_header_fails_authentication() {
        let key = KeySource::passphrase("p");
        let mut blob = seal(&creds(), &key, &light()).unwrap();
        blob.kdf.parallelism = 2;
        assert!(matches!(open(&blob, &key), Err(VaultError::CorruptOrWrongKey)));
    }

    #[test]
    fn test_edited_kdf_costs_fail_closed_without_deriving() {
        // Arrange
        let key = KeySource::passphrase("p");
        let sealed = seal(&creds(), &key, &light()).unwrap();
        let edits: [fn(&mut KdfParams); 4] = [
            |k| k.iterations = 0,
            |k| k.algorithm = "argon2i".to_string(),
            |k| k.memory_kib = u32::MAX,
            |k| k.memory_kib = 4,
        ];

        for edit in edits {
            let mut blob = sealed.clone();
            edit(&mut blob.kdf);

            // Act
            let result = open(&blob, &key);

            // Assert
            assert!(
                matches!(result, Err(VaultError::CorruptOrWrongKey)),
                "{:?} gave {result:?}",
                blob.kdf
            );
        }
    }

    #[test]
    fn test_truncated_nonce_is_corrupt_not_panic() {
        let key = KeySource::passphrase("p");
        let mut blob = seal(&creds(), &key, &light()).unwrap();
        blob.nonce = STANDARD.encode([0u8; 5]);
        assert!(matches!(open(&blob, &key), Err(VaultError::CorruptOrWrongKey)));
    }

    #[test]
    fn test_invalid_base64_is_corrupt() {
        let key = KeySource::passphrase("p");
        let mut blob = seal(&creds(), &key, &light()).unwrap();
        blob.ciphertext = "@@not base64@@".to_string();
        assert!(matches!(open(&blob, &key), Err(VaultError::CorruptOrWrongKey)));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let key = KeySource::passphrase("p");
        let mut blob = seal(&creds(), &key, &light()).unwrap();
        blob.version = 2;
        assert!(matches!(
            open(&blob, &key),
            Err(VaultError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_key_source_mismatch_is_reported() {
        let blob = seal(&creds(), &KeySource::passphrase("p"), &light()).unwrap();
        let result = open(&blob, &KeySource::Machine);
        assert!(matches!(
            result,
            Err(VaultError::KeySourceMismatch {
                expected: KeySourceKind::Passphrase,
                actual: KeySourceKind::Machine
            })
        ));
    }
}
