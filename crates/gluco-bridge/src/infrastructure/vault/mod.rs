//! Encrypted credential storage.
//!
//! [`CredentialVault`] owns one file path and moves [`Credentials`] in and out
//! of it through the envelope defined in [`blob`]:
//!
//! ```text
//! save:  Credentials ─json─► seal(key_source) ─► EncryptedBlob ─► temp file ─fsync─► rename
//! load:  file ─► EncryptedBlob ─► open(key_source) ─► Credentials
//! ```
//!
//! On Unix the parent directory is created `0700` and the file `0600`.

pub mod blob;
pub mod key;

use std::io::Write;
use std::path::{Path, PathBuf};

use gluco_core::Credentials;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub use blob::{open, seal, EncryptedBlob};
pub use key::{KdfParams, KeySource, KeySourceKind};

use crate::infrastructure::storage::config::{config_dir, ConfigError};

/// File name of the credential file inside the config directory.
pub const CREDENTIALS_FILE_NAME: &str = "dexcom_credentials.json";

/// Errors produced by the credential vault.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No credential file exists yet.
    #[error("no saved credentials at {path}; run `dexcom-osc-bridge setup` first")]
    NotFound { path: PathBuf },

    /// The file failed authentication, was truncated or edited, or the key
    /// is wrong.  The AEAD tag cannot tell these cases apart.
    #[error("saved credentials could not be decrypted: wrong passphrase, different machine, or the file is damaged")]
    CorruptOrWrongKey,

    #[error("unsupported credential file version {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported credential cipher '{0}'")]
    UnsupportedCipher(String),

    /// The caller offered a different kind of key than the file was sealed with.
    #[error("credential file is sealed with a {expected} key, not a {actual} key")]
    KeySourceMismatch {
        expected: KeySourceKind,
        actual: KeySourceKind,
    },

    #[error("I/O error accessing credentials at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Machine-bound keys need a machine id, or a host and user name.
    #[error("no machine identity available for a machine-bound key; use a passphrase instead")]
    NoMachineKey,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to encode credentials: {0}")]
    Serialize(String),
}

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    path: PathBuf,
    kdf: KdfParams,
}

impl CredentialVault {
    /// Creates a vault over `path` with the default KDF costs.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kdf: KdfParams::default(),
        }
    }

    /// Overrides the KDF costs used by [`save`](Self::save).  `load` always
    /// uses the costs recorded in the file.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// `<config dir>/dexcom-osc-bridge/dexcom_credentials.json`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] when no config directory exists.
    pub fn default_path() -> Result<PathBuf, VaultError> {
        Ok(config_dir()?.join(CREDENTIALS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Encrypts `credentials` and atomically replaces the file.
    ///
    /// # Errors
    ///
    /// Key derivation and filesystem failures.  On error the previous file,
    /// if any, is left untouched.
    pub fn save(
        &self,
        credentials: &Credentials,
        source: &KeySource,
    ) -> Result<EncryptedBlob, VaultError> {
        let blob = seal(credentials, source, &self.kdf)?;
        let json =
            serde_json::to_vec_pretty(&blob).map_err(|e| VaultError::Serialize(e.to_string()))?;
        write_atomically(&self.path, &json)?;
        info!(
            "saved {} credentials to {} ({} key)",
            credentials.region,
            self.path.display(),
            source.kind()
        );
        Ok(blob)
    }

    /// Reads and decrypts the file.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] if absent; [`VaultError::CorruptOrWrongKey`]
    /// for unreadable JSON or failed authentication; the version, cipher and
    /// key-source errors from [`open`].
    pub fn load(&self, source: &KeySource) -> Result<Credentials, VaultError> {
        let bytes = self.read()?;
        let blob: EncryptedBlob =
            serde_json::from_slice(&bytes).map_err(|_| VaultError::CorruptOrWrongKey)?;
        let credentials = open(&blob, source)?;
        debug!("loaded credentials from {}", self.path.display());
        Ok(credentials)
    }

    /// Reads only the unencrypted header to learn which key the file needs.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`], [`VaultError::Io`], or
    /// [`VaultError::CorruptOrWrongKey`] if the header is unreadable.
    pub fn peek_key_source(&self) -> Result<KeySourceKind, VaultError> {
        let bytes = self.read()?;
        let header: blob::BlobHeader =
            serde_json::from_slice(&bytes).map_err(|_| VaultError::CorruptOrWrongKey)?;
        if header.version != blob::BLOB_VERSION {
            return Err(VaultError::UnsupportedVersion(header.version));
        }
        Ok(header.key_source)
    }

    fn read(&self) -> Result<Vec<u8>, VaultError> {
        std::fs::read(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                VaultError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                VaultError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })
    }
}

/// Writes `contents` to a sibling temp file, syncs it, then renames it over
/// `path`.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), VaultError> {
    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source| VaultError::Io { path: p, source }
    };

    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    create_private_dir(dir).map_err(io_err(dir))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| CREDENTIALS_FILE_NAME.to_string());
    let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = create_private_file(&tmp).map_err(io_err(&tmp))?;
        file.write_all(contents).map_err(io_err(&tmp))?;
        file.sync_all().map_err(io_err(&tmp))?;
        drop(file);
        std::fs::rename(&tmp, path).map_err(io_err(path))
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(unix)]
fn create_private_file(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private_file(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
