//! Key sources and Argon2id key derivation for the credential vault.
//!
//! Two kinds of secret can unlock the vault:
//!
//! - a **passphrase** typed at `setup` and again at every `run`, or
//! - **machine-bound** material read from the OS install identity, so the
//!   bridge can start unattended on the PC it was set up on.  A copied
//!   credential file will not open on another machine.
//!
//! Either way the secret is stretched with Argon2id and the per-file salt into
//! a 256-bit ChaCha20-Poly1305 key.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::VaultError;

/// Length of the derived cipher key in bytes.
pub const KEY_LEN: usize = 32;

/// Label mixed into machine-bound material so the same machine id yields a
/// different key for any other program that might use it.
/// Upper bounds accepted for costs read back from a file header.
const MAX_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_ITERATIONS: u32 = 64;
const MAX_PARALLELISM: u32 = 16;

const MACHINE_KEY_LABEL: &str = "dexcom-osc-bridge/machine-key/v1";

/// Files holding a stable per-install identifier, checked in order.
const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// The secret used to unlock the vault.
#[derive(Clone)]
pub enum KeySource {
    /// User-chosen passphrase.
    Passphrase(Zeroizing<String>),
    /// Material bound to this machine and user account.
    Machine,
}

impl KeySource {
    pub fn passphrase(secret: impl Into<String>) -> Self {
        KeySource::Passphrase(Zeroizing::new(secret.into()))
    }

    pub fn kind(&self) -> KeySourceKind {
        match self {
            KeySource::Passphrase(_) => KeySourceKind::Passphrase,
            KeySource::Machine => KeySourceKind::Machine,
        }
    }

    /// Returns the raw secret bytes fed into the KDF.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NoMachineKey`] if no machine identity is available.
    fn material(&self) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        match self {
            KeySource::Passphrase(p) => Ok(Zeroizing::new(p.as_bytes().to_vec())),
            KeySource::Machine => machine_material(),
        }
    }
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Passphrase(_) => f.write_str("Passphrase(<redacted>)"),
            KeySource::Machine => f.write_str("Machine"),
        }
    }
}

/// Which kind of key source sealed a blob.  Stored unencrypted in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySourceKind {
    Passphrase,
    Machine,
}

impl std::fmt::Display for KeySourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            KeySourceKind::Passphrase => "passphrase",
            KeySourceKind::Machine => "machine",
        })
    }
}

/// Argon2 cost parameters.  Stored in the header so a later release can raise
/// the defaults without breaking existing files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// Argon2id with 19 MiB, 2 passes and 1 lane.
    fn default() -> Self {
        Self {
            algorithm: "argon2id".to_string(),
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Whether these parameters name Argon2id with costs this build is
    /// willing to spend before the file has been authenticated.
    pub fn within_limits(&self) -> bool {
        self.algorithm == "argon2id"
            && (1..=MAX_MEMORY_KIB).contains(&self.memory_kib)
            && (1..=MAX_ITERATIONS).contains(&self.iterations)
            && (1..=MAX_PARALLELISM).contains(&self.parallelism)
    }
}

/// Stretches `source` with `salt` into a cipher key.
///
/// # Errors
///
/// - [`VaultError::Kdf`] for unsupported algorithms or out-of-range costs.
/// - [`VaultError::NoMachineKey`] for a machine source on a host without an
///   identity.
pub fn derive_key(
    source: &KeySource,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    if params.algorithm != "argon2id" {
        return Err(VaultError::Kdf(format!(
            "unsupported algorithm '{}'",
            params.algorithm
        )));
    }
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| VaultError::Kdf(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let material = source.material()?;
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon
        .hash_password_into(&material, salt, &mut key[..])
        .map_err(|e| VaultError::Kdf(e.to_string()))?;
    Ok(key)
}

fn machine_material() -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let identity = MACHINE_ID_PATHS
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .or_else(host_and_user)
        .ok_or(VaultError::NoMachineKey)?;

    Ok(Zeroizing::new(
        format!("{MACHINE_KEY_LABEL}:{identity}").into_bytes(),
    ))
}

/// Fallback identity for hosts without a machine-id file.
fn host_and_user() -> Option<String> {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())?;
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|s| !s.is_empty())?;
    Some(format!("{host}/{user}"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
