//! Share account credentials and the region they belong to.
//!
//! Credentials are created once by the interactive setup step, verified
//! against the Share service, then encrypted at rest by the bridge's vault.
//! The password field is wiped from memory when the value is dropped and is
//! never included in `Debug` output.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Returned when a region string is not one of the recognised aliases.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown region '{0}': must be one of us, ous, jp")]
pub struct RegionParseError(pub String);

/// Share service deployment the account is registered in.
///
/// This is the only region-specific input in the system: it selects the
/// upstream host and application id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// United States.
    Us,
    /// Outside the United States (Europe, UK, and most other countries).
    Ous,
    /// Japan.
    Jp,
}

impl Region {
    /// Canonical short name as stored on disk and shown in the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Ous => "ous",
            Region::Jp => "jp",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = RegionParseError;

    /// Accepts the canonical names plus common spellings users type at the
    /// prompt (`usa`, `eu`, `uk`, `japan`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "us" | "usa" | "unitedstates" | "united_states" => Ok(Region::Us),
            "ous" | "outside" | "outside-us" | "outside_of_us" | "outsideofus" | "eu"
            | "europe" | "uk" => Ok(Region::Ous),
            "jp" | "japan" => Ok(Region::Jp),
            _ => Err(RegionParseError(s.to_string())),
        }
    }
}

/// Account secrets for the Share service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// Account name: user name, e-mail address or phone number.
    pub username: String,
    pub password: String,
    #[zeroize(skip)]
    pub region: Region,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>, region: Region) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            region,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
