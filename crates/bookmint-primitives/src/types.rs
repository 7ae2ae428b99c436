//! Amounts, token ids, library handles and issuance phases

use crate::hash::fixed_bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment amount in the smallest unit
pub type Amount = u64;

/// Sequential token number, valid range `[0, max_supply)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl TokenId {
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fixed_bytes!(
    /// Stable address of a library created by the factory
    LibraryHandle,
    32
);

/// Issuance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No issuance
    #[default]
    Locked,
    Presale,
    /// Requires a membership proof, one claim per identity
    Whitelist,
    Public,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Locked, Phase::Presale, Phase::Whitelist, Phase::Public];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Locked => "locked",
            Phase::Presale => "presale",
            Phase::Whitelist => "whitelist",
            Phase::Public => "public",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

/// Unrecognised phase name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase: {0}")]
pub struct UnknownPhase(pub String);

impl LibraryHandle {
    /// Handle from a digest
    #[inline]
    #[must_use]
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self::new(digest)
    }
}
