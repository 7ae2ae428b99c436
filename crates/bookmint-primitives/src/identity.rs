//! Caller identities
//!
//! An [`Identity`] is the 20-byte address-equivalent that owns tokens, pays
//! for issuance and appears in whitelist trees.

use crate::hash::{fixed_bytes, Hash32};

fixed_bytes!(
    /// A 20-byte caller reference
    Identity,
    20
);

impl Identity {
    /// Derive an identity from a seed (truncated SHA-256).
    ///
    /// Handy for fixtures and the simulator; real identities come from callers.
    #[must_use]
    pub fn derive(seed: &[u8]) -> Self {
        let digest = Hash32::sha256(seed);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Self::new(bytes)
    }
}
