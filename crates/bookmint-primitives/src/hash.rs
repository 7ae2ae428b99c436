//! Fixed-width byte values
//!
//! Provides [`Hash32`], the 32-byte SHA-256 digest used for membership roots,
//! proof siblings and the audit chain, plus the `fixed_bytes!` macro that gives
//! every fixed-width value the same hex text form.

use sha2::{Digest, Sha256};

/// Generates a `Copy` newtype over `[u8; N]` with hex `Display`/`FromStr`
/// (an optional `0x` prefix is accepted) and string-based serde.
macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width in bytes
            pub const LEN: usize = $len;

            /// Wrap raw bytes
            #[inline]
            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Borrow the underlying bytes
            #[inline]
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Build from a slice
            ///
            /// # Errors
            /// Returns error if the slice is not exactly `LEN` bytes
            pub fn from_slice(bytes: &[u8]) -> Result<Self, $crate::hash::HashError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                    $crate::hash::HashError::InvalidLength {
                        expected: $len,
                        actual: bytes.len(),
                    }
                })?;
                Ok(Self(arr))
            }

            /// First 8 bytes as hex, for logs
            #[inline]
            #[must_use]
            pub fn short(&self) -> String {
                hex::encode(&self.0[..8])
            }

            /// True for the all-zero placeholder
            #[inline]
            #[must_use]
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::hash::HashError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                let digits = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                    .unwrap_or(trimmed);
                Self::from_slice(&hex::decode(digits)?)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let text = <String as serde::Deserialize>::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use fixed_bytes;

fixed_bytes!(
    /// A 32-byte SHA-256 digest
    Hash32,
    32
);

impl Hash32 {
    /// SHA-256 of arbitrary data
    #[inline]
    #[must_use]
    pub fn sha256(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// SHA-256 over several parts fed in order, without an intermediate buffer
    #[must_use]
    pub fn sha256_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Consume into the raw array
    #[inline]
    #[must_use]
    pub const fn into_bytes(self) -> [u8; 32] {
        self.0
    }
}

/// Errors parsing fixed-width values
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Wrong number of bytes
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Not valid hex
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
