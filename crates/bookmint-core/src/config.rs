//! Engine configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! max_supply = 5000
//! administrator = "0x5b38da6a701c568545dcfcb03fcb875f56beddc4"
//! minter = "0xab8483f64d9c6d1ecf9b849ae677dd3315835cb2"
//! phase = "presale"
//! base_uri = "ipfs://collection/"
//! overpayment = "retain"
//!
//! [prices]
//! presale = 50
//! whitelist = 30
//! public = 80
//!
//! [library]
//! capacity = 256
//! max_entry_len = 4096
//! ```

use crate::error::MintError;
use crate::phase::PriceTable;
use bookmint_library::LibraryConfig;
use bookmint_primitives::{Hash32, Identity, Phase};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What happens to value sent above the phase price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverpaymentPolicy {
    /// Keep the full amount
    #[default]
    Retain,
    /// Keep the price, hand the difference back in the receipt
    Refund,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Exclusive upper bound on token ids
    pub max_supply: u64,
    /// Sole holder of administrative rights
    pub administrator: Identity,
    /// Identity the engine presents to the library factory
    pub minter: Identity,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub prices: PriceTable,
    #[serde(default)]
    pub merkle_root: Option<Hash32>,
    #[serde(default)]
    pub base_uri: String,
    #[serde(default)]
    pub overpayment: OverpaymentPolicy,
    /// Settings for every library opened by a mint
    #[serde(default)]
    pub library: LibraryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_supply: 10_000,
            administrator: Identity::derive(b"bookmint/administrator"),
            minter: Identity::derive(b"bookmint/minter"),
            phase: Phase::Locked,
            prices: PriceTable::default(),
            merkle_root: None,
            base_uri: String::new(),
            overpayment: OverpaymentPolicy::Retain,
            library: LibraryConfig::default(),
        }
    }
}

impl EngineConfig {
    #[inline]
    #[must_use]
    pub fn new(max_supply: u64, administrator: Identity, minter: Identity) -> Self {
        Self {
            max_supply,
            administrator,
            minter,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_merkle_root(mut self, root: Hash32) -> Self {
        self.merkle_root = Some(root);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_overpayment(mut self, policy: OverpaymentPolicy) -> Self {
        self.overpayment = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_library(mut self, library: LibraryConfig) -> Self {
        self.library = library;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = uri.into();
        self
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// `InvalidConfig` on syntax errors, unknown keys or failed validation
    pub fn from_toml_str(text: &str) -> Result<Self, MintError> {
        let config: Self =
            toml::from_str(text).map_err(|e| MintError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `InvalidConfig` if the file cannot be read or fails [`from_toml_str`](Self::from_toml_str)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MintError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MintError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// # Errors
    /// `InvalidConfig` describing the first violated rule
    pub fn validate(&self) -> Result<(), MintError> {
        if self.max_supply == 0 {
            return Err(MintError::InvalidConfig(
                "max_supply must be greater than zero".into(),
            ));
        }
        if self.library.capacity == 0 {
            return Err(MintError::InvalidConfig(
                "library.capacity must be greater than zero".into(),
            ));
        }
        if self.administrator == self.minter {
            return Err(MintError::InvalidConfig(
                "administrator and minter must be distinct identities".into(),
            ));
        }
        Ok(())
    }
}
