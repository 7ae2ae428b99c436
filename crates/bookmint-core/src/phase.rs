//! Phase controller
//!
//! Holds the active [`Phase`], the price table and the whitelist root. Every
//! mutator checks that the caller is the administrator and returns the
//! notification to publish. Transitions are unrestricted: any phase can follow
//! any other.

use crate::error::MintError;
use bookmint_primitives::{merkle, Amount, Event, Hash32, Identity, Phase};
use serde::{Deserialize, Serialize};

/// Price per phase; Locked has none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceTable {
    pub presale: Amount,
    pub whitelist: Amount,
    pub public: Amount,
}

impl PriceTable {
    #[must_use]
    pub const fn new(presale: Amount, whitelist: Amount, public: Amount) -> Self {
        Self {
            presale,
            whitelist,
            public,
        }
    }

    /// Same price in every open phase
    #[must_use]
    pub const fn flat(price: Amount) -> Self {
        Self::new(price, price, price)
    }

    /// Price for `phase`; `None` for Locked
    #[must_use]
    pub const fn price_for(&self, phase: Phase) -> Option<Amount> {
        match phase {
            Phase::Locked => None,
            Phase::Presale => Some(self.presale),
            Phase::Whitelist => Some(self.whitelist),
            Phase::Public => Some(self.public),
        }
    }
}

/// What the current phase demands of a mint request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub phase: Phase,
    /// `None` while Locked
    pub price: Option<Amount>,
    pub proof_required: bool,
}

/// Administrative issuance settings
#[derive(Debug, Clone)]
pub struct PhaseController {
    administrator: Identity,
    phase: Phase,
    prices: PriceTable,
    merkle_root: Option<Hash32>,
}

impl PhaseController {
    #[must_use]
    pub fn new(administrator: Identity, phase: Phase, prices: PriceTable) -> Self {
        Self {
            administrator,
            phase,
            prices,
            merkle_root: None,
        }
    }

    #[must_use]
    pub fn with_merkle_root(mut self, root: Option<Hash32>) -> Self {
        self.merkle_root = root;
        self
    }

    #[inline]
    #[must_use]
    pub fn administrator(&self) -> Identity {
        self.administrator
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn prices(&self) -> PriceTable {
        self.prices
    }

    #[inline]
    #[must_use]
    pub fn merkle_root(&self) -> Option<Hash32> {
        self.merkle_root
    }

    /// Projection consumed by the engine
    #[must_use]
    pub fn current_requirement(&self) -> Requirement {
        Requirement {
            phase: self.phase,
            price: self.prices.price_for(self.phase),
            proof_required: self.phase == Phase::Whitelist,
        }
    }

    /// True when `proof` places `identity` under the committed root.
    /// Without a root nobody is admitted.
    #[must_use]
    pub fn admits(&self, identity: &Identity, proof: &[Hash32]) -> bool {
        self.merkle_root
            .is_some_and(|root| merkle::verify_member(proof, root, identity))
    }

    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator
    pub fn set_phase(&mut self, caller: Identity, phase: Phase) -> Result<Event, MintError> {
        self.require_admin(caller, "change the phase")?;
        let from = std::mem::replace(&mut self.phase, phase);
        Ok(Event::PhaseChanged { from, to: phase })
    }

    /// Replace all three prices at once
    ///
    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator
    pub fn set_prices(&mut self, caller: Identity, prices: PriceTable) -> Result<Event, MintError> {
        self.require_admin(caller, "change prices")?;
        self.prices = prices;
        Ok(Event::PricesChanged {
            presale: prices.presale,
            whitelist: prices.whitelist,
            public: prices.public,
        })
    }

    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator
    pub fn set_merkle_root(&mut self, caller: Identity, root: Hash32) -> Result<Event, MintError> {
        self.require_admin(caller, "change the whitelist root")?;
        self.merkle_root = Some(root);
        Ok(Event::MerkleRootChanged { root })
    }

    pub(crate) fn require_admin(&self, caller: Identity, action: &'static str) -> Result<(), MintError> {
        if caller == self.administrator {
            Ok(())
        } else {
            Err(MintError::unauthorized(caller, action))
        }
    }
}
