//! Supply and claim accounting
//!
//! [`IssuanceLedger`] hands out token ids in order up to the cap and records
//! which identities consumed their whitelist allocation. A [`Checkpoint`]
//! taken at the start of a request lets the engine undo that request's own
//! reservations and claims if a later step fails; committed entries are never
//! removed.

use crate::error::MintError;
use bookmint_primitives::{Identity, TokenId};
use indexmap::IndexSet;

/// Ledger position to roll back to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    next_id: u64,
    claims: usize,
}

#[derive(Debug, Clone)]
pub struct IssuanceLedger {
    max_supply: u64,
    next_id: u64,
    claims: IndexSet<Identity>,
}

impl IssuanceLedger {
    #[must_use]
    pub fn new(max_supply: u64) -> Self {
        Self {
            max_supply,
            next_id: 0,
            claims: IndexSet::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn max_supply(&self) -> u64 {
        self.max_supply
    }

    /// Tokens issued so far (the counter)
    #[inline]
    #[must_use]
    pub fn total_issued(&self) -> u64 {
        self.next_id
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.max_supply - self.next_id
    }

    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.next_id >= self.max_supply
    }

    /// Take the next id.
    ///
    /// # Errors
    /// `SupplyExhausted` once every id below the cap is taken
    pub fn reserve_next_id(&mut self) -> Result<TokenId, MintError> {
        if self.is_exhausted() {
            return Err(MintError::SupplyExhausted {
                max_supply: self.max_supply,
            });
        }
        let id = TokenId(self.next_id);
        self.next_id += 1;
        Ok(id)
    }

    #[must_use]
    pub fn has_claimed(&self, identity: &Identity) -> bool {
        self.claims.contains(identity)
    }

    /// Record a whitelist claim.
    ///
    /// # Errors
    /// `AlreadyClaimed` if `identity` claimed before
    pub fn mark_claimed(&mut self, identity: Identity) -> Result<(), MintError> {
        if self.claims.insert(identity) {
            Ok(())
        } else {
            Err(MintError::AlreadyClaimed(identity))
        }
    }

    /// Claimants in claim order
    pub fn claimants(&self) -> impl Iterator<Item = &Identity> {
        self.claims.iter()
    }

    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            next_id: self.next_id,
            claims: self.claims.len(),
        }
    }

    /// Undo everything recorded after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.next_id <= self.next_id);
        debug_assert!(checkpoint.claims <= self.claims.len());
        self.next_id = checkpoint.next_id;
        self.claims.truncate(checkpoint.claims);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_until_cap() {
        let mut ledger = IssuanceLedger::new(3);
        assert_eq!(ledger.reserve_next_id().unwrap(), TokenId(0));
        assert_eq!(ledger.reserve_next_id().unwrap(), TokenId(1));
        assert_eq!(ledger.reserve_next_id().unwrap(), TokenId(2));
        assert!(matches!(
            ledger.reserve_next_id(),
            Err(MintError::SupplyExhausted { max_supply: 3 })
        ));
        assert_eq!(ledger.total_issued(), 3);
        assert_eq!(ledger.remaining(), 0);
    }

    #[test]
    fn claims_are_unique() {
        let mut ledger = IssuanceLedger::new(10);
        let alice = Identity::derive(b"alice");
        ledger.mark_claimed(alice).unwrap();
        assert!(ledger.has_claimed(&alice));
        assert!(matches!(
            ledger.mark_claimed(alice),
            Err(MintError::AlreadyClaimed(who)) if who == alice
        ));
        assert_eq!(ledger.claimants().count(), 1);
    }

    #[test]
    fn rollback_restores_counter_and_drops_new_claims_only() {
        let mut ledger = IssuanceLedger::new(10);
        let early = Identity::derive(b"early");
        let late = Identity::derive(b"late");
        ledger.mark_claimed(early).unwrap();
        ledger.reserve_next_id().unwrap();

        let checkpoint = ledger.checkpoint();
        ledger.mark_claimed(late).unwrap();
        ledger.reserve_next_id().unwrap();
        ledger.rollback(checkpoint);

        assert_eq!(ledger.total_issued(), 1);
        assert!(ledger.has_claimed(&early));
        assert!(!ledger.has_claimed(&late));
        assert_eq!(ledger.reserve_next_id().unwrap(), TokenId(1));
    }
}
