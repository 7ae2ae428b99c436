//! Outbound value transfers
//!
//! Withdrawals leave the engine through a [`PayoutSink`]. The sink is foreign
//! code, so the engine calls it inside its reentrancy guard and restores the
//! balance if the transfer is rejected.

use bookmint_primitives::{Amount, Identity};
use parking_lot::Mutex;

/// Rejected transfer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutError {
    #[error("transfer of {amount} to {to} rejected: {reason}")]
    Rejected {
        to: Identity,
        amount: Amount,
        reason: String,
    },
}

/// Destination for withdrawn funds
pub trait PayoutSink: Send + Sync {
    /// Move `amount` to `to`.
    ///
    /// # Errors
    /// Returns error if the transfer did not happen
    fn transfer(&self, to: Identity, amount: Amount) -> Result<(), PayoutError>;
}

/// Sink that records every transfer in memory
#[derive(Debug, Default)]
pub struct PayoutJournal {
    transfers: Mutex<Vec<(Identity, Amount)>>,
}

impl PayoutJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn transfers(&self) -> Vec<(Identity, Amount)> {
        self.transfers.lock().clone()
    }

    /// Sum paid to `who`
    #[must_use]
    pub fn total_to(&self, who: &Identity) -> Amount {
        self.transfers
            .lock()
            .iter()
            .filter(|(to, _)| to == who)
            .map(|(_, amount)| *amount)
            .sum()
    }
}

impl PayoutSink for PayoutJournal {
    fn transfer(&self, to: Identity, amount: Amount) -> Result<(), PayoutError> {
        self.transfers.lock().push((to, amount));
        Ok(())
    }
}
