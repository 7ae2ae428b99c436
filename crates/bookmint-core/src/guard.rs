//! Single-acquisition call guard
//!
//! The engine lock is reentrant so that a nested call from the same thread
//! (a factory or payout sink calling back into the engine) does not deadlock;
//! this flag turns that nested call into [`MintError::ReentrantCall`]. The
//! flag is cleared when the [`Entered`] token drops, on every exit path.

use crate::error::MintError;
use std::cell::Cell;

#[derive(Debug, Default)]
pub(crate) struct CallGuard {
    entered: Cell<bool>,
}

impl CallGuard {
    pub(crate) fn enter(&self) -> Result<Entered<'_>, MintError> {
        if self.entered.replace(true) {
            tracing::warn!("re-entrant engine call rejected");
            return Err(MintError::ReentrantCall);
        }
        Ok(Entered {
            flag: &self.entered,
        })
    }

    #[cfg(test)]
    fn is_entered(&self) -> bool {
        self.entered.get()
    }
}

pub(crate) struct Entered<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
