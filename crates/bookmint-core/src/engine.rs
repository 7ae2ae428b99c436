//! Issuance engine
//!
//! [`IssuanceEngine`] turns a paid mint request into a token and the library
//! bound to it. A request either commits both or leaves no trace: the ledger
//! is checkpointed before any reservation, and a factory failure unwinds the
//! claim, the reserved id and the ownership record. A factory that panics is
//! treated as a failed creation, and a handle already bound to another token
//! is rejected the same way.
//!
//! # Locking
//!
//! All state sits behind one [`ReentrantMutex`]. Callers on other threads
//! block until the current request finishes. A call arriving on the same
//! thread while a request is in flight (the factory or payout sink calling
//! back in) re-acquires the lock, trips the [`CallGuard`] and fails with
//! [`MintError::ReentrantCall`] before it can observe any state. Reads go
//! through the same guard, which is why they return `Result`.

use crate::config::{EngineConfig, OverpaymentPolicy};
use crate::error::MintError;
use crate::guard::CallGuard;
use crate::ledger::IssuanceLedger;
use crate::payout::PayoutSink;
use crate::phase::{PhaseController, PriceTable};
use crate::tokens::TokenBook;
use bookmint_library::{LibraryConfig, LibraryError, LibraryFactory};
use bookmint_primitives::{
    Amount, Event, EventLog, Hash32, Identity, LibraryHandle, Phase, TokenId,
};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Outcome of a successful mint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintReceipt {
    pub token_id: TokenId,
    pub library: LibraryHandle,
    /// Amount credited to the treasury
    pub paid: Amount,
    /// Change handed back under [`OverpaymentPolicy::Refund`]; zero otherwise
    pub refunded: Amount,
}

struct EngineState {
    minter: Identity,
    overpayment: OverpaymentPolicy,
    library_config: LibraryConfig,
    base_uri: String,
    paused: bool,
    phases: PhaseController,
    ledger: IssuanceLedger,
    tokens: TokenBook,
    balance: Amount,
}

struct EngineCell {
    guard: CallGuard,
    state: RefCell<EngineState>,
}

/// Phased, capped issuance of library-bound tokens
pub struct IssuanceEngine {
    cell: ReentrantMutex<EngineCell>,
    factory: Arc<dyn LibraryFactory>,
    payouts: Arc<dyn PayoutSink>,
    events: Arc<EventLog>,
}

impl std::fmt::Debug for IssuanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceEngine")
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl IssuanceEngine {
    /// Build an engine from a validated configuration.
    ///
    /// The factory must accept `config.minter` as a library creator.
    ///
    /// # Errors
    /// `InvalidConfig` if `config` fails validation
    pub fn new(
        config: EngineConfig,
        factory: Arc<dyn LibraryFactory>,
        payouts: Arc<dyn PayoutSink>,
        events: Arc<EventLog>,
    ) -> Result<Self, MintError> {
        config.validate()?;

        let phases = PhaseController::new(config.administrator, config.phase, config.prices)
            .with_merkle_root(config.merkle_root);
        let state = EngineState {
            minter: config.minter,
            overpayment: config.overpayment,
            library_config: config.library,
            base_uri: config.base_uri,
            paused: false,
            phases,
            ledger: IssuanceLedger::new(config.max_supply),
            tokens: TokenBook::new(),
            balance: 0,
        };

        tracing::info!(
            max_supply = config.max_supply,
            phase = %config.phase,
            administrator = %config.administrator,
            "issuance engine ready"
        );

        Ok(Self {
            cell: ReentrantMutex::new(EngineCell {
                guard: CallGuard::default(),
                state: RefCell::new(state),
            }),
            factory,
            payouts,
            events,
        })
    }

    /// Shared audit trail
    #[must_use]
    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    // ------------------------------------------------------------------
    // Issuance
    // ------------------------------------------------------------------

    /// Issue the next token to `caller` and open its library.
    ///
    /// `proof` is only consulted in the Whitelist phase. Checks run in a
    /// fixed order: paused, supply, phase, payment, claim, proof.
    ///
    /// # Errors
    /// Any [`MintError`]; on error nothing was issued, claimed or credited
    pub fn mint(
        &self,
        caller: Identity,
        proof: &[Hash32],
        value: Amount,
    ) -> Result<MintReceipt, MintError> {
        self.transact(|state| {
            if state.paused {
                return Err(MintError::Paused);
            }
            if state.ledger.is_exhausted() {
                return Err(MintError::SupplyExhausted {
                    max_supply: state.ledger.max_supply(),
                });
            }

            let requirement = state.phases.current_requirement();
            let Some(price) = requirement.price else {
                return Err(MintError::MintingLocked);
            };
            if value < price {
                return Err(MintError::InsufficientPayment {
                    required: price,
                    provided: value,
                });
            }

            let checkpoint = state.ledger.checkpoint();
            if requirement.proof_required {
                if state.ledger.has_claimed(&caller) {
                    return Err(MintError::AlreadyClaimed(caller));
                }
                if !state.phases.admits(&caller, proof) {
                    return Err(MintError::InvalidProof(caller));
                }
                state.ledger.mark_claimed(caller)?;
            }

            let token_id = match state.ledger.reserve_next_id() {
                Ok(id) => id,
                Err(e) => {
                    state.ledger.rollback(checkpoint);
                    return Err(e);
                }
            };
            if let Err(e) = state.tokens.mint(token_id, caller) {
                state.ledger.rollback(checkpoint);
                return Err(e);
            }

            let created = guarded(|| {
                self.factory
                    .create_library(state.minter, caller, &state.library_config)
            });
            let library = match created.map_err(MintError::from).and_then(|library| {
                state.tokens.associate(token_id, library)?;
                Ok(library)
            }) {
                Ok(library) => library,
                Err(e) => {
                    state.tokens.unmint(token_id);
                    state.ledger.rollback(checkpoint);
                    tracing::warn!(%token_id, %caller, error = %e, "mint rolled back");
                    return Err(e);
                }
            };

            let (paid, refunded) = match state.overpayment {
                OverpaymentPolicy::Retain => (value, 0),
                OverpaymentPolicy::Refund => (price, value - price),
            };
            state.balance = state.balance.saturating_add(paid);

            self.events.append(Event::TokenIssued {
                token_id,
                holder: caller,
                library,
                paid,
            });
            tracing::info!(
                %token_id,
                holder = %caller,
                library = %library.short(),
                phase = %requirement.phase,
                paid,
                "token issued"
            );

            Ok(MintReceipt {
                token_id,
                library,
                paid,
                refunded,
            })
        })
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator
    pub fn set_phase(&self, caller: Identity, phase: Phase) -> Result<(), MintError> {
        self.transact(|state| {
            let event = state.phases.set_phase(caller, phase)?;
            tracing::info!(%phase, "phase changed");
            self.events.append(event);
            Ok(())
        })
    }

    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator
    pub fn set_prices(&self, caller: Identity, prices: PriceTable) -> Result<(), MintError> {
        self.transact(|state| {
            let event = state.phases.set_prices(caller, prices)?;
            tracing::info!(?prices, "prices changed");
            self.events.append(event);
            Ok(())
        })
    }

    /// Replace the whitelist root. Proofs against the old root stop
    /// verifying; recorded claims stay.
    ///
    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator
    pub fn set_merkle_root(&self, caller: Identity, root: Hash32) -> Result<(), MintError> {
        self.transact(|state| {
            let event = state.phases.set_merkle_root(caller, root)?;
            tracing::info!(root = %root.short(), "whitelist root changed");
            self.events.append(event);
            Ok(())
        })
    }

    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator
    pub fn set_base_uri(&self, caller: Identity, uri: impl Into<String>) -> Result<(), MintError> {
        let uri = uri.into();
        self.transact(|state| {
            state.phases.require_admin(caller, "change the base uri")?;
            state.base_uri.clone_from(&uri);
            self.events.append(Event::BaseUriChanged { uri });
            Ok(())
        })
    }

    /// # Errors
    /// `Unauthorized` for non-administrators, `Paused` if already paused
    pub fn pause(&self, caller: Identity) -> Result<(), MintError> {
        self.transact(|state| {
            state.phases.require_admin(caller, "pause issuance")?;
            if state.paused {
                return Err(MintError::Paused);
            }
            state.paused = true;
            self.events.append(Event::Paused);
            tracing::warn!("issuance paused");
            Ok(())
        })
    }

    /// # Errors
    /// `Unauthorized` for non-administrators, `NotPaused` if running
    pub fn unpause(&self, caller: Identity) -> Result<(), MintError> {
        self.transact(|state| {
            state.phases.require_admin(caller, "unpause issuance")?;
            if !state.paused {
                return Err(MintError::NotPaused);
            }
            state.paused = false;
            self.events.append(Event::Unpaused);
            tracing::info!("issuance resumed");
            Ok(())
        })
    }

    /// Send the whole treasury balance to the administrator.
    ///
    /// The balance is zeroed before the transfer and restored if the sink
    /// rejects it.
    ///
    /// # Errors
    /// `Unauthorized`, `NothingToWithdraw`, or `Payout` when the sink fails
    pub fn withdraw(&self, caller: Identity) -> Result<Amount, MintError> {
        self.transact(|state| {
            state.phases.require_admin(caller, "withdraw funds")?;
            let amount = std::mem::take(&mut state.balance);
            if amount == 0 {
                return Err(MintError::NothingToWithdraw);
            }
            if let Err(e) = self.payouts.transfer(caller, amount) {
                state.balance = amount;
                tracing::warn!(amount, error = %e, "withdrawal failed");
                return Err(e.into());
            }
            self.events.append(Event::Withdrawn { to: caller, amount });
            tracing::info!(amount, to = %caller, "treasury withdrawn");
            Ok(amount)
        })
    }

    /// Open a library for `owner` without issuing a token.
    ///
    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator, or the factory error
    pub fn create_library_directly(
        &self,
        caller: Identity,
        owner: Identity,
        config: LibraryConfig,
    ) -> Result<LibraryHandle, MintError> {
        self.transact(|state| {
            state.phases.require_admin(caller, "create libraries directly")?;
            let handle = guarded(|| self.factory.create_library(state.minter, owner, &config))?;
            tracing::info!(library = %handle.short(), %owner, "library created directly");
            Ok(handle)
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn current_phase(&self) -> Result<Phase, MintError> {
        self.read(|state| state.phases.phase())
    }

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn prices(&self) -> Result<PriceTable, MintError> {
        self.read(|state| state.phases.prices())
    }

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn merkle_root(&self) -> Result<Option<Hash32>, MintError> {
        self.read(|state| state.phases.merkle_root())
    }

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn administrator(&self) -> Result<Identity, MintError> {
        self.read(|state| state.phases.administrator())
    }

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn total_issued(&self) -> Result<u64, MintError> {
        self.read(|state| state.ledger.total_issued())
    }

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn max_supply(&self) -> Result<u64, MintError> {
        self.read(|state| state.ledger.max_supply())
    }

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn is_paused(&self) -> Result<bool, MintError> {
        self.read(|state| state.paused)
    }

    /// Treasury balance awaiting withdrawal
    ///
    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn balance(&self) -> Result<Amount, MintError> {
        self.read(|state| state.balance)
    }

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn has_claimed(&self, identity: &Identity) -> Result<bool, MintError> {
        self.read(|state| state.ledger.has_claimed(identity))
    }

    /// Identities that consumed their whitelist allocation, in claim order
    ///
    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn claimants(&self) -> Result<Vec<Identity>, MintError> {
        self.read(|state| state.ledger.claimants().copied().collect())
    }

    /// # Errors
    /// `UnknownToken` if `id` was never issued
    pub fn owner_of(&self, id: TokenId) -> Result<Identity, MintError> {
        self.read(|state| state.tokens.owner_of(id).ok_or(MintError::UnknownToken(id)))?
    }

    /// Number of tokens held by `holder`
    ///
    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn balance_of(&self, holder: &Identity) -> Result<u64, MintError> {
        self.read(|state| state.tokens.balance_of(holder))
    }

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn tokens_of(&self, holder: &Identity) -> Result<Vec<TokenId>, MintError> {
        self.read(|state| state.tokens.tokens_of(holder))
    }

    /// Library bound to `id`
    ///
    /// # Errors
    /// `UnknownToken` if `id` was never issued
    pub fn library_for(&self, id: TokenId) -> Result<LibraryHandle, MintError> {
        self.read(|state| state.tokens.library_of(id).ok_or(MintError::UnknownToken(id)))?
    }

    /// Metadata location: the base uri followed by the decimal id
    ///
    /// # Errors
    /// `UnknownToken` if `id` was never issued
    pub fn token_uri(&self, id: TokenId) -> Result<String, MintError> {
        self.read(|state| {
            state
                .tokens
                .owner_of(id)
                .map(|_| format!("{}{}", state.base_uri, id.value()))
                .ok_or(MintError::UnknownToken(id))
        })?
    }

    /// Tokens owned without a library; empty whenever no request is in flight
    ///
    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn orphaned_tokens(&self) -> Result<Vec<TokenId>, MintError> {
        self.read(|state| state.tokens.orphans())
    }

    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn library_count(&self) -> Result<usize, MintError> {
        self.read(|_| self.factory.count())
    }

    /// # Errors
    /// `IndexOutOfRange` from the factory past the last library
    pub fn library_by_index(&self, index: usize) -> Result<LibraryHandle, MintError> {
        self.read(|_| self.factory.by_index(index))?
            .map_err(MintError::from)
    }

    /// Every library in creation order
    ///
    /// # Errors
    /// `ReentrantCall` from inside another engine call
    pub fn libraries(&self) -> Result<Vec<LibraryHandle>, MintError> {
        self.read(|_| self.factory.all())
    }

    // ------------------------------------------------------------------
    // Guarded access
    // ------------------------------------------------------------------

    fn transact<R>(
        &self,
        f: impl FnOnce(&mut EngineState) -> Result<R, MintError>,
    ) -> Result<R, MintError> {
        let cell = self.cell.lock();
        let _entered = cell.guard.enter()?;
        let mut state = cell.state.borrow_mut();
        f(&mut state)
    }

    fn read<R>(&self, f: impl FnOnce(&EngineState) -> R) -> Result<R, MintError> {
        let cell = self.cell.lock();
        let _entered = cell.guard.enter()?;
        let state = cell.state.borrow();
        Ok(f(&state))
    }
}

/// Run a factory call, reporting a panic as a failed creation
fn guarded<T>(call: impl FnOnce() -> Result<T, LibraryError>) -> Result<T, LibraryError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown cause".to_string());
        Err(LibraryError::CreationFailed(format!("factory panicked: {reason}")))
    })
}
