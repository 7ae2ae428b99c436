//! Testing utilities for the bookmint workspace
//!
//! Shared identities, whitelist fixtures, ready-made deployments and
//! collaborators that fail on demand.

#![allow(missing_docs)]

use bookmint_core::{Deployment, EngineConfig, PayoutError, PayoutSink, PriceTable};
use bookmint_library::{LibraryConfig, LibraryError, LibraryFactory, LibraryRegistry};
use bookmint_primitives::{Amount, EventLog, Identity, LibraryHandle, MembershipTree, Phase};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

pub fn admin() -> Identity {
    Identity::derive(b"bookmint/test/admin")
}

pub fn minter() -> Identity {
    Identity::derive(b"bookmint/test/minter")
}

/// Deterministic caller number `n`
pub fn identity(n: usize) -> Identity {
    Identity::derive(format!("bookmint/test/reader/{n}").as_bytes())
}

pub fn identities(count: usize) -> Vec<Identity> {
    (0..count).map(identity).collect()
}

pub fn whitelist(members: &[Identity]) -> MembershipTree {
    MembershipTree::from_members(members.iter().copied())
}

/// Public phase, flat price
pub fn public_config(max_supply: u64, price: Amount) -> EngineConfig {
    EngineConfig::new(max_supply, admin(), minter())
        .with_phase(Phase::Public)
        .with_prices(PriceTable::flat(price))
}

/// Whitelist phase committed to `tree`
pub fn whitelist_config(max_supply: u64, price: Amount, tree: &MembershipTree) -> EngineConfig {
    public_config(max_supply, price)
        .with_phase(Phase::Whitelist)
        .with_merkle_root(tree.root())
}

pub fn deploy(config: EngineConfig) -> Deployment {
    Deployment::in_memory(config).unwrap()
}

pub fn public_deployment(max_supply: u64, price: Amount) -> Deployment {
    deploy(public_config(max_supply, price))
}

/// Deploy with the engine talking to a wrapper around the registry
pub fn deploy_with<F>(
    config: EngineConfig,
    wrap: impl FnOnce(Arc<LibraryRegistry>) -> F,
) -> (Deployment, Arc<F>)
where
    F: LibraryFactory + 'static,
{
    let events = Arc::new(EventLog::new());
    let registry = Arc::new(LibraryRegistry::new(config.administrator, events.clone()));
    let factory = Arc::new(wrap(registry.clone()));
    let deployment = Deployment::with_factory(config, registry, factory.clone(), events).unwrap();
    (deployment, factory)
}

/// Factory that fails chosen calls (1-based) and passes the rest through
#[derive(Debug)]
pub struct FailingFactory {
    inner: Arc<LibraryRegistry>,
    fail_on: Mutex<BTreeSet<u64>>,
    calls: Mutex<u64>,
}

impl FailingFactory {
    pub fn new(inner: Arc<LibraryRegistry>) -> Self {
        Self {
            inner,
            fail_on: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(0),
        }
    }

    /// Fail the `n`th call to `create_library`
    pub fn fail_on_call(self, n: u64) -> Self {
        self.fail_on.lock().insert(n);
        self
    }

    /// Fail the very next call
    pub fn fail_next(&self) {
        let next = *self.calls.lock() + 1;
        self.fail_on.lock().insert(next);
    }

    pub fn calls(&self) -> u64 {
        *self.calls.lock()
    }
}

impl LibraryFactory for FailingFactory {
    fn create_library(
        &self,
        caller: Identity,
        owner: Identity,
        config: &LibraryConfig,
    ) -> Result<LibraryHandle, LibraryError> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        if self.fail_on.lock().remove(&call) {
            return Err(LibraryError::CreationFailed(format!("forced failure on call {call}")));
        }
        self.inner.create_library(caller, owner, config)
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn by_index(&self, index: usize) -> Result<LibraryHandle, LibraryError> {
        self.inner.by_index(index)
    }

    fn all(&self) -> Vec<LibraryHandle> {
        self.inner.all()
    }
}

/// Payout sink that rejects every transfer
#[derive(Debug, Default)]
pub struct RejectingSink;

impl PayoutSink for RejectingSink {
    fn transfer(&self, to: Identity, amount: Amount) -> Result<(), PayoutError> {
        Err(PayoutError::Rejected {
            to,
            amount,
            reason: "sink closed".into(),
        })
    }
}
