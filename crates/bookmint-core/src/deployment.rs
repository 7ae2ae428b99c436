//! In-process wiring
//!
//! A [`Deployment`] stands up everything one engine needs: a shared event
//! log, a library registry that trusts the engine's minter identity, a payout
//! journal and the engine itself.

use crate::config::EngineConfig;
use crate::engine::IssuanceEngine;
use crate::error::MintError;
use crate::payout::PayoutJournal;
use bookmint_library::{LibraryFactory, LibraryRegistry};
use bookmint_primitives::EventLog;
use std::sync::Arc;

#[derive(Debug)]
pub struct Deployment {
    pub engine: IssuanceEngine,
    pub registry: Arc<LibraryRegistry>,
    pub payouts: Arc<PayoutJournal>,
    pub events: Arc<EventLog>,
}

impl Deployment {
    /// Engine backed by an in-memory [`LibraryRegistry`].
    ///
    /// # Errors
    /// `InvalidConfig` if `config` fails validation
    pub fn in_memory(config: EngineConfig) -> Result<Self, MintError> {
        let events = Arc::new(EventLog::new());
        let registry = Arc::new(LibraryRegistry::new(config.administrator, events.clone()));
        Self::with_factory(config, registry.clone(), registry, events)
    }

    /// Same wiring, but the engine talks to `factory` instead of the
    /// registry. Used to wrap the registry with fault injection.
    ///
    /// # Errors
    /// `InvalidConfig` if `config` fails validation
    pub fn with_factory(
        config: EngineConfig,
        registry: Arc<LibraryRegistry>,
        factory: Arc<dyn LibraryFactory>,
        events: Arc<EventLog>,
    ) -> Result<Self, MintError> {
        config.validate()?;
        registry.authorize_creator(config.administrator, config.minter)?;
        let payouts = Arc::new(PayoutJournal::new());
        let engine = IssuanceEngine::new(config, factory, payouts.clone(), events.clone())?;
        Ok(Self {
            engine,
            registry,
            payouts,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookmint_primitives::{Identity, Phase};

    #[test]
    fn minter_is_authorized_and_events_shared() {
        let config = EngineConfig::new(4, Identity::derive(b"admin"), Identity::derive(b"minter"))
            .with_phase(Phase::Public);
        let minter = config.minter;
        let deployment = Deployment::in_memory(config).unwrap();

        assert!(deployment.registry.is_creator(&minter));
        let receipt = deployment
            .engine
            .mint(Identity::derive(b"reader"), &[], 0)
            .unwrap();

        let kinds: Vec<_> = deployment
            .events
            .events()
            .iter()
            .map(|r| r.event.kind())
            .collect();
        assert_eq!(kinds, vec!["creator_authorized", "library_created", "token_issued"]);
        assert_eq!(
            deployment.registry.library(receipt.library).unwrap().owner(),
            Identity::derive(b"reader")
        );
    }
}
