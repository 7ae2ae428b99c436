//! Bookmint issuance core
//!
//! Phased, capped issuance where every token opens a library owned by its
//! holder. A mint either produces both the token and its library or changes
//! nothing.
//!
//! # Quick Start
//!
//! ```rust
//! use bookmint_core::prelude::*;
//! use bookmint_primitives::{Identity, Phase};
//!
//! let admin = Identity::derive(b"admin");
//! let config = EngineConfig::new(100, admin, Identity::derive(b"minter"))
//!     .with_phase(Phase::Public)
//!     .with_prices(PriceTable::flat(10));
//! let deployment = Deployment::in_memory(config).unwrap();
//!
//! let reader = Identity::derive(b"reader");
//! let receipt = deployment.engine.mint(reader, &[], 10).unwrap();
//! assert_eq!(deployment.engine.owner_of(receipt.token_id).unwrap(), reader);
//! assert_eq!(deployment.engine.library_for(receipt.token_id).unwrap(), receipt.library);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod guard;

pub mod config;
pub mod deployment;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod payout;
pub mod phase;
pub mod simulator;
pub mod tokens;

pub use config::{EngineConfig, OverpaymentPolicy};
pub use deployment::Deployment;
pub use engine::{IssuanceEngine, MintReceipt};
pub use error::{ErrorKind, MintError};
pub use payout::{PayoutError, PayoutJournal, PayoutSink};
pub use phase::{PhaseController, PriceTable, Requirement};

pub mod prelude {
    pub use crate::config::{EngineConfig, OverpaymentPolicy};
    pub use crate::deployment::Deployment;
    pub use crate::engine::{IssuanceEngine, MintReceipt};
    pub use crate::error::{ErrorKind, MintError};
    pub use crate::payout::{PayoutError, PayoutJournal, PayoutSink};
    pub use crate::phase::PriceTable;
    pub use crate::simulator::{run_simulator, SimulatorConfig, SimulatorReport};
}
