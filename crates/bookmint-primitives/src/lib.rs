//! Bookmint primitives
//!
//! Shared vocabulary for the issuance workspace.
//!
//! # Core Concepts
//!
//! - [`Hash32`]: 32-byte SHA-256 digest
//! - [`Identity`]: 20-byte caller reference
//! - [`merkle`]: sorted-pair membership proofs and the tree builder that matches them
//! - [`EventLog`]: hash-chained audit trail
//!
//! # Example
//!
//! ```rust
//! use bookmint_primitives::{merkle, Identity, MembershipTree};
//!
//! let alice = Identity::derive(b"alice");
//! let bob = Identity::derive(b"bob");
//! let tree = MembershipTree::from_members([alice, bob]);
//!
//! let proof = tree.proof_for(&alice).unwrap();
//! assert!(merkle::verify_member(&proof, tree.root(), &alice));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod hash;
mod identity;
mod types;

pub mod events;
pub mod merkle;

pub use events::{Event, EventLog, EventRecord, LogError};
pub use hash::{Hash32, HashError};
pub use identity::Identity;
pub use merkle::MembershipTree;
pub use types::{Amount, LibraryHandle, Phase, TokenId, UnknownPhase};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
