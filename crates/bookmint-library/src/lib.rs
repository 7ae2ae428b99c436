//! Bookmint libraries
//!
//! Every issued token opens exactly one [`Library`]. The issuance engine only
//! sees the [`LibraryFactory`] seam and the [`LibraryHandle`] it returns;
//! [`LibraryRegistry`] is the in-process factory with the library operations
//! (entries, contributors, collaborators) layered on top.
//!
//! [`LibraryHandle`]: bookmint_primitives::LibraryHandle

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod library;
mod registry;

pub use error::LibraryError;
pub use library::{Entry, Library, LibraryConfig};
pub use registry::{LibraryFactory, LibraryRegistry};
