//! Error types for libraries and the factory

use bookmint_primitives::{Identity, LibraryHandle};

/// Library and factory errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LibraryError {
    /// Caller may not perform this operation
    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        caller: Identity,
        action: &'static str,
    },

    /// Allocation of a new library failed
    #[error("library creation failed: {0}")]
    CreationFailed(String),

    /// No library with this handle
    #[error("unknown library {0}")]
    UnknownLibrary(LibraryHandle),

    /// Registry index out of range
    #[error("library index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// Entry index out of range
    #[error("entry {index} not found")]
    UnknownEntry { index: usize },

    /// Library is full
    #[error("library capacity of {capacity} entries reached")]
    CapacityReached { capacity: usize },

    /// Entry exceeds the configured size
    #[error("entry of {len} bytes exceeds limit of {max}")]
    EntryTooLarge { len: usize, max: usize },

    /// Collaborator bookkeeping conflicts
    #[error("{0} is already a collaborator")]
    AlreadyCollaborator(Identity),

    #[error("{0} is not a collaborator")]
    NotCollaborator(Identity),
}

impl LibraryError {
    /// True when the caller lacked a role
    #[inline]
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// True for lookups that found nothing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownLibrary(_) | Self::IndexOutOfRange { .. } | Self::UnknownEntry { .. }
        )
    }

    pub(crate) fn unauthorized(caller: Identity, action: &'static str) -> Self {
        Self::Unauthorized { caller, action }
    }
}
