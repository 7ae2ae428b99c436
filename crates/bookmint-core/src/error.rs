//! Error types for the issuance engine
//!
//! Every failure surfaces synchronously with a specific variant and message.
//! Nothing here is retried by the engine; [`MintError::kind`] groups variants
//! for callers that only care about the class of failure.

use crate::payout::PayoutError;
use bookmint_library::LibraryError;
use bookmint_primitives::{Amount, Identity, LibraryHandle, TokenId};

/// Failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller lacks the required role
    Authorization,
    /// Wrong phase, paused, supply exhausted, nested call
    State,
    /// Bad payment, proof or configuration
    Validation,
    /// Already claimed, id collision, library bound twice
    Conflict,
    /// Factory or payout collaborator failed
    Dependency,
    /// Unknown token or library
    NotFound,
}

/// Issuance engine error
#[derive(Debug, thiserror::Error)]
pub enum MintError {
    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        caller: Identity,
        action: &'static str,
    },

    #[error("issuance is paused")]
    Paused,

    #[error("issuance is not paused")]
    NotPaused,

    #[error("minting is locked")]
    MintingLocked,

    #[error("supply exhausted: all {max_supply} tokens issued")]
    SupplyExhausted { max_supply: u64 },

    #[error("re-entrant call rejected while another operation is in flight")]
    ReentrantCall,

    #[error("nothing to withdraw")]
    NothingToWithdraw,

    #[error("insufficient payment: required {required}, provided {provided}")]
    InsufficientPayment { required: Amount, provided: Amount },

    #[error("invalid whitelist proof for {0}")]
    InvalidProof(Identity),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} already claimed its whitelist allocation")]
    AlreadyClaimed(Identity),

    #[error("token {0} already exists")]
    IdCollision(TokenId),

    #[error("library {library} is already bound to token {token_id}")]
    LibraryAlreadyBound {
        library: LibraryHandle,
        token_id: TokenId,
    },

    #[error("library factory failed: {0}")]
    Library(#[from] LibraryError),

    #[error("payout failed: {0}")]
    Payout(#[from] PayoutError),

    #[error("unknown token {0}")]
    UnknownToken(TokenId),
}

impl MintError {
    /// Class of this failure
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::Paused
            | Self::NotPaused
            | Self::MintingLocked
            | Self::SupplyExhausted { .. }
            | Self::ReentrantCall
            | Self::NothingToWithdraw => ErrorKind::State,
            Self::InsufficientPayment { .. } | Self::InvalidProof(_) | Self::InvalidConfig(_) => {
                ErrorKind::Validation
            }
            Self::AlreadyClaimed(_)
            | Self::IdCollision(_)
            | Self::LibraryAlreadyBound { .. } => ErrorKind::Conflict,
            Self::Library(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::Library(e) if e.is_authorization() => ErrorKind::Authorization,
            Self::Library(_) | Self::Payout(_) => ErrorKind::Dependency,
            Self::UnknownToken(_) => ErrorKind::NotFound,
        }
    }

    /// Stable short code, useful in logs and CLI output
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::Paused => "paused",
            Self::NotPaused => "not_paused",
            Self::MintingLocked => "minting_locked",
            Self::SupplyExhausted { .. } => "supply_exhausted",
            Self::ReentrantCall => "reentrant_call",
            Self::NothingToWithdraw => "nothing_to_withdraw",
            Self::InsufficientPayment { .. } => "insufficient_payment",
            Self::InvalidProof(_) => "invalid_proof",
            Self::InvalidConfig(_) => "invalid_config",
            Self::AlreadyClaimed(_) => "already_claimed",
            Self::IdCollision(_) => "id_collision",
            Self::LibraryAlreadyBound { .. } => "library_already_bound",
            Self::Library(_) => "library_failed",
            Self::Payout(_) => "payout_failed",
            Self::UnknownToken(_) => "unknown_token",
        }
    }

    pub(crate) fn unauthorized(caller: Identity, action: &'static str) -> Self {
        Self::Unauthorized { caller, action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let who = Identity::derive(b"who");
        assert_eq!(
            MintError::unauthorized(who, "pause").kind(),
            ErrorKind::Authorization
        );
        assert_eq!(MintError::MintingLocked.kind(), ErrorKind::State);
        assert_eq!(
            MintError::SupplyExhausted { max_supply: 2 }.kind(),
            ErrorKind::State
        );
        assert_eq!(MintError::InvalidProof(who).kind(), ErrorKind::Validation);
        assert_eq!(MintError::AlreadyClaimed(who).kind(), ErrorKind::Conflict);
        assert_eq!(
            MintError::LibraryAlreadyBound {
                library: LibraryHandle::new([1u8; 32]),
                token_id: TokenId(0),
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            MintError::Library(LibraryError::CreationFailed("boom".into())).kind(),
            ErrorKind::Dependency
        );
        assert_eq!(
            MintError::Library(LibraryError::IndexOutOfRange { index: 3, count: 1 }).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(MintError::UnknownToken(TokenId(4)).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn messages_are_human_readable() {
        let err = MintError::InsufficientPayment {
            required: 10,
            provided: 3,
        };
        assert_eq!(err.to_string(), "insufficient payment: required 10, provided 3");
        assert_eq!(err.code(), "insufficient_payment");
    }
}
