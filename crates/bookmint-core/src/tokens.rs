//! Token ownership and token→library association

use crate::error::MintError;
use bookmint_primitives::{Identity, LibraryHandle, TokenId};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct TokenBook {
    owners: BTreeMap<TokenId, Identity>,
    libraries: BTreeMap<TokenId, LibraryHandle>,
    bound: HashMap<LibraryHandle, TokenId>,
    holdings: HashMap<Identity, u64>,
}

impl TokenBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `holder` as owner of a freshly reserved id.
    ///
    /// # Errors
    /// `IdCollision` if the id is already owned
    pub fn mint(&mut self, id: TokenId, holder: Identity) -> Result<(), MintError> {
        if self.owners.contains_key(&id) {
            return Err(MintError::IdCollision(id));
        }
        self.owners.insert(id, holder);
        *self.holdings.entry(holder).or_default() += 1;
        Ok(())
    }

    /// Undo a mint whose library was never attached.
    pub(crate) fn unmint(&mut self, id: TokenId) {
        if self.libraries.contains_key(&id) {
            return;
        }
        if let Some(holder) = self.owners.remove(&id) {
            if let Some(count) = self.holdings.get_mut(&holder) {
                *count -= 1;
                if *count == 0 {
                    self.holdings.remove(&holder);
                }
            }
        }
    }

    /// Attach the library created for `id`; written once.
    ///
    /// # Errors
    /// `UnknownToken` if `id` was not minted, `IdCollision` if already
    /// associated, `LibraryAlreadyBound` if another token holds `library`
    pub fn associate(&mut self, id: TokenId, library: LibraryHandle) -> Result<(), MintError> {
        if !self.owners.contains_key(&id) {
            return Err(MintError::UnknownToken(id));
        }
        if self.libraries.contains_key(&id) {
            return Err(MintError::IdCollision(id));
        }
        if let Some(&token_id) = self.bound.get(&library) {
            return Err(MintError::LibraryAlreadyBound { library, token_id });
        }
        self.libraries.insert(id, library);
        self.bound.insert(library, id);
        Ok(())
    }

    /// Token bound to `library`, if any
    #[must_use]
    pub fn token_for(&self, library: &LibraryHandle) -> Option<TokenId> {
        self.bound.get(library).copied()
    }

    #[must_use]
    pub fn owner_of(&self, id: TokenId) -> Option<Identity> {
        self.owners.get(&id).copied()
    }

    #[must_use]
    pub fn library_of(&self, id: TokenId) -> Option<LibraryHandle> {
        self.libraries.get(&id).copied()
    }

    #[must_use]
    pub fn balance_of(&self, holder: &Identity) -> u64 {
        self.holdings.get(holder).copied().unwrap_or(0)
    }

    /// Ids held by `holder`, ascending
    #[must_use]
    pub fn tokens_of(&self, holder: &Identity) -> Vec<TokenId> {
        self.owners
            .iter()
            .filter(|(_, owner)| *owner == holder)
            .map(|(id, _)| *id)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Ids owned but not associated; empty outside an in-flight request
    #[must_use]
    pub fn orphans(&self) -> Vec<TokenId> {
        self.owners
            .keys()
            .filter(|id| !self.libraries.contains_key(*id))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_associate_and_query() {
        let mut book = TokenBook::new();
        let alice = Identity::derive(b"alice");
        let handle = LibraryHandle::new([3u8; 32]);

        book.mint(TokenId(0), alice).unwrap();
        assert_eq!(book.orphans(), vec![TokenId(0)]);
        book.associate(TokenId(0), handle).unwrap();

        assert!(book.orphans().is_empty());
        assert_eq!(book.owner_of(TokenId(0)), Some(alice));
        assert_eq!(book.library_of(TokenId(0)), Some(handle));
        assert_eq!(book.balance_of(&alice), 1);
        assert_eq!(book.tokens_of(&alice), vec![TokenId(0)]);
    }

    #[test]
    fn collisions_are_rejected() {
        let mut book = TokenBook::new();
        let alice = Identity::derive(b"alice");
        let handle = LibraryHandle::new([3u8; 32]);
        book.mint(TokenId(0), alice).unwrap();
        assert!(matches!(
            book.mint(TokenId(0), alice),
            Err(MintError::IdCollision(TokenId(0)))
        ));
        book.associate(TokenId(0), handle).unwrap();
        assert!(matches!(
            book.associate(TokenId(0), handle),
            Err(MintError::IdCollision(TokenId(0)))
        ));
        assert!(matches!(
            book.associate(TokenId(9), handle),
            Err(MintError::UnknownToken(TokenId(9)))
        ));
    }

    #[test]
    fn library_binds_to_one_token() {
        let mut book = TokenBook::new();
        let alice = Identity::derive(b"alice");
        let handle = LibraryHandle::new([5u8; 32]);
        book.mint(TokenId(0), alice).unwrap();
        book.mint(TokenId(1), alice).unwrap();
        book.associate(TokenId(0), handle).unwrap();

        assert!(matches!(
            book.associate(TokenId(1), handle),
            Err(MintError::LibraryAlreadyBound { token_id: TokenId(0), .. })
        ));
        assert_eq!(book.token_for(&handle), Some(TokenId(0)));
        assert_eq!(book.orphans(), vec![TokenId(1)]);
    }

    #[test]
    fn unmint_removes_only_unassociated() {
        let mut book = TokenBook::new();
        let alice = Identity::derive(b"alice");
        book.mint(TokenId(0), alice).unwrap();
        book.associate(TokenId(0), LibraryHandle::new([1u8; 32])).unwrap();
        book.mint(TokenId(1), alice).unwrap();

        book.unmint(TokenId(1));
        book.unmint(TokenId(0));

        assert_eq!(book.len(), 1);
        assert_eq!(book.owner_of(TokenId(1)), None);
        assert_eq!(book.balance_of(&alice), 1);
    }
}
