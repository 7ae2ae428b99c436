//! A single library
//!
//! Each issued token opens one [`Library`]: an owner, a collaborator set and a
//! bounded list of entries. Only the owner and collaborators may write.

use crate::error::LibraryError;
use bookmint_primitives::{Identity, LibraryHandle};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Capacity parameters passed at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Maximum number of entries
    pub capacity: usize,
    /// Maximum entry size in bytes
    pub max_entry_len: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            max_entry_len: 4096,
        }
    }
}

impl LibraryConfig {
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_entry_len(mut self, max: usize) -> Self {
        self.max_entry_len = max;
        self
    }
}

/// One stored entry and everyone who wrote to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub data: String,
    pub contributors: Vec<Identity>,
}

/// Library state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    handle: LibraryHandle,
    owner: Identity,
    config: LibraryConfig,
    collaborators: IndexSet<Identity>,
    entries: Vec<Entry>,
}

impl Library {
    pub(crate) fn new(handle: LibraryHandle, owner: Identity, config: LibraryConfig) -> Self {
        Self {
            handle,
            owner,
            config,
            collaborators: IndexSet::new(),
            entries: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> LibraryHandle {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn owner(&self) -> Identity {
        self.owner
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> LibraryConfig {
        self.config
    }

    /// Collaborators in the order they were added
    #[must_use]
    pub fn collaborators(&self) -> Vec<Identity> {
        self.collaborators.iter().copied().collect()
    }

    #[must_use]
    pub fn can_write(&self, who: &Identity) -> bool {
        *who == self.owner || self.collaborators.contains(who)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`
    ///
    /// # Errors
    /// `UnknownEntry` if out of range
    pub fn entry(&self, index: usize) -> Result<&Entry, LibraryError> {
        self.entries
            .get(index)
            .ok_or(LibraryError::UnknownEntry { index })
    }

    /// Contributors of the entry at `index`
    ///
    /// # Errors
    /// `UnknownEntry` if out of range
    pub fn contributors(&self, index: usize) -> Result<&[Identity], LibraryError> {
        self.entry(index).map(|e| e.contributors.as_slice())
    }

    pub(crate) fn add_entry(&mut self, caller: Identity, data: String) -> Result<usize, LibraryError> {
        self.require_writer(caller, "add entries")?;
        if self.entries.len() >= self.config.capacity {
            return Err(LibraryError::CapacityReached {
                capacity: self.config.capacity,
            });
        }
        self.check_len(&data)?;
        self.entries.push(Entry {
            data,
            contributors: vec![caller],
        });
        Ok(self.entries.len() - 1)
    }

    /// Replace an entry's text; the caller joins its contributors.
    pub(crate) fn revise_entry(
        &mut self,
        caller: Identity,
        index: usize,
        data: String,
    ) -> Result<(), LibraryError> {
        self.require_writer(caller, "revise entries")?;
        self.check_len(&data)?;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(LibraryError::UnknownEntry { index })?;
        entry.data = data;
        if !entry.contributors.contains(&caller) {
            entry.contributors.push(caller);
        }
        Ok(())
    }

    pub(crate) fn add_collaborator(
        &mut self,
        caller: Identity,
        collaborator: Identity,
    ) -> Result<(), LibraryError> {
        self.require_owner(caller, "add collaborators")?;
        if collaborator == self.owner || !self.collaborators.insert(collaborator) {
            return Err(LibraryError::AlreadyCollaborator(collaborator));
        }
        Ok(())
    }

    pub(crate) fn remove_collaborator(
        &mut self,
        caller: Identity,
        collaborator: Identity,
    ) -> Result<(), LibraryError> {
        self.require_owner(caller, "remove collaborators")?;
        if !self.collaborators.shift_remove(&collaborator) {
            return Err(LibraryError::NotCollaborator(collaborator));
        }
        Ok(())
    }

    fn require_owner(&self, caller: Identity, action: &'static str) -> Result<(), LibraryError> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(LibraryError::unauthorized(caller, action))
        }
    }

    fn require_writer(&self, caller: Identity, action: &'static str) -> Result<(), LibraryError> {
        if self.can_write(&caller) {
            Ok(())
        } else {
            Err(LibraryError::unauthorized(caller, action))
        }
    }

    fn check_len(&self, data: &str) -> Result<(), LibraryError> {
        if data.len() > self.config.max_entry_len {
            return Err(LibraryError::EntryTooLarge {
                len: data.len(),
                max: self.config.max_entry_len,
            });
        }
        Ok(())
    }
}
