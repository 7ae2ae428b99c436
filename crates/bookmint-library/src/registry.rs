//! Library factory and registry
//!
//! [`LibraryFactory`] is the seam the issuance engine calls to open a library
//! for a new token. [`LibraryRegistry`] is the in-process implementation: an
//! append-only, enumerable set of libraries guarded by an authorized-creator
//! list so that only the engine (and the administrator) can create them.

use crate::error::LibraryError;
use crate::library::{Entry, Library, LibraryConfig};
use bookmint_primitives::{Event, EventLog, Identity, LibraryHandle};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Creates libraries and enumerates the ones created so far
pub trait LibraryFactory: Send + Sync {
    /// Create a library owned by `owner`.
    ///
    /// # Errors
    /// `Unauthorized` when `caller` may not create libraries,
    /// `CreationFailed` when allocation fails
    fn create_library(
        &self,
        caller: Identity,
        owner: Identity,
        config: &LibraryConfig,
    ) -> Result<LibraryHandle, LibraryError>;

    /// Number of libraries created
    fn count(&self) -> usize;

    /// Handle at creation index `index`
    ///
    /// # Errors
    /// `IndexOutOfRange` when `index >= count()`
    fn by_index(&self, index: usize) -> Result<LibraryHandle, LibraryError>;

    /// All handles in creation order
    fn all(&self) -> Vec<LibraryHandle>;
}

/// In-process library registry
#[derive(Debug)]
pub struct LibraryRegistry {
    admin: Identity,
    creators: RwLock<HashSet<Identity>>,
    libraries: RwLock<IndexMap<LibraryHandle, Library>>,
    limit: Option<usize>,
    events: Arc<EventLog>,
}

impl LibraryRegistry {
    /// Empty registry; `admin` may always create libraries and manage creators.
    #[must_use]
    pub fn new(admin: Identity, events: Arc<EventLog>) -> Self {
        Self {
            admin,
            creators: RwLock::new(HashSet::new()),
            libraries: RwLock::new(IndexMap::new()),
            limit: None,
            events,
        }
    }

    /// Cap the total number of libraries
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[inline]
    #[must_use]
    pub fn admin(&self) -> Identity {
        self.admin
    }

    /// Allow `creator` to create libraries
    ///
    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator
    pub fn authorize_creator(&self, caller: Identity, creator: Identity) -> Result<(), LibraryError> {
        self.require_admin(caller, "authorize creators")?;
        if self.creators.write().insert(creator) {
            self.events.append(Event::CreatorAuthorized { creator });
            tracing::info!(%creator, "library creator authorized");
        }
        Ok(())
    }

    /// Withdraw `creator`'s permission
    ///
    /// # Errors
    /// `Unauthorized` unless `caller` is the administrator
    pub fn revoke_creator(&self, caller: Identity, creator: Identity) -> Result<(), LibraryError> {
        self.require_admin(caller, "revoke creators")?;
        if self.creators.write().remove(&creator) {
            self.events.append(Event::CreatorRevoked { creator });
            tracing::info!(%creator, "library creator revoked");
        }
        Ok(())
    }

    #[must_use]
    pub fn is_creator(&self, who: &Identity) -> bool {
        *who == self.admin || self.creators.read().contains(who)
    }

    /// Snapshot of a library
    ///
    /// # Errors
    /// `UnknownLibrary` if no such handle
    pub fn library(&self, handle: LibraryHandle) -> Result<Library, LibraryError> {
        self.libraries
            .read()
            .get(&handle)
            .cloned()
            .ok_or(LibraryError::UnknownLibrary(handle))
    }

    /// Handles in `[start, end)`, clamped to the registry size
    #[must_use]
    pub fn range(&self, start: usize, end: usize) -> Vec<LibraryHandle> {
        let libraries = self.libraries.read();
        let end = end.min(libraries.len());
        let start = start.min(end);
        (start..end)
            .filter_map(|i| libraries.get_index(i).map(|(h, _)| *h))
            .collect()
    }

    /// Append an entry; returns its index
    ///
    /// # Errors
    /// Unknown library, caller not owner/collaborator, capacity or size limits
    pub fn add_entry(
        &self,
        handle: LibraryHandle,
        caller: Identity,
        data: impl Into<String>,
    ) -> Result<usize, LibraryError> {
        let index = self.with_library_mut(handle, |lib| lib.add_entry(caller, data.into()))?;
        self.events.append(Event::EntryAdded {
            library: handle,
            index: index as u64,
            author: caller,
        });
        Ok(index)
    }

    /// Replace an entry's text, crediting `caller` as a contributor
    ///
    /// # Errors
    /// Unknown library or entry, caller not owner/collaborator, size limit
    pub fn revise_entry(
        &self,
        handle: LibraryHandle,
        caller: Identity,
        index: usize,
        data: impl Into<String>,
    ) -> Result<(), LibraryError> {
        self.with_library_mut(handle, |lib| lib.revise_entry(caller, index, data.into()))
    }

    /// # Errors
    /// Unknown library or entry
    pub fn entry(&self, handle: LibraryHandle, index: usize) -> Result<Entry, LibraryError> {
        self.with_library(handle, |lib| lib.entry(index).cloned())
    }

    /// # Errors
    /// Unknown library or entry
    pub fn contributors(
        &self,
        handle: LibraryHandle,
        index: usize,
    ) -> Result<Vec<Identity>, LibraryError> {
        self.with_library(handle, |lib| lib.contributors(index).map(<[Identity]>::to_vec))
    }

    /// # Errors
    /// Unknown library, caller not owner, already a collaborator
    pub fn add_collaborator(
        &self,
        handle: LibraryHandle,
        caller: Identity,
        collaborator: Identity,
    ) -> Result<(), LibraryError> {
        self.with_library_mut(handle, |lib| lib.add_collaborator(caller, collaborator))?;
        self.events.append(Event::CollaboratorAdded {
            library: handle,
            collaborator,
        });
        Ok(())
    }

    /// # Errors
    /// Unknown library, caller not owner, not a collaborator
    pub fn remove_collaborator(
        &self,
        handle: LibraryHandle,
        caller: Identity,
        collaborator: Identity,
    ) -> Result<(), LibraryError> {
        self.with_library_mut(handle, |lib| lib.remove_collaborator(caller, collaborator))?;
        self.events.append(Event::CollaboratorRemoved {
            library: handle,
            collaborator,
        });
        Ok(())
    }

    fn with_library<R>(
        &self,
        handle: LibraryHandle,
        f: impl FnOnce(&Library) -> Result<R, LibraryError>,
    ) -> Result<R, LibraryError> {
        let libraries = self.libraries.read();
        let lib = libraries
            .get(&handle)
            .ok_or(LibraryError::UnknownLibrary(handle))?;
        f(lib)
    }

    fn with_library_mut<R>(
        &self,
        handle: LibraryHandle,
        f: impl FnOnce(&mut Library) -> Result<R, LibraryError>,
    ) -> Result<R, LibraryError> {
        let mut libraries = self.libraries.write();
        let lib = libraries
            .get_mut(&handle)
            .ok_or(LibraryError::UnknownLibrary(handle))?;
        f(lib)
    }

    fn require_admin(&self, caller: Identity, action: &'static str) -> Result<(), LibraryError> {
        if caller == self.admin {
            Ok(())
        } else {
            Err(LibraryError::unauthorized(caller, action))
        }
    }
}

/// Library address: BLAKE3 over a domain tag, the creation index and the owner.
fn derive_handle(index: usize, owner: &Identity) -> LibraryHandle {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"bookmint/library/v1");
    hasher.update(&(index as u64).to_le_bytes());
    hasher.update(owner.as_bytes());
    LibraryHandle::from_digest(*hasher.finalize().as_bytes())
}

impl LibraryFactory for LibraryRegistry {
    fn create_library(
        &self,
        caller: Identity,
        owner: Identity,
        config: &LibraryConfig,
    ) -> Result<LibraryHandle, LibraryError> {
        if !self.is_creator(&caller) {
            return Err(LibraryError::unauthorized(caller, "create libraries"));
        }
        if config.capacity == 0 {
            return Err(LibraryError::CreationFailed(
                "capacity must be at least one entry".to_string(),
            ));
        }

        let mut libraries = self.libraries.write();
        let index = libraries.len();
        if self.limit.is_some_and(|limit| index >= limit) {
            return Err(LibraryError::CreationFailed(format!(
                "registry limit of {index} libraries reached"
            )));
        }
        let handle = derive_handle(index, &owner);
        if libraries.contains_key(&handle) {
            return Err(LibraryError::CreationFailed(format!(
                "handle collision at index {index}"
            )));
        }
        libraries.insert(handle, Library::new(handle, owner, *config));
        drop(libraries);

        self.events.append(Event::LibraryCreated {
            index: index as u64,
            library: handle,
            owner,
        });
        tracing::debug!(index, library = %handle.short(), %owner, "library created");
        Ok(handle)
    }

    fn count(&self) -> usize {
        self.libraries.read().len()
    }

    fn by_index(&self, index: usize) -> Result<LibraryHandle, LibraryError> {
        let libraries = self.libraries.read();
        libraries
            .get_index(index)
            .map(|(handle, _)| *handle)
            .ok_or(LibraryError::IndexOutOfRange {
                index,
                count: libraries.len(),
            })
    }

    fn all(&self) -> Vec<LibraryHandle> {
        self.libraries.read().keys().copied().collect()
    }
}
