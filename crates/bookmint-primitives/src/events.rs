//! Audit trail
//!
//! [`EventLog`] is an append-only, hash-chained record of everything external
//! observers rely on: administrative changes, library activity and issuance.

use crate::hash::Hash32;
use crate::identity::Identity;
use crate::types::{Amount, LibraryHandle, Phase, TokenId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Observable notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    PricesChanged {
        presale: Amount,
        whitelist: Amount,
        public: Amount,
    },
    MerkleRootChanged {
        root: Hash32,
    },
    BaseUriChanged {
        uri: String,
    },
    Paused,
    Unpaused,
    Withdrawn {
        to: Identity,
        amount: Amount,
    },
    CreatorAuthorized {
        creator: Identity,
    },
    CreatorRevoked {
        creator: Identity,
    },
    LibraryCreated {
        index: u64,
        library: LibraryHandle,
        owner: Identity,
    },
    CollaboratorAdded {
        library: LibraryHandle,
        collaborator: Identity,
    },
    CollaboratorRemoved {
        library: LibraryHandle,
        collaborator: Identity,
    },
    EntryAdded {
        library: LibraryHandle,
        index: u64,
        author: Identity,
    },
    TokenIssued {
        token_id: TokenId,
        holder: Identity,
        library: LibraryHandle,
        paid: Amount,
    },
}

impl Event {
    /// Short name, matches the serialized `kind` tag
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Event::PhaseChanged { .. } => "phase_changed",
            Event::PricesChanged { .. } => "prices_changed",
            Event::MerkleRootChanged { .. } => "merkle_root_changed",
            Event::BaseUriChanged { .. } => "base_uri_changed",
            Event::Paused => "paused",
            Event::Unpaused => "unpaused",
            Event::Withdrawn { .. } => "withdrawn",
            Event::CreatorAuthorized { .. } => "creator_authorized",
            Event::CreatorRevoked { .. } => "creator_revoked",
            Event::LibraryCreated { .. } => "library_created",
            Event::CollaboratorAdded { .. } => "collaborator_added",
            Event::CollaboratorRemoved { .. } => "collaborator_removed",
            Event::EntryAdded { .. } => "entry_added",
            Event::TokenIssued { .. } => "token_issued",
        }
    }

    fn canonical_bytes(&self) -> Vec<u8> {
        // Plain enums of strings and integers always serialize.
        serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes())
    }
}

/// An event as stored in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
    pub prev_hash: Hash32,
    pub hash: Hash32,
}

/// Errors from the audit trail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("audit chain broken at seq {seq}")]
    IntegrityViolation { seq: u64 },
}

/// Append-only, hash-chained event log
#[derive(Debug, Default)]
pub struct EventLog {
    inner: Mutex<Vec<EventRecord>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its sequence number
    pub fn append(&self, event: Event) -> u64 {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map(|r| r.hash).unwrap_or_default();
        let mut record = EventRecord {
            seq: guard.len() as u64,
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
            prev_hash,
            hash: Hash32::default(),
        };
        record.hash = compute_hash(&record);
        tracing::trace!(seq = record.seq, kind = record.event.kind(), "event appended");
        let seq = record.seq;
        guard.push(record);
        seq
    }

    #[must_use]
    pub fn events(&self) -> Vec<EventRecord> {
        self.inner.lock().clone()
    }

    /// Records with `seq >= from`
    #[must_use]
    pub fn since(&self, from: u64) -> Vec<EventRecord> {
        let guard = self.inner.lock();
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(guard.len());
        guard[start..].to_vec()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Hash of the most recent record; zero when empty
    #[must_use]
    pub fn head(&self) -> Hash32 {
        self.inner.lock().last().map(|r| r.hash).unwrap_or_default()
    }

    /// Walk the chain and recompute every hash.
    ///
    /// # Errors
    /// Returns the first sequence number whose link or hash does not match
    pub fn verify_integrity(&self) -> Result<(), LogError> {
        let guard = self.inner.lock();
        let mut prev = Hash32::default();
        for (position, record) in guard.iter().enumerate() {
            if record.seq != position as u64
                || record.prev_hash != prev
                || record.hash != compute_hash(record)
            {
                return Err(LogError::IntegrityViolation { seq: record.seq });
            }
            prev = record.hash;
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, seq: usize, event: Event) {
        self.inner.lock()[seq].event = event;
    }
}

fn compute_hash(record: &EventRecord) -> Hash32 {
    let seq = record.seq.to_le_bytes();
    let micros = record.timestamp.timestamp_micros().to_le_bytes();
    let payload = record.event.canonical_bytes();
    Hash32::sha256_parts(&[
        seq.as_slice(),
        record.event_id.as_bytes().as_slice(),
        micros.as_slice(),
        payload.as_slice(),
        record.prev_hash.as_bytes().as_slice(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_links_records() {
        let log = EventLog::new();
        assert!(log.is_empty());
        log.append(Event::Paused);
        log.append(Event::Unpaused);

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].prev_hash.is_zero());
        assert_eq!(events[1].prev_hash, events[0].hash);
        assert_eq!(log.head(), events[1].hash);
        assert!(log.verify_integrity().is_ok());
    }

    #[test]
    fn since_returns_suffix() {
        let log = EventLog::new();
        for _ in 0..5 {
            log.append(Event::Paused);
        }
        assert_eq!(log.since(3).len(), 2);
        assert_eq!(log.since(3)[0].seq, 3);
        assert!(log.since(99).is_empty());
    }

    #[test]
    fn tampering_is_detected() {
        let log = EventLog::new();
        log.append(Event::Paused);
        log.append(Event::BaseUriChanged {
            uri: "ipfs://a/".into(),
        });
        log.append(Event::Unpaused);

        log.tamper(
            1,
            Event::BaseUriChanged {
                uri: "ipfs://evil/".into(),
            },
        );
        assert_eq!(
            log.verify_integrity(),
            Err(LogError::IntegrityViolation { seq: 1 })
        );
    }

    #[test]
    fn kind_matches_serde_tag() {
        let event = Event::PhaseChanged {
            from: Phase::Locked,
            to: Phase::Public,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], event.kind());
        assert_eq!(json["to"], "public");
    }
}
