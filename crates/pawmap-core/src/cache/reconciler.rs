//! Client-side mirror of the authoritative incident set
//!
//! A client subscribes first, then fetches the full set, then applies every
//! event received during and after the fetch. Events that arrive before the
//! snapshot is in hand are buffered and replayed once it lands, deduplicated
//! by identifier, so nothing published after the subscription is missed.

use std::collections::HashSet;

use super::persistence::CachePersistence;
use crate::models::{
    IncidentId, IncidentRecord, LocalIncident, NewIncident, ProvisionalIncident, TempId,
};
use crate::sync::SyncEvent;

/// Lifecycle of a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    /// Subscribed and waiting for the full snapshot
    Bootstrapping,
    /// Applying events as they arrive
    Live,
    /// Connection lost; the mirror is retained until the next refresh
    Reconnecting,
}

/// What [`ClientCache::apply`] did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Held until the bootstrap snapshot arrives
    Buffered,
    /// A new record entered the mirror
    Added,
    /// The record was already present
    Duplicate,
    /// The mirror was emptied
    Cleared,
    /// Dropped because the session is reconnecting
    Ignored,
}

/// Local mirror with optimistic entries and durable persistence
pub struct ClientCache<P> {
    persistence: P,
    state: SessionState,
    /// Provisional entries first, then confirmed records newest first
    entries: Vec<LocalIncident>,
    buffered: Vec<SyncEvent>,
}

impl<P: CachePersistence> ClientCache<P> {
    pub fn new(persistence: P) -> Self {
        Self {
            persistence,
            state: SessionState::Uninitialized,
            entries: Vec::new(),
            buffered: Vec::new(),
        }
    }

    pub const fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Load the persisted mirror and begin bootstrapping.
    ///
    /// Only meaningful from `Uninitialized`; later calls are ignored.
    pub fn start(&mut self) {
        if self.state != SessionState::Uninitialized {
            tracing::debug!(state = ?self.state, "Client cache already started");
            return;
        }

        match self.persistence.load() {
            Ok(entries) => {
                tracing::debug!("Loaded {} cached incidents", entries.len());
                self.entries = entries;
                self.sort_entries();
            }
            Err(error) => {
                tracing::warn!("Failed to load local incident cache: {}", error);
            }
        }
        self.state = SessionState::Bootstrapping;
    }

    /// Feed one event from the subscription
    pub fn apply(&mut self, event: SyncEvent) -> ApplyOutcome {
        match self.state {
            SessionState::Uninitialized | SessionState::Bootstrapping => {
                self.buffered.push(event);
                ApplyOutcome::Buffered
            }
            SessionState::Reconnecting => {
                tracing::debug!(kind = event.kind(), "Ignoring event while reconnecting");
                ApplyOutcome::Ignored
            }
            SessionState::Live => {
                let outcome = self.apply_live(event);
                if outcome == ApplyOutcome::Added {
                    self.persist();
                }
                outcome
            }
        }
    }

    /// Install the authoritative snapshot and go live.
    ///
    /// `snapshot` is expected newest first, as returned by the server. A
    /// pending entry is superseded by a snapshot record with the same content
    /// unless that record was already in the mirror: records confirmed or
    /// received earlier belong to some other report.
    pub fn complete_bootstrap(&mut self, snapshot: Vec<IncidentRecord>) {
        if self.state == SessionState::Uninitialized {
            self.start();
        }

        let mut claimed: HashSet<IncidentId> = self.confirmed().map(|record| record.id).collect();
        let mut pending = Vec::new();

        for entry in std::mem::take(&mut self.entries) {
            let LocalIncident::Provisional(provisional) = entry else {
                continue;
            };
            let counterpart = snapshot.iter().find(|record| {
                !claimed.contains(&record.id) && provisional.incident.matches(record)
            });

            match counterpart {
                Some(record) => {
                    claimed.insert(record.id);
                }
                None => pending.push(LocalIncident::Provisional(provisional)),
            }
        }

        self.entries = pending;
        self.entries
            .extend(snapshot.into_iter().map(LocalIncident::Confirmed));
        self.sort_entries();

        self.state = SessionState::Live;
        let buffered = std::mem::take(&mut self.buffered);
        let replayed = buffered.len();
        for event in buffered {
            self.apply_live(event);
        }

        tracing::debug!(
            entries = self.entries.len(),
            replayed,
            "Client cache is live"
        );
        self.persist();
    }

    /// The connection dropped; keep the mirror and wait for a refresh
    pub fn disconnected(&mut self) {
        if matches!(self.state, SessionState::Live | SessionState::Bootstrapping) {
            self.state = SessionState::Reconnecting;
            self.buffered.clear();
        }
    }

    /// Begin a full refresh with a fresh event buffer
    pub fn resync(&mut self) {
        match self.state {
            SessionState::Uninitialized => self.start(),
            SessionState::Reconnecting | SessionState::Live => {
                self.state = SessionState::Bootstrapping;
                self.buffered.clear();
            }
            SessionState::Bootstrapping => self.buffered.clear(),
        }
    }

    /// Show a locally created incident before the server confirms it
    pub fn add_provisional(&mut self, incident: NewIncident) -> TempId {
        let provisional = ProvisionalIncident::new(incident);
        let temp_id = provisional.temp_id;
        self.entries.insert(0, LocalIncident::Provisional(provisional));
        self.persist();
        temp_id
    }

    /// The server accepted a provisional incident as `record`.
    ///
    /// The submission's temp id to final id mapping is applied here, so the
    /// provisional entry is swapped for the record it became. Returns `false`
    /// when no such provisional entry remains.
    pub fn confirm(&mut self, temp_id: TempId, record: IncidentRecord) -> bool {
        let Some(index) = self.provisional_index(temp_id) else {
            return false;
        };
        self.entries.remove(index);

        if !self.contains(&record.id) {
            self.insert_confirmed(record);
        }
        self.persist();
        true
    }

    /// Drop a provisional entry whose submission was rejected
    pub fn discard_provisional(&mut self, temp_id: TempId) -> bool {
        let Some(index) = self.provisional_index(temp_id) else {
            return false;
        };
        self.entries.remove(index);
        self.persist();
        true
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Every entry, pending first then confirmed newest first
    pub fn entries(&self) -> &[LocalIncident] {
        &self.entries
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &IncidentRecord> {
        self.entries.iter().filter_map(LocalIncident::as_confirmed)
    }

    pub fn pending(&self) -> impl Iterator<Item = &ProvisionalIncident> {
        self.entries.iter().filter_map(|entry| match entry {
            LocalIncident::Provisional(provisional) => Some(provisional),
            LocalIncident::Confirmed(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &IncidentId) -> bool {
        self.entries.iter().any(|entry| entry.id().as_ref() == Some(id))
    }

    fn apply_live(&mut self, event: SyncEvent) -> ApplyOutcome {
        match event {
            SyncEvent::IncidentAdded { record } => {
                if self.contains(&record.id) {
                    return ApplyOutcome::Duplicate;
                }
                self.supersede_provisional(&record);
                self.insert_confirmed(record);
                ApplyOutcome::Added
            }
            SyncEvent::AllCleared => {
                self.entries.clear();
                if let Err(error) = self.persistence.clear() {
                    tracing::warn!("Failed to clear local incident cache: {}", error);
                }
                ApplyOutcome::Cleared
            }
        }
    }

    /// Remove the first provisional entry that `record` confirms
    fn supersede_provisional(&mut self, record: &IncidentRecord) {
        let position = self.entries.iter().position(|entry| match entry {
            LocalIncident::Provisional(provisional) => provisional.incident.matches(record),
            LocalIncident::Confirmed(_) => false,
        });
        if let Some(index) = position {
            self.entries.remove(index);
        }
    }

    /// Insert at the newest end of the confirmed section
    fn insert_confirmed(&mut self, record: IncidentRecord) {
        let index = self.pending_count();
        self.entries.insert(index, LocalIncident::Confirmed(record));
    }

    fn provisional_index(&self, temp_id: TempId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.temp_id() == Some(temp_id))
    }

    fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .take_while(|entry| entry.is_provisional())
            .count()
    }

    /// Provisional first, each group newest first. Stable for equal keys.
    fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| {
            b.is_provisional()
                .cmp(&a.is_provisional())
                .then_with(|| created_at(b).cmp(&created_at(a)))
                .then_with(|| b.id().cmp(&a.id()))
        });
    }

    fn persist(&self) {
        if let Err(error) = self.persistence.save(&self.entries) {
            tracing::warn!("Failed to persist local incident cache: {}", error);
        }
    }
}

const fn created_at(entry: &LocalIncident) -> i64 {
    match entry {
        LocalIncident::Provisional(provisional) => provisional.created_at,
        LocalIncident::Confirmed(record) => record.created_at,
    }
}
