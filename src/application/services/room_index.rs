//! Registry state: the connection map and the room index.
//!
//! Owned exclusively by the hub's control loop. Every mutation keeps the
//! two maps in lockstep:
//! `id ∈ room_index[room]  ⇔  connections[id].room_id == room`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::domain::{ConnectionHandle, ConnectionId, EnqueueOutcome, Identity, OutboundFrame};

/// Result of fanning one frame out to a room.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    /// Connections evicted because their queue was full or closed
    pub evicted: Vec<ConnectionId>,
}

/// Point-in-time copy of the registry, for inspection and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub connections: BTreeMap<ConnectionId, String>,
    pub rooms: BTreeMap<String, BTreeSet<ConnectionId>>,
}

impl RegistrySnapshot {
    /// Whether the room index and the connection map agree.
    pub fn is_consistent(&self) -> bool {
        let indexed = self
            .rooms
            .iter()
            .flat_map(|(room, ids)| ids.iter().map(move |id| (id, room)))
            .all(|(id, room)| self.connections.get(id) == Some(room));

        let mapped = self.connections.iter().all(|(id, room)| {
            self.rooms
                .get(room)
                .map(|ids| ids.contains(id))
                .unwrap_or(false)
        });

        let no_empty_rooms = self.rooms.values().all(|ids| !ids.is_empty());

        indexed && mapped && no_empty_rooms
    }

    pub fn members(&self, room_id: &str) -> BTreeSet<ConnectionId> {
        self.rooms.get(room_id).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    room_index: HashMap<String, HashSet<ConnectionId>>,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection. Returns the handle back if its id is taken.
    pub fn insert(&mut self, handle: ConnectionHandle) -> Result<(), ConnectionHandle> {
        if self.connections.contains_key(&handle.id) {
            return Err(handle);
        }
        self.room_index
            .entry(handle.room_id.clone())
            .or_default()
            .insert(handle.id.clone());
        self.connections.insert(handle.id.clone(), handle);
        Ok(())
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionHandle> {
        let handle = self.connections.remove(id)?;
        if let Some(members) = self.room_index.get_mut(&handle.room_id) {
            members.remove(id);
            if members.is_empty() {
                self.room_index.remove(&handle.room_id);
            }
        }
        Some(handle)
    }

    /// Try-enqueue `frame` on every member of `room_id`. Members whose queue
    /// is full or closed are removed and their handles closed.
    pub fn fan_out(&mut self, room_id: &str, frame: &OutboundFrame) -> FanOut {
        let mut outcome = FanOut::default();

        let Some(members) = self.room_index.get(room_id) else {
            return outcome;
        };

        for id in members {
            let Some(handle) = self.connections.get(id) else {
                continue;
            };
            match handle.try_enqueue(frame.clone()) {
                EnqueueOutcome::Queued => outcome.delivered += 1,
                EnqueueOutcome::Full | EnqueueOutcome::Closed => outcome.evicted.push(id.clone()),
            }
        }

        for id in &outcome.evicted {
            if let Some(handle) = self.remove(id) {
                handle.close();
            }
        }

        outcome
    }

    /// Distinct users with a live connection in `room_id`.
    pub fn room_users(&self, room_id: &str) -> Vec<Identity> {
        let mut users: Vec<Identity> = self
            .room_index
            .get(room_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.connections.get(id))
            .map(|handle| handle.identity.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username).then(a.user_id.cmp(&b.user_id)));
        users
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.room_index.len()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            connections: self
                .connections
                .iter()
                .map(|(id, handle)| (id.clone(), handle.room_id.clone()))
                .collect(),
            rooms: self
                .room_index
                .iter()
                .map(|(room, ids)| (room.clone(), ids.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Close every queue and forget every connection.
    pub fn drain(&mut self) -> usize {
        self.room_index.clear();
        let count = self.connections.len();
        for (_, handle) in self.connections.drain() {
            handle.close();
        }
        count
    }
}
