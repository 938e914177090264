use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use huddle_types::models::{ConnectionId, Identity, IdentityId};

/// One live transport session.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    pub joined_at: DateTime<Utc>,
}

struct Presence {
    /// Identity as presented by the most recent connection.
    identity: Identity,
    connections: BTreeSet<ConnectionId>,
}

/// Tracks live connections and who is online.
///
/// An identity may hold several connections at once (multi-device); it stays
/// present until the last of them is unregistered.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    presence: HashMap<IdentityId, Presence>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection for an already-authenticated identity.
    pub fn register(&mut self, identity: Identity) -> ConnectionId {
        let id = Uuid::new_v4();

        let entry = self
            .presence
            .entry(identity.id.clone())
            .or_insert_with(|| Presence {
                identity: identity.clone(),
                connections: BTreeSet::new(),
            });
        entry.identity = identity.clone();
        entry.connections.insert(id);

        self.connections.insert(
            id,
            Connection {
                id,
                identity,
                joined_at: Utc::now(),
            },
        );
        id
    }

    /// Drop a connection. Unknown ids return `None` and change nothing.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;

        if let Some(entry) = self.presence.get_mut(&connection.identity.id) {
            entry.connections.remove(&id);
            if entry.connections.is_empty() {
                self.presence.remove(&connection.identity.id);
            }
        }

        Some(connection)
    }

    /// Distinct online identities, ordered by display name then id.
    pub fn presence(&self) -> Vec<Identity> {
        let mut online: Vec<Identity> = self
            .presence
            .values()
            .map(|p| p.identity.clone())
            .collect();
        online.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        online
    }

    pub fn is_online(&self, identity_id: &str) -> bool {
        self.presence.contains_key(identity_id)
    }

    pub fn connections_of(&self, identity_id: &str) -> Vec<ConnectionId> {
        self.presence
            .get(identity_id)
            .map(|p| p.connections.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
