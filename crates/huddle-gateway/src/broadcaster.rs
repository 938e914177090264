use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use huddle_types::events::ServerEvent;
use huddle_types::models::ConnectionId;

use crate::registry::ConnectionRegistry;

/// Per-connection outbound queue. The connection's writer task drains it.
pub type Outbox = mpsc::UnboundedSender<Arc<ServerEvent>>;

/// Who a targeted event goes to.
#[derive(Debug, Clone, Copy)]
pub enum Recipient<'a> {
    Connection(ConnectionId),
    /// Every open connection of this identity.
    Identity(&'a str),
}

/// Delivers events to connection outboxes.
///
/// Pushing into an outbox never waits on the network, so the coordinator can
/// call these from its loop. A closed outbox is skipped; the connection's own
/// teardown detaches it.
#[derive(Default)]
pub struct Broadcaster {
    outboxes: HashMap<ConnectionId, Outbox>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, connection_id: ConnectionId, outbox: Outbox) {
        self.outboxes.insert(connection_id, outbox);
    }

    pub fn detach(&mut self, connection_id: ConnectionId) -> bool {
        self.outboxes.remove(&connection_id).is_some()
    }

    /// Deliver to every attached connection. Returns how many accepted it.
    pub fn broadcast_all(&self, event: ServerEvent) -> usize {
        let event = Arc::new(event);
        self.outboxes
            .keys()
            .filter(|id| self.deliver(**id, &event))
            .count()
    }

    /// Targeted delivery. Identities fan out to all of their connections.
    pub fn send_to(
        &self,
        registry: &ConnectionRegistry,
        recipient: Recipient<'_>,
        event: ServerEvent,
    ) -> usize {
        let event = Arc::new(event);
        match recipient {
            Recipient::Connection(id) => usize::from(self.deliver(id, &event)),
            Recipient::Identity(identity_id) => registry
                .connections_of(identity_id)
                .into_iter()
                .filter(|id| self.deliver(*id, &event))
                .count(),
        }
    }

    /// Deliver to an explicit set of connections.
    pub fn send_to_each(
        &self,
        connections: impl IntoIterator<Item = ConnectionId>,
        event: ServerEvent,
    ) -> usize {
        let event = Arc::new(event);
        connections
            .into_iter()
            .filter(|id| self.deliver(*id, &event))
            .count()
    }

    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }

    fn deliver(&self, connection_id: ConnectionId, event: &Arc<ServerEvent>) -> bool {
        match self.outboxes.get(&connection_id) {
            Some(tx) => tx.send(event.clone()).is_ok(),
            None => {
                trace!("No outbox for connection {}", connection_id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::events::ErrorKind;
    use huddle_types::models::Identity;

    fn ping() -> ServerEvent {
        ServerEvent::Error {
            kind: ErrorKind::Validation,
            message: "ping".into(),
        }
    }

    #[test]
    fn identity_delivery_reaches_every_device() {
        let mut registry = ConnectionRegistry::new();
        let mut broadcaster = Broadcaster::new();
        let alice = Identity::guest("alice");
        let bob = Identity::guest("bob");

        let mut inboxes = Vec::new();
        for identity in [&alice, &alice, &bob] {
            let id = registry.register(identity.clone());
            let (tx, rx) = mpsc::unbounded_channel();
            broadcaster.attach(id, tx);
            inboxes.push(rx);
        }

        let delivered = broadcaster.send_to(&registry, Recipient::Identity(&alice.id), ping());
        assert_eq!(delivered, 2);
        assert!(inboxes[0].try_recv().is_ok());
        assert!(inboxes[1].try_recv().is_ok());
        assert!(inboxes[2].try_recv().is_err());
    }

    #[test]
    fn closed_outboxes_are_skipped() {
        let registry = ConnectionRegistry::new();
        let mut broadcaster = Broadcaster::new();
        let open = uuid::Uuid::new_v4();
        let closed = uuid::Uuid::new_v4();

        let (tx_open, mut rx_open) = mpsc::unbounded_channel();
        let (tx_closed, rx_closed) = mpsc::unbounded_channel();
        drop(rx_closed);
        broadcaster.attach(open, tx_open);
        broadcaster.attach(closed, tx_closed);

        assert_eq!(broadcaster.broadcast_all(ping()), 1);
        assert!(rx_open.try_recv().is_ok());
        assert_eq!(
            broadcaster.send_to(&registry, Recipient::Connection(closed), ping()),
            0
        );
    }
}
