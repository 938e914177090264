use std::collections::HashMap;

use huddle_types::models::{Message, MessageId, Reactions, Reply, Thread};
use huddle_types::store::{Change, MessageRepository, StoreError, StoreResult};

/// In-memory channel message log, in append order.
#[derive(Default)]
pub struct MessageStore {
    log: Vec<Message>,
    /// message id -> position in `log`
    positions: HashMap<MessageId, usize>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    fn get_mut(&mut self, id: MessageId) -> StoreResult<&mut Message> {
        let pos = *self
            .positions
            .get(&id)
            .ok_or_else(|| StoreError::message_not_found(id))?;
        Ok(&mut self.log[pos])
    }
}

impl MessageRepository for MessageStore {
    fn append(&mut self, message: Message) -> StoreResult<()> {
        if self.positions.contains_key(&message.id) {
            return Err(StoreError::Backend(format!(
                "duplicate message id {}",
                message.id
            )));
        }
        self.positions.insert(message.id, self.log.len());
        self.log.push(message);
        Ok(())
    }

    fn get(&self, id: MessageId) -> StoreResult<Option<Message>> {
        Ok(self.positions.get(&id).map(|&pos| self.log[pos].clone()))
    }

    fn recent(&self, limit: usize) -> StoreResult<Vec<Message>> {
        let start = self.log.len().saturating_sub(limit);
        Ok(self.log[start..].to_vec())
    }

    fn add_reaction(
        &mut self,
        id: MessageId,
        emoji: &str,
        identity_id: &str,
    ) -> StoreResult<Change<Reactions>> {
        let message = self.get_mut(id)?;
        if message.reactions.add(emoji, identity_id) {
            Ok(Change::Changed(message.reactions.clone()))
        } else {
            Ok(Change::Unchanged)
        }
    }

    fn remove_reaction(
        &mut self,
        id: MessageId,
        emoji: &str,
        identity_id: &str,
    ) -> StoreResult<Change<Reactions>> {
        let message = self.get_mut(id)?;
        if message.reactions.remove(emoji, identity_id) {
            Ok(Change::Changed(message.reactions.clone()))
        } else {
            Ok(Change::Unchanged)
        }
    }

    fn append_reply(&mut self, id: MessageId, reply: Reply) -> StoreResult<Thread> {
        let message = self.get_mut(id)?;
        Ok(message.push_reply(reply).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::models::{DEFAULT_CHANNEL, Identity};
    use uuid::Uuid;

    fn seeded(n: usize) -> (MessageStore, Vec<MessageId>) {
        let mut store = MessageStore::new();
        let author = Identity::guest("ann");
        let ids = (0..n)
            .map(|i| {
                let message = Message::new(DEFAULT_CHANNEL, author.clone(), format!("m{i}"), None);
                let id = message.id;
                store.append(message).unwrap();
                id
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let (store, ids) = seeded(130);
        let recent = store.recent(100).unwrap();
        assert_eq!(recent.len(), 100);
        let recent_ids: Vec<_> = recent.iter().map(|m| m.id).collect();
        assert_eq!(recent_ids, ids[30..].to_vec());

        let (small, small_ids) = seeded(3);
        let all: Vec<_> = small.recent(100).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(all, small_ids);
    }

    #[test]
    fn reaction_round_trip_restores_map() {
        let (mut store, ids) = seeded(1);
        store.add_reaction(ids[0], "👍", "bob").unwrap();
        let before = store.get(ids[0]).unwrap().unwrap().reactions;

        assert!(matches!(
            store.add_reaction(ids[0], "🎉", "carol").unwrap(),
            Change::Changed(_)
        ));
        assert!(matches!(
            store.remove_reaction(ids[0], "🎉", "carol").unwrap(),
            Change::Changed(_)
        ));

        let after = store.get(ids[0]).unwrap().unwrap().reactions;
        assert_eq!(before, after);
        assert!(after.reactors("🎉").is_none());
    }

    #[test]
    fn add_reaction_is_idempotent() {
        let (mut store, ids) = seeded(1);
        let first = store.add_reaction(ids[0], "👍", "bob").unwrap();
        let once = store.get(ids[0]).unwrap().unwrap();
        let second = store.add_reaction(ids[0], "👍", "bob").unwrap();

        assert!(matches!(first, Change::Changed(_)));
        assert_eq!(second, Change::Unchanged);
        assert_eq!(store.get(ids[0]).unwrap().unwrap(), once);
    }

    #[test]
    fn unknown_message_is_not_found() {
        let (mut store, _) = seeded(1);
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.add_reaction(missing, "👍", "bob"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.append_reply(missing, Reply::new("hi", Identity::guest("x"))),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn replies_create_thread_lazily() {
        let (mut store, ids) = seeded(1);
        assert!(store.get(ids[0]).unwrap().unwrap().thread.is_none());

        let author = Identity::guest("bob");
        store.append_reply(ids[0], Reply::new("first", author.clone())).unwrap();
        let thread = store.append_reply(ids[0], Reply::new("second", author)).unwrap();

        assert_eq!(thread.reply_count(), 2);
        assert_eq!(thread.replies()[0].content, "first");
    }
}
