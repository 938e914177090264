use std::collections::HashMap;

use huddle_types::models::{ConversationKey, DirectMessage};
use huddle_types::store::{DirectMessageRepository, StoreResult};

/// In-memory direct-message conversations, one log per participant pair.
///
/// Delivery to live connections is the coordinator's job; this only keeps the
/// logs. Conversations appear on first send.
#[derive(Default)]
pub struct DirectMessageRouter {
    conversations: HashMap<ConversationKey, Vec<DirectMessage>>,
}

impl DirectMessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }
}

impl DirectMessageRepository for DirectMessageRouter {
    fn append(&mut self, key: &ConversationKey, entry: DirectMessage) -> StoreResult<()> {
        self.conversations
            .entry(key.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    fn history(&self, key: &ConversationKey) -> StoreResult<Vec<DirectMessage>> {
        Ok(self.conversations.get(key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn dm(from: &str, to: &str, content: &str) -> DirectMessage {
        DirectMessage {
            content: content.into(),
            from: from.into(),
            to: to.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn history_is_shared_by_both_participants() {
        let mut router = DirectMessageRouter::new();
        router
            .append(&ConversationKey::new("a", "b"), dm("a", "b", "hi"))
            .unwrap();
        router
            .append(&ConversationKey::new("b", "a"), dm("b", "a", "yo"))
            .unwrap();

        let ab = router.history(&ConversationKey::new("a", "b")).unwrap();
        let ba = router.history(&ConversationKey::new("b", "a")).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(
            ab.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["hi", "yo"]
        );
        assert_eq!(router.conversation_count(), 1);
    }

    #[test]
    fn unknown_pair_has_empty_history() {
        let router = DirectMessageRouter::new();
        assert!(router
            .history(&ConversationKey::new("x", "y"))
            .unwrap()
            .is_empty());
    }
}
