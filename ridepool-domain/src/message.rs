use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The conversation counter-party from `user`'s point of view.
    pub fn other_party(&self, user: Uuid) -> Uuid {
        if self.sender_id == user {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
}

/// Canonical key for the unordered pair of conversation participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey(pub Uuid, pub Uuid);

impl ConversationKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            ConversationKey(a, b)
        } else {
            ConversationKey(b, a)
        }
    }

    pub fn contains(&self, user: Uuid) -> bool {
        self.0 == user || self.1 == user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_key_is_order_insensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(ConversationKey::new(a, b), ConversationKey::new(b, a));
        assert!(ConversationKey::new(a, b).contains(a));
        assert!(ConversationKey::new(a, b).contains(b));
        assert!(!ConversationKey::new(a, b).contains(Uuid::new_v4()));
    }
}
