use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Events pushed to live client sessions. Serialized with an explicit
/// `type` tag so the wire shape matches the event names clients subscribe
/// to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    NewBooking {
        booking_id: Uuid,
        trip_id: Uuid,
        passenger_id: Uuid,
        seats: i32,
        status: String,
    },
    BookingAccepted {
        booking_id: Uuid,
        trip_id: Uuid,
        driver_id: Uuid,
    },
    BookingRejected {
        booking_id: Uuid,
        trip_id: Uuid,
        driver_id: Uuid,
    },
    BookingCancelled {
        booking_id: Uuid,
        trip_id: Uuid,
        passenger_id: Uuid,
    },
    NewMessage {
        message: MessagePayload,
    },
    MessageRead {
        message_id: Uuid,
        read_by: Uuid,
    },
    MessagesRead {
        read_by: Uuid,
        message_ids: Vec<Uuid>,
    },
    MessageDeleted {
        message_id: Uuid,
        deleted_by: Uuid,
    },
    UserTyping {
        user_id: Uuid,
        is_typing: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessagePayload {
    fn from(m: &Message) -> Self {
        MessagePayload {
            id: m.id,
            sender_id: m.sender_id,
            recipient_id: m.recipient_id,
            body: m.body.clone(),
            created_at: m.created_at,
        }
    }
}

impl LiveEvent {
    /// Wire-level event name, i.e. the value of the `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::NewBooking { .. } => "new_booking",
            LiveEvent::BookingAccepted { .. } => "booking_accepted",
            LiveEvent::BookingRejected { .. } => "booking_rejected",
            LiveEvent::BookingCancelled { .. } => "booking_cancelled",
            LiveEvent::NewMessage { .. } => "new_message",
            LiveEvent::MessageRead { .. } => "message_read",
            LiveEvent::MessagesRead { .. } => "messages_read",
            LiveEvent::MessageDeleted { .. } => "message_deleted",
            LiveEvent::UserTyping { .. } => "user_typing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag_matches_name() {
        let event = LiveEvent::MessageRead {
            message_id: Uuid::new_v4(),
            read_by: Uuid::new_v4(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.name());
    }

    #[test]
    fn test_typing_payload_shape() {
        let user_id = Uuid::new_v4();
        let event = LiveEvent::UserTyping {
            user_id,
            is_typing: true,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "user_typing");
        assert_eq!(value["user_id"], user_id.to_string());
        assert_eq!(value["is_typing"], true);
    }
}
