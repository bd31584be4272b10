//! Conversation ledger: per-pair message ordering, read/unread accounting
//! and delete semantics, with fanout to the affected party's live
//! sessions.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use ridepool_domain::events::LiveEvent;
use ridepool_domain::message::{Message, NewMessage};
use ridepool_domain::repository::{MessageStore, UserStore};
use ridepool_domain::user::UserRef;
use ridepool_domain::{DomainError, DomainResult, MAX_MESSAGE_LEN};
use ridepool_realtime::SessionRegistry;

use crate::notify::{spawn_notify, NotificationIntent, Notifier};

/// One entry of the conversation list: the counter-party, the latest
/// message as preview, and how many messages addressed to the caller are
/// still unread.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub other_user_id: Uuid,
    pub other_user: Option<UserRef>,
    pub last_message: Message,
    pub unread_count: u32,
}

pub struct MessageService {
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserStore>,
    registry: Arc<SessionRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserStore>,
        registry: Arc<SessionRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            messages,
            users,
            registry,
            notifier,
        }
    }

    async fn message_or_not_found(&self, id: Uuid) -> DomainResult<Message> {
        self.messages
            .get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("message {id}")))
    }

    pub async fn send(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        body: String,
    ) -> DomainResult<Message> {
        if sender_id == recipient_id {
            return Err(DomainError::Validation(
                "you cannot message yourself".into(),
            ));
        }
        let len = body.chars().count();
        if len == 0 || len > MAX_MESSAGE_LEN {
            return Err(DomainError::Validation(format!(
                "message body must be between 1 and {MAX_MESSAGE_LEN} characters"
            )));
        }
        if self.users.get(recipient_id).await?.is_none() {
            return Err(DomainError::NotFound(format!("user {recipient_id}")));
        }

        let message = self
            .messages
            .insert(NewMessage {
                sender_id,
                recipient_id,
                body,
            })
            .await?;

        info!(
            message_id = %message.id,
            sender_id = %sender_id,
            recipient_id = %recipient_id,
            "message sent"
        );

        // Recipient's sessions only; the sender already has the message.
        self.registry.emit_to_user(
            recipient_id,
            LiveEvent::NewMessage {
                message: (&message).into(),
            },
        );
        spawn_notify(
            self.notifier.clone(),
            NotificationIntent::NewMessage {
                recipient_id,
                sender_id,
                preview: message.body.clone(),
            },
        );

        Ok(message)
    }

    /// Conversation list, ordered by most-recent message descending.
    pub async fn conversations(&self, user_id: Uuid) -> DomainResult<Vec<ConversationSummary>> {
        let messages = self.messages.for_user(user_id).await?;

        // Messages arrive newest first, so the first message seen for a
        // counter-party is the preview and insertion order is the final
        // ordering.
        let mut summaries: Vec<ConversationSummary> = Vec::new();
        let mut index: HashMap<Uuid, usize> = HashMap::new();

        for message in messages {
            let other = message.other_party(user_id);
            let unread = (message.recipient_id == user_id && !message.read) as u32;
            match index.get(&other) {
                Some(&i) => summaries[i].unread_count += unread,
                None => {
                    index.insert(other, summaries.len());
                    summaries.push(ConversationSummary {
                        other_user_id: other,
                        other_user: self.users.get(other).await?,
                        last_message: message,
                        unread_count: unread,
                    });
                }
            }
        }

        Ok(summaries)
    }

    /// Full history with `other_id`, oldest first. Opening marks every
    /// unread message from the counter-party as read and tells their live
    /// sessions which ones.
    pub async fn open(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> DomainResult<(UserRef, Vec<Message>)> {
        let other = self
            .users
            .get(other_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user {other_id}")))?;

        let mut history = self.messages.between(user_id, other_id).await?;

        let affected = self
            .messages
            .mark_conversation_read(other_id, user_id)
            .await?;
        if !affected.is_empty() {
            for message in history.iter_mut() {
                if affected.contains(&message.id) {
                    message.read = true;
                }
            }
            self.registry.emit_to_user(
                other_id,
                LiveEvent::MessagesRead {
                    read_by: user_id,
                    message_ids: affected,
                },
            );
        }

        Ok((other, history))
    }

    /// Marks one message as read; recipient only. Idempotent: a repeat
    /// call changes nothing and emits nothing.
    pub async fn mark_read(&self, user_id: Uuid, message_id: Uuid) -> DomainResult<()> {
        let message = self.message_or_not_found(message_id).await?;
        if message.recipient_id != user_id {
            return Err(DomainError::Forbidden(
                "only the recipient can mark a message as read".into(),
            ));
        }

        let changed = self.messages.mark_read(message_id).await?;
        if changed {
            self.registry.emit_to_user(
                message.sender_id,
                LiveEvent::MessageRead {
                    message_id,
                    read_by: user_id,
                },
            );
        }
        Ok(())
    }

    /// Hard delete; sender only. The recipient's live sessions are told.
    pub async fn delete(&self, user_id: Uuid, message_id: Uuid) -> DomainResult<()> {
        let message = self.message_or_not_found(message_id).await?;
        if message.sender_id != user_id {
            return Err(DomainError::Forbidden(
                "only the sender can delete a message".into(),
            ));
        }

        self.messages.delete(message_id).await?;
        info!(message_id = %message_id, deleted_by = %user_id, "message deleted");

        self.registry.emit_to_user(
            message.recipient_id,
            LiveEvent::MessageDeleted {
                message_id,
                deleted_by: user_id,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gateway, RecordingNotifier};

    struct Fixture {
        service: MessageService,
        registry: Arc<SessionRegistry>,
        alice: Uuid,
        bob: Uuid,
    }

    fn fixture() -> Fixture {
        let gw = gateway();
        let alice = gw.add_simple_user(Uuid::new_v4(), "Alice").id;
        let bob = gw.add_simple_user(Uuid::new_v4(), "Bob").id;
        let registry = Arc::new(SessionRegistry::new());
        let (notifier, _rx) = RecordingNotifier::new();
        let service = MessageService::new(
            Arc::new(gw.clone()),
            Arc::new(gw),
            registry.clone(),
            notifier,
        );
        Fixture {
            service,
            registry,
            alice,
            bob,
        }
    }

    #[tokio::test]
    async fn test_send_validates() {
        let f = fixture();
        assert!(matches!(
            f.service
                .send(f.alice, f.alice, "hi me".into())
                .await
                .unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(matches!(
            f.service.send(f.alice, f.bob, String::new()).await.unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(matches!(
            f.service
                .send(f.alice, f.bob, "x".repeat(1001))
                .await
                .unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(matches!(
            f.service
                .send(f.alice, Uuid::new_v4(), "hello?".into())
                .await
                .unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_send_reaches_recipient_sessions_only() {
        let f = fixture();
        let (_a, mut alice_rx) = f.registry.register(f.alice);
        let (_b1, mut bob_rx1) = f.registry.register(f.bob);
        let (_b2, mut bob_rx2) = f.registry.register(f.bob);

        f.service.send(f.alice, f.bob, "salut".into()).await.unwrap();

        assert!(matches!(bob_rx1.try_recv().unwrap(), LiveEvent::NewMessage { .. }));
        assert!(matches!(bob_rx2.try_recv().unwrap(), LiveEvent::NewMessage { .. }));
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_conversation_list_ordering_and_unread() {
        let f = fixture();
        let gw = gateway();
        // Dedicated gateway with a third user for a second conversation.
        let alice = gw.add_simple_user(Uuid::new_v4(), "Alice").id;
        let bob = gw.add_simple_user(Uuid::new_v4(), "Bob").id;
        let carol = gw.add_simple_user(Uuid::new_v4(), "Carol").id;
        let (notifier, _rx) = RecordingNotifier::new();
        let service = MessageService::new(
            Arc::new(gw.clone()),
            Arc::new(gw),
            f.registry.clone(),
            notifier,
        );

        service.send(bob, alice, "first".into()).await.unwrap();
        service.send(bob, alice, "second".into()).await.unwrap();
        service.send(carol, alice, "newest".into()).await.unwrap();

        let conversations = service.conversations(alice).await.unwrap();
        assert_eq!(conversations.len(), 2);
        // Carol's conversation has the most recent message.
        assert_eq!(conversations[0].other_user_id, carol);
        assert_eq!(conversations[0].unread_count, 1);
        assert_eq!(conversations[1].other_user_id, bob);
        assert_eq!(conversations[1].unread_count, 2);
        assert_eq!(conversations[1].last_message.body, "second");
        assert_eq!(
            conversations[0].other_user.as_ref().unwrap().first_name,
            "Carol"
        );
    }

    #[tokio::test]
    async fn test_open_marks_read_and_notifies_sender() {
        // Recipient offline at send time, connects later and opens the
        // conversation.
        let f = fixture();
        let sent = f.service.send(f.alice, f.bob, "salut".into()).await.unwrap();
        assert!(!sent.read);

        let (_a, mut alice_rx) = f.registry.register(f.alice);

        let (_user, history) = f.service.open(f.bob, f.alice).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].read);

        match alice_rx.try_recv().unwrap() {
            LiveEvent::MessagesRead { read_by, message_ids } => {
                assert_eq!(read_by, f.bob);
                assert_eq!(message_ids, vec![sent.id]);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Re-opening finds nothing unread and stays silent.
        f.service.open(f.bob, f.alice).await.unwrap();
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let f = fixture();
        let sent = f.service.send(f.alice, f.bob, "salut".into()).await.unwrap();
        let (_a, mut alice_rx) = f.registry.register(f.alice);

        assert!(matches!(
            f.service.mark_read(f.alice, sent.id).await.unwrap_err(),
            DomainError::Forbidden(_)
        ));

        f.service.mark_read(f.bob, sent.id).await.unwrap();
        assert!(matches!(
            alice_rx.try_recv().unwrap(),
            LiveEvent::MessageRead { .. }
        ));

        // Second read is a no-op and re-emits nothing.
        f.service.mark_read(f.bob, sent.id).await.unwrap();
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_is_sender_only_and_notifies_recipient() {
        let f = fixture();
        let sent = f.service.send(f.alice, f.bob, "oups".into()).await.unwrap();
        let (_b, mut bob_rx) = f.registry.register(f.bob);
        // Drain the delivery of the message itself.
        let _ = bob_rx.try_recv();

        assert!(matches!(
            f.service.delete(f.bob, sent.id).await.unwrap_err(),
            DomainError::Forbidden(_)
        ));

        f.service.delete(f.alice, sent.id).await.unwrap();
        assert!(matches!(
            bob_rx.try_recv().unwrap(),
            LiveEvent::MessageDeleted { .. }
        ));

        assert!(matches!(
            f.service.delete(f.alice, sent.id).await.unwrap_err(),
            DomainError::NotFound(_)
        ));

        let history = f.service.open(f.bob, f.alice).await.unwrap().1;
        assert!(history.is_empty());
    }
}
