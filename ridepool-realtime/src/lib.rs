//! Process-scoped registry of live client sessions.
//!
//! Delivery is at-most-once and best-effort: a user with no live session
//! silently receives nothing (persisted state is the source of truth).
//! A multi-instance deployment would swap this for an external pub/sub
//! layer behind the same interface.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use ridepool_domain::events::LiveEvent;
use ridepool_domain::message::ConversationKey;

/// One live transport connection. A user may hold several (multi-device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Conversation room key: the canonical participant pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomId(ConversationKey);

impl RoomId {
    pub fn for_pair(a: Uuid, b: Uuid) -> Self {
        RoomId(ConversationKey::new(a, b))
    }
}

struct Session {
    user_id: Uuid,
    tx: mpsc::UnboundedSender<LiveEvent>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    by_user: HashMap<Uuid, HashSet<SessionId>>,
    rooms: HashMap<RoomId, HashSet<SessionId>>,
}

/// In-process connection registry. Initialized once at startup and shared
/// via `Arc`; entries are added on connect and removed on disconnect.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session for an authenticated user and returns its id plus
    /// the receiving end the transport should drain.
    pub fn register(&self, user_id: Uuid) -> (SessionId, mpsc::UnboundedReceiver<LiveEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = SessionId::new();

        let mut inner = self.inner.write().unwrap();
        inner.sessions.insert(session_id, Session { user_id, tx });
        inner.by_user.entry(user_id).or_default().insert(session_id);

        debug!(%user_id, session_id = %session_id, "session registered");
        (session_id, rx)
    }

    /// Removes the session from its user group and from every room it
    /// joined.
    pub fn unregister(&self, session_id: SessionId) {
        let mut inner = self.inner.write().unwrap();
        if let Some(session) = inner.sessions.remove(&session_id) {
            if let Some(set) = inner.by_user.get_mut(&session.user_id) {
                set.remove(&session_id);
                if set.is_empty() {
                    inner.by_user.remove(&session.user_id);
                }
            }
            debug!(user_id = %session.user_id, session_id = %session_id, "session unregistered");
        }
        inner.rooms.retain(|_, members| {
            members.remove(&session_id);
            !members.is_empty()
        });
    }

    /// Joins the conversation room with `other_user`. Rooms carry typing
    /// indicators only; message delivery always goes through the per-user
    /// group.
    pub fn join_room(&self, session_id: SessionId, other_user: Uuid) {
        let mut inner = self.inner.write().unwrap();
        let Some(session) = inner.sessions.get(&session_id) else {
            return;
        };
        let room = RoomId::for_pair(session.user_id, other_user);
        inner.rooms.entry(room).or_default().insert(session_id);
    }

    pub fn leave_room(&self, session_id: SessionId, other_user: Uuid) {
        let mut inner = self.inner.write().unwrap();
        let Some(session) = inner.sessions.get(&session_id) else {
            return;
        };
        let room = RoomId::for_pair(session.user_id, other_user);
        if let Some(members) = inner.rooms.get_mut(&room) {
            members.remove(&session_id);
            if members.is_empty() {
                inner.rooms.remove(&room);
            }
        }
    }

    /// Delivers an event to every live session of `user_id`. Returns how
    /// many sessions it reached; zero sessions means the event is dropped.
    pub fn emit_to_user(&self, user_id: Uuid, event: LiveEvent) -> usize {
        let inner = self.inner.read().unwrap();
        let Some(sessions) = inner.by_user.get(&user_id) else {
            return 0;
        };

        let mut delivered = 0;
        for session_id in sessions {
            if let Some(session) = inner.sessions.get(session_id) {
                if session.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        debug!(%user_id, event = event.name(), delivered, "event emitted to user");
        delivered
    }

    /// Broadcasts inside a conversation room, excluding the emitting
    /// session. No delivery guarantee; used for typing indicators.
    pub fn emit_to_room(&self, room: RoomId, event: LiveEvent, except: SessionId) -> usize {
        let inner = self.inner.read().unwrap();
        let Some(members) = inner.rooms.get(&room) else {
            return 0;
        };

        let mut delivered = 0;
        for session_id in members {
            if *session_id == except {
                continue;
            }
            if let Some(session) = inner.sessions.get(session_id) {
                if session.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Live session count for a user (diagnostics).
    pub fn session_count(&self, user_id: Uuid) -> usize {
        self.inner
            .read()
            .unwrap()
            .by_user
            .get(&user_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}
