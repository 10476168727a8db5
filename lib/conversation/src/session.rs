//! Conversation session management.
//!
//! A session is the ordered history of one chat. Sessions live in memory
//! for the lifetime of the process; nothing is persisted.

use crate::message::Turn;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relaybot_core::ChatId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The chat this session belongs to.
    pub chat_id: ChatId,
    /// Turns in this session, oldest first.
    pub turns: Vec<Turn>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last active.
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session for a chat.
    #[must_use]
    pub fn new(chat_id: ChatId) -> Self {
        let now = Utc::now();
        Self {
            chat_id,
            turns: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Adds a turn to the session.
    pub fn add_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.last_active_at = Utc::now();
    }

    /// Returns the number of turns.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Returns the last turn, if any.
    #[must_use]
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns the most recent turns to send to the model.
    ///
    /// With `window = Some(n)` at most the last `n` turns are considered.
    /// The returned slice always starts at a user message written by a
    /// person, so it never opens with a tool result whose request was cut
    /// off. When the window holds no such message it widens back to the
    /// latest one. `None` returns the whole history.
    #[must_use]
    pub fn recent_turns(&self, window: Option<usize>) -> &[Turn] {
        let len = self.turns.len();
        let mut start = window.map_or(0, |w| len.saturating_sub(w));

        while start < len && !self.turns[start].is_user_message() {
            start += 1;
        }

        if start == len {
            start = self
                .turns
                .iter()
                .rposition(Turn::is_user_message)
                .unwrap_or(len);
        }

        &self.turns[start..]
    }
}

/// Trait for session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns a snapshot of the chat's session, creating an empty one if
    /// absent.
    async fn get_or_create(&self, chat_id: ChatId) -> Session;

    /// Appends a turn to the chat's session, creating it if absent.
    async fn append(&self, chat_id: ChatId, turn: Turn);

    /// Removes the chat's session entirely.
    ///
    /// Returns true if a session existed.
    async fn clear(&self, chat_id: ChatId) -> bool;

    /// Returns the number of live sessions.
    async fn session_count(&self) -> usize;
}

/// Process-wide in-memory session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<ChatId, Session>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, chat_id: ChatId) -> Session {
        if let Some(session) = self.sessions.read().await.get(&chat_id) {
            return session.clone();
        }

        self.sessions
            .write()
            .await
            .entry(chat_id)
            .or_insert_with(|| Session::new(chat_id))
            .clone()
    }

    async fn append(&self, chat_id: ChatId, turn: Turn) {
        self.sessions
            .write()
            .await
            .entry(chat_id)
            .or_insert_with(|| Session::new(chat_id))
            .add_turn(turn);
    }

    async fn clear(&self, chat_id: ChatId) -> bool {
        self.sessions.write().await.remove(&chat_id).is_some()
    }

    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybot_ai::ContentBlock;
    use serde_json::json;

    fn tool_exchange() -> [Turn; 2] {
        [
            Turn::assistant(vec![ContentBlock::tool_use("toolu_1", "search", json!({}))]),
            Turn::tool_results(vec![ContentBlock::tool_result("toolu_1", "[]", false)]),
        ]
    }

    #[test]
    fn session_creation() {
        let session = Session::new(ChatId::new(1));
        assert_eq!(session.chat_id, ChatId::new(1));
        assert_eq!(session.turn_count(), 0);
        assert!(session.last_turn().is_none());
    }

    #[test]
    fn recent_turns_without_window_returns_everything() {
        let mut session = Session::new(ChatId::new(1));
        for i in 0..15 {
            session.add_turn(Turn::user(format!("m{i}")));
        }
        assert_eq!(session.recent_turns(None).len(), 15);
        assert_eq!(session.recent_turns(Some(10)).len(), 10);
    }

    #[test]
    fn recent_turns_never_starts_with_tool_result() {
        let mut session = Session::new(ChatId::new(1));
        session.add_turn(Turn::user("find things"));
        let [request, result] = tool_exchange();
        session.add_turn(request);
        session.add_turn(result);
        session.add_turn(Turn::assistant(vec![ContentBlock::text("found")]));
        session.add_turn(Turn::user("thanks"));

        // A window of 3 would open on the tool result.
        let recent = session.recent_turns(Some(3));
        assert_eq!(recent.len(), 1);
        assert!(recent[0].is_user_message());
    }

    #[test]
    fn recent_turns_widens_to_latest_user_message() {
        let mut session = Session::new(ChatId::new(1));
        session.add_turn(Turn::user("find things"));
        let [request, result] = tool_exchange();
        session.add_turn(request);
        session.add_turn(result);

        let recent = session.recent_turns(Some(2));
        assert_eq!(recent.len(), 3);
        assert!(recent[0].is_user_message());
        assert!(recent[2].is_tool_result());
    }

    #[tokio::test]
    async fn store_creates_lazily() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.session_count().await, 0);

        let session = store.get_or_create(ChatId::new(5)).await;
        assert_eq!(session.turn_count(), 0);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn store_appends_in_order() {
        let store = InMemorySessionStore::new();
        let chat = ChatId::new(5);
        store.append(chat, Turn::user("one")).await;
        store.append(chat, Turn::user("two")).await;

        let session = store.get_or_create(chat).await;
        let texts: Vec<_> = session
            .turns
            .iter()
            .map(|t| t.to_model_message().content)
            .collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1], relaybot_ai::MessageContent::Text("two".to_string()));
    }

    #[tokio::test]
    async fn clear_removes_session_and_history() {
        let store = InMemorySessionStore::new();
        let chat = ChatId::new(9);
        store.append(chat, Turn::user("remember me")).await;

        assert!(store.clear(chat).await);
        assert!(!store.clear(chat).await);
        assert_eq!(store.session_count().await, 0);

        store.append(chat, Turn::user("fresh start")).await;
        assert_eq!(store.get_or_create(chat).await.turn_count(), 1);
    }

    #[tokio::test]
    async fn sessions_are_independent_per_chat() {
        let store = InMemorySessionStore::new();
        store.append(ChatId::new(1), Turn::user("a")).await;
        store.append(ChatId::new(2), Turn::user("b")).await;
        store.clear(ChatId::new(1)).await;

        assert_eq!(store.get_or_create(ChatId::new(2)).await.turn_count(), 1);
    }
}
