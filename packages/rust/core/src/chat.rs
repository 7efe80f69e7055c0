//! Follow-up chat responder and its per-user conversation store.
//!
//! The store lives for the lifetime of the process and is not persisted.
//! Each user's history sits behind its own async lock, held across the whole
//! append → prompt → reply → append sequence, so concurrent requests for one
//! user are serialized while different users proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use healthnav_providers::LanguageModel;
use healthnav_shared::{ChatMessage, HealthNavError, Result, Role};

pub const CHAT_SYSTEM_PROMPT: &str = "You are a helpful health assistant. Use context to answer \
     follow-up questions. If medical, remind user to consult a professional.";

/// One stored message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ConversationEntry {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

type History = Arc<tokio::sync::Mutex<Vec<ConversationEntry>>>;

/// Process-local mapping from user id to message history.
#[derive(Default)]
pub struct ConversationStore {
    users: Mutex<HashMap<String, History>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> std::sync::MutexGuard<'_, HashMap<String, History>> {
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// History handle for `user_id`, created empty on first use.
    fn history(&self, user_id: &str) -> History {
        self.users()
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Copy of the stored history. Does not create an entry for new users.
    pub async fn snapshot(&self, user_id: &str) -> Vec<ConversationEntry> {
        let history = self.users().get(user_id).cloned();
        match history {
            Some(history) => history.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Number of users with a history.
    pub fn user_count(&self) -> usize {
        self.users().len()
    }
}

/// Build the follow-up prompt: the system instruction plus the user messages
/// among the most recent `window` stored entries, oldest first.
///
/// The window counts every entry, so assistant replies use up slots even
/// though they are not replayed.
pub fn build_prompt(entries: &[ConversationEntry], window: usize) -> Vec<ChatMessage> {
    let recent = &entries[entries.len().saturating_sub(window)..];

    std::iter::once(ChatMessage::system(CHAT_SYSTEM_PROMPT))
        .chain(
            recent
                .iter()
                .filter(|e| e.role == Role::User)
                .map(|e| ChatMessage::user(e.content.clone())),
        )
        .collect()
}

/// Answers follow-up questions with a short per-user memory.
#[derive(Clone)]
pub struct ChatResponder {
    llm: Arc<dyn LanguageModel>,
    store: Arc<ConversationStore>,
    history_window: usize,
}

impl ChatResponder {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<ConversationStore>,
        history_window: usize,
    ) -> Self {
        Self {
            llm,
            store,
            history_window,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Record `message` for `user_id`, ask the model, record and return its reply.
    ///
    /// An empty message is rejected without touching the store. If the model
    /// call fails the user message stays recorded and no reply is stored.
    #[instrument(skip(self, message), fields(message_chars = message.len()))]
    pub async fn respond(&self, user_id: &str, message: &str) -> Result<String> {
        if message.trim().is_empty() {
            return Err(HealthNavError::validation("Message required"));
        }

        let history = self.store.history(user_id);
        let mut entries = history.lock().await;
        entries.push(ConversationEntry::new(Role::User, message));

        let prompt = build_prompt(&entries, self.history_window);
        debug!(history = entries.len(), prompt_messages = prompt.len(), "sending follow-up");

        let reply = self.llm.complete(&prompt).await?;
        entries.push(ConversationEntry::new(Role::Assistant, reply.clone()));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthnav_providers::fake::FakeLanguageModel;

    fn responder(llm: Arc<FakeLanguageModel>) -> ChatResponder {
        ChatResponder::new(llm, Arc::new(ConversationStore::new()), 5)
    }

    #[test]
    fn prompt_excludes_assistant_messages() {
        let entries = vec![
            ConversationEntry::new(Role::User, "a"),
            ConversationEntry::new(Role::Assistant, "reply"),
            ConversationEntry::new(Role::User, "b"),
        ];
        let prompt = build_prompt(&entries, 5);
        let contents: Vec<&str> = prompt.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![CHAT_SYSTEM_PROMPT, "a", "b"]);
        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[1..].iter().all(|m| m.role == Role::User));
    }

    #[test]
    fn window_counts_assistant_entries() {
        let entries = vec![
            ConversationEntry::new(Role::User, "old"),
            ConversationEntry::new(Role::Assistant, "r1"),
            ConversationEntry::new(Role::User, "mid"),
            ConversationEntry::new(Role::Assistant, "r2"),
            ConversationEntry::new(Role::User, "new"),
        ];
        let prompt = build_prompt(&entries, 3);
        let contents: Vec<&str> = prompt.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![CHAT_SYSTEM_PROMPT, "mid", "new"]);
    }

    #[tokio::test]
    async fn replay_reads_only_the_last_five_entries() {
        let llm = Arc::new(FakeLanguageModel::new().with_default_text("ok"));
        let chat = responder(llm.clone());

        for i in 1..=6 {
            chat.respond("u1", &format!("message {i}")).await.unwrap();
        }

        let last = llm.text_calls().pop().unwrap();
        let replayed: Vec<&str> = last.messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(replayed, vec!["message 4", "message 5", "message 6"]);

        let history = chat.store().snapshot("u1").await;
        assert_eq!(history.len(), 12);
        assert_eq!(history[11].role, Role::Assistant);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let llm = Arc::new(FakeLanguageModel::new());
        let chat = responder(llm.clone());

        chat.respond("alice", "my knee hurts").await.unwrap();
        chat.respond("bob", "what about fever?").await.unwrap();

        let bob_prompt = &llm.text_calls()[1].messages;
        assert_eq!(bob_prompt.len(), 2);
        assert_eq!(bob_prompt[1].content, "what about fever?");
        assert_eq!(chat.store().user_count(), 2);
    }

    #[tokio::test]
    async fn model_failure_keeps_user_message_only() {
        let llm = Arc::new(FakeLanguageModel::new().push_text_error("HTTP 429"));
        let chat = responder(llm);

        assert!(chat.respond("u1", "hello").await.is_err());
        let history = chat.store().snapshot("u1").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn empty_message_does_not_touch_store() {
        let chat = responder(Arc::new(FakeLanguageModel::new()));
        assert!(chat.respond("u1", "   ").await.is_err());
        assert_eq!(chat.store().user_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_user_lose_nothing() {
        let llm = Arc::new(FakeLanguageModel::new().with_default_text("noted"));
        let chat = responder(llm);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let chat = chat.clone();
                tokio::spawn(async move { chat.respond("shared", &format!("m{i}")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let history = chat.store().snapshot("shared").await;
        assert_eq!(history.len(), 16);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }
}
