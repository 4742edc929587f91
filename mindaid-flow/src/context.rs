use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Who said a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single turn of conversation kept alongside the workflow state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered chat log, optionally bounded to the most recent `max_messages`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
    max_messages: Option<usize>,
}

impl ChatHistory {
    pub fn with_limit(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages: Some(max_messages),
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if let Some(max) = self.max_messages {
            if self.messages.len() > max {
                let overflow = self.messages.len() - max;
                self.messages.drain(..overflow);
            }
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Typed key/value state shared by the tasks of one session, plus its chat log.
///
/// Cloning a `Context` is cheap and every clone sees the same data.
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
    chat_history: Arc<RwLock<ChatHistory>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            chat_history: Arc::new(RwLock::new(ChatHistory::default())),
        }
    }

    /// Create a context whose chat log keeps at most `max` messages
    pub fn with_max_chat_messages(max: usize) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            chat_history: Arc::new(RwLock::new(ChatHistory::with_limit(max))),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) {
        self.set_sync(key, value);
    }

    pub fn set_sync(&self, key: impl Into<String>, value: impl Serialize) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.data.insert(key, value);
            }
            Err(e) => warn!(key = %key, error = %e, "Dropping context value that failed to serialize"),
        }
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_sync(key)
    }

    pub fn get_sync<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn clear(&self) {
        self.data.clear();
        self.write_history().clear();
    }

    pub async fn add_user_message(&self, content: impl Into<String>) {
        self.write_history()
            .push(ChatMessage::new(MessageRole::User, content));
    }

    pub async fn add_assistant_message(&self, content: impl Into<String>) {
        self.write_history()
            .push(ChatMessage::new(MessageRole::Assistant, content));
    }

    pub async fn get_chat_history(&self) -> Vec<ChatMessage> {
        self.read_history().messages().to_vec()
    }

    pub async fn chat_history_len(&self) -> usize {
        self.read_history().len()
    }

    fn read_history(&self) -> std::sync::RwLockReadGuard<'_, ChatHistory> {
        self.chat_history
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_history(&self) -> std::sync::RwLockWriteGuard<'_, ChatHistory> {
        self.chat_history
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "rig")]
impl From<&ChatMessage> for rig::completion::Message {
    fn from(message: &ChatMessage) -> Self {
        match message.role {
            MessageRole::Assistant => rig::completion::Message::assistant(message.content.clone()),
            // rig has no system turn in chat history; the preamble carries system text
            MessageRole::User | MessageRole::System => {
                rig::completion::Message::user(message.content.clone())
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ContextSnapshot {
    data: HashMap<String, Value>,
    #[serde(default)]
    chat_history: ChatHistory,
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let snapshot = ContextSnapshot {
            data: self
                .data
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            chat_history: self.read_history().clone(),
        };
        snapshot.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let snapshot = ContextSnapshot::deserialize(deserializer)?;
        Ok(Self {
            data: Arc::new(snapshot.data.into_iter().collect()),
            chat_history: Arc::new(RwLock::new(snapshot.chat_history)),
        })
    }
}
