mod file;
mod memory;

pub use file::FileSessionStorage;
pub use memory::MemorySessionStorage;

use crate::models::chat::{ HistoryEntry, Message };
use log::{ error, info };
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Key under which the serialized conversation is kept.
pub const STORAGE_KEY: &str = "ai-chat-messages";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session storage JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Session-scoped string key/value storage.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

pub fn create_session_storage(dir: Option<&Path>) -> Arc<dyn SessionStorage> {
    match dir {
        Some(dir) => {
            info!("Conversation will be stored in: {}", dir.display());
            Arc::new(FileSessionStorage::new(dir))
        }
        None => {
            info!("Conversation will be kept in memory only");
            Arc::new(MemorySessionStorage::new())
        }
    }
}

/// Ordered, append-only message list mirrored into session storage after
/// every change.
pub struct ConversationStore {
    messages: Vec<Message>,
    storage: Arc<dyn SessionStorage>,
}

impl ConversationStore {
    /// Restores whatever the storage holds; unreadable state starts empty.
    pub fn load(storage: Arc<dyn SessionStorage>) -> Self {
        let messages = match storage.get_item(STORAGE_KEY) {
            Ok(Some(raw)) =>
                match serde_json::from_str::<Vec<Message>>(&raw) {
                    Ok(messages) => messages,
                    Err(e) => {
                        error!("Failed to parse stored messages: {}", e);
                        Vec::new()
                    }
                }
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Failed to read stored messages: {}", e);
                Vec::new()
            }
        };

        Self { messages, storage }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.persist();
    }

    /// Role/content pairs of everything stored so far.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages.iter().map(HistoryEntry::from).collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        if let Err(e) = self.storage.remove_item(STORAGE_KEY) {
            error!("Failed to remove stored messages: {}", e);
        }
    }

    fn persist(&self) {
        if self.messages.is_empty() {
            return;
        }
        let result = serde_json
            ::to_string(&self.messages)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set_item(STORAGE_KEY, &json));
        if let Err(e) = result {
            error!("Failed to persist messages: {}", e);
        }
    }
}
