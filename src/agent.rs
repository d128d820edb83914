use crate::llm::chat::{ new_client as new_chat_client, ChatClient, TextStream };
use crate::llm::{ AgentError, LlmConfig };
use crate::models::chat::HistoryEntry;

use async_trait::async_trait;
use log::info;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// What the HTTP boundary needs from the hosted model.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn generate(&self, messages: &[HistoryEntry]) -> Result<String, AgentError>;

    async fn stream(&self, messages: &[HistoryEntry]) -> Result<TextStream, AgentError>;
}

/// Agent handle that builds its chat client on first use and keeps it for the
/// lifetime of the process. A missing credential fails that use and leaves the
/// agent uninitialized.
pub struct AIAgent {
    config: LlmConfig,
    client: OnceCell<Arc<dyn ChatClient>>,
}

impl AIAgent {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.client.get().is_some()
    }

    fn client(&self) -> Result<&Arc<dyn ChatClient>, AgentError> {
        self.client.get_or_try_init(|| {
            let client = new_chat_client(&self.config)?;
            info!(
                "Chat agent ready: Model={}, BaseURL={}",
                client.get_model(),
                client.get_base_url()
            );
            Ok(client)
        })
    }
}

#[async_trait]
impl ChatAgent for AIAgent {
    async fn generate(&self, messages: &[HistoryEntry]) -> Result<String, AgentError> {
        self.client()?.complete(messages).await
    }

    async fn stream(&self, messages: &[HistoryEntry]) -> Result<TextStream, AgentError> {
        self.client()?.complete_stream(messages).await
    }
}
