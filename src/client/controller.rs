use super::transport::{ ChatTransport, StreamChunk, TransportError };
use crate::history::ConversationStore;
use crate::models::chat::{ ChatRequest, Message };
use futures::StreamExt;
use log::error;
use std::sync::Arc;

/// Assistant-role text shown in place of a reply when a send fails.
pub const ERROR_REPLY: &str = "An error occurred. Please try again.";

/// Drives one conversation: appends the user turn, calls the API, appends the
/// reply or a failure notice. Overlapping sends are not serialized; callers
/// disable input while `is_loading()`.
pub struct ChatController {
    store: ConversationStore,
    transport: Arc<dyn ChatTransport>,
    loading: bool,
    error: Option<String>,
}

impl ChatController {
    pub fn new(store: ConversationStore, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            store,
            transport,
            loading: false,
            error: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// First half of a send. Blank content returns `None` and changes nothing.
    pub fn begin_send(&mut self, content: &str) -> Option<ChatRequest> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        let conversation_history = self.store.history();
        self.store.push(Message::user(content));
        self.loading = true;
        self.error = None;

        Some(ChatRequest {
            message: content.to_string(),
            session_id: None,
            conversation_history: Some(conversation_history),
        })
    }

    /// Second half of a send: records the outcome and clears `loading`.
    pub fn finish_send(&mut self, result: Result<String, TransportError>) {
        match result {
            Ok(content) => self.store.push(Message::assistant(content)),
            Err(e) => {
                error!("Failed to send message: {}", e);
                self.error = Some(e.to_string());
                self.store.push(Message::assistant(ERROR_REPLY));
            }
        }
        self.loading = false;
    }

    pub async fn send_message(&mut self, content: &str) {
        let Some(request) = self.begin_send(content) else {
            return;
        };
        let result = self.transport.send(&request).await.map(|resp| resp.message.content);
        self.finish_send(result);
    }

    /// Like `send_message` but against the streaming endpoint; `on_chunk` sees
    /// each text chunk as it arrives.
    pub async fn send_message_streaming<F>(&mut self, content: &str, mut on_chunk: F)
        where F: FnMut(&str)
    {
        let Some(request) = self.begin_send(content) else {
            return;
        };
        let result = self.collect_stream(&request, &mut on_chunk).await;
        self.finish_send(result);
    }

    async fn collect_stream<F>(&self, request: &ChatRequest, on_chunk: &mut F) -> Result<String, TransportError>
        where F: FnMut(&str)
    {
        let mut stream = self.transport.stream(request).await?;
        let mut text = String::new();

        while let Some(item) = stream.next().await {
            match item? {
                StreamChunk::Text(chunk) => {
                    on_chunk(&chunk);
                    text.push_str(&chunk);
                }
                StreamChunk::Done => {
                    return Ok(text);
                }
            }
        }
        Err(TransportError::Stream("stream ended without completion sentinel".to_string()))
    }

    pub fn clear_messages(&mut self) {
        self.store.clear();
        self.error = None;
    }
}
