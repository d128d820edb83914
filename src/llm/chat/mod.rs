pub mod anthropic;

use async_trait::async_trait;
use futures::{ Future, Stream };
use std::pin::Pin;
use std::sync::Arc;
use super::{ AgentError, LlmConfig };
use self::anthropic::AnthropicChatClient;
use crate::models::chat::HistoryEntry;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[HistoryEntry]) -> Result<String, AgentError>;

    async fn complete_stream(&self, messages: &[HistoryEntry]) -> Result<TextStream, AgentError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

/// Runs `response_fn` on a spawned task and exposes whatever it sends as a stream.
pub fn create_streaming_response<F, Fut>(response_fn: F) -> TextStream
where
    F: FnOnce(mpsc::Sender<Result<String, AgentError>>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Splits a byte stream into lines. Bytes are held until a full line is
/// available, so a multi-byte character split across chunks decodes intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, without the
    /// trailing `\n` or `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(line_end) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=line_end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, AgentError> {
    let client = AnthropicChatClient::from_config(config)?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn streaming_response_yields_sent_items_in_order() {
        let stream = create_streaming_response(|tx| async move {
            let _ = tx.send(Ok("a".to_string())).await;
            let _ = tx.send(Ok("b".to_string())).await;
        });

        let items: Vec<String> = stream
            .map(|r| r.unwrap())
            .collect().await;
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn line_buffer_keeps_split_multibyte_character_intact() {
        let bytes = "data: あ\n".as_bytes();
        let mut lines = LineBuffer::new();

        assert!(lines.push(&bytes[..7]).is_empty());
        assert!(lines.push(&bytes[7..8]).is_empty());
        assert_eq!(lines.push(&bytes[8..]), vec!["data: あ".to_string()]);
    }

    #[test]
    fn line_buffer_strips_crlf_and_holds_partial_line() {
        let mut lines = LineBuffer::new();
        assert_eq!(lines.push(b"a\r\nb\nc"), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(lines.push(b"\n"), vec!["c".to_string()]);
    }

    #[test]
    fn new_client_requires_api_key() {
        let config = LlmConfig::default();
        match new_client(&config) {
            Err(AgentError::MissingCredential(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("client built without credential"),
        }
    }
}
