use crate::llm::chat::LineBuffer;
use crate::models::chat::{ ChatRequest, ChatResponse, StreamEvent };
use crate::server::sse::DONE_SENTINEL;
use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::debug;
use reqwest::Client as HttpClient;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} {reason}")]
    Status {
        status: u16,
        reason: String,
    },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Text(String),
    Done,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, TransportError>> + Send>>;

/// How the conversation controller reaches the chat API.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, TransportError>;
}

/// Decodes one line of the `/api/chat/stream` body.
pub fn parse_event_line(line: &str) -> Result<Option<StreamChunk>, TransportError> {
    let data = match line.strip_prefix("data:") {
        Some(d) => d.trim(),
        None => {
            return Ok(None);
        }
    };
    if data == DONE_SENTINEL {
        return Ok(Some(StreamChunk::Done));
    }
    let event: StreamEvent = serde_json::from_str(data)?;
    Ok(Some(StreamChunk::Text(event.text)))
}

pub struct HttpTransport {
    http: HttpClient,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let http = HttpClient::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, route: &str, request: &ChatRequest) -> Result<reqwest::Response, TransportError> {
        let url = format!("{}{}", self.base_url, route);
        debug!("POST {}", url);
        let resp = self.http.post(&url).json(request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let resp = self.post("/api/chat", request).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice::<ChatResponse>(&body)?)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, TransportError> {
        let resp = self.post("/api/chat/stream", request).await?;
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut buffer = LineBuffer::new();

            while let Some(chunk_result) = bytes.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(TransportError::Http(e))).await;
                        return;
                    }
                };

                for line in buffer.push(&chunk) {
                    match parse_event_line(&line) {
                        Ok(Some(chunk)) => {
                            let done = chunk == StreamChunk::Done;
                            if tx.send(Ok(chunk)).await.is_err() || done {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }

            // The server ends a failed relay without the sentinel.
            let _ = tx.send(
                Err(TransportError::Stream("stream closed before completion sentinel".to_string()))
            ).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_sentinel_lines() {
        assert_eq!(
            parse_event_line(r#"data: {"text":"Hi"}"#).unwrap(),
            Some(StreamChunk::Text("Hi".into()))
        );
        assert_eq!(parse_event_line("data: [DONE]").unwrap(), Some(StreamChunk::Done));
        assert_eq!(parse_event_line("").unwrap(), None);
    }

    #[test]
    fn malformed_event_is_an_error() {
        assert!(matches!(parse_event_line("data: {oops"), Err(TransportError::Decode(_))));
    }
}
