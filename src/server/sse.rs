//! Server-sent-event framing for the streaming chat endpoint.

use crate::llm::chat::{ create_streaming_response, TextStream };
use crate::llm::AgentError;
use crate::models::chat::StreamEvent;
use futures::StreamExt;
use log::error;

pub const DONE_SENTINEL: &str = "[DONE]";

pub fn encode_event(text: &str) -> Result<String, AgentError> {
    let payload = serde_json::to_string(&StreamEvent { text: text.to_string() })?;
    Ok(format!("data: {}\n\n", payload))
}

pub fn done_frame() -> String {
    format!("data: {}\n\n", DONE_SENTINEL)
}

/// Frames every chunk as a `data:` record and appends the sentinel once the
/// source ends cleanly. A source error ends the relay with that error and no
/// sentinel; frames already emitted stay emitted.
pub fn relay(mut chunks: TextStream) -> TextStream {
    create_streaming_response(move |tx| async move {
        while let Some(item) = chunks.next().await {
            let frame = item.and_then(|text| encode_event(&text));
            match frame {
                Ok(frame) => {
                    if tx.send(Ok(frame)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    error!("Streaming error: {}", e);
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
        let _ = tx.send(Ok(done_frame())).await;
    })
}
