use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, warn };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };

use super::{ create_streaming_response, ChatClient, LineBuffer, TextStream };
use crate::llm::{ AgentError, LlmConfig };
use crate::models::chat::HistoryEntry;

const API_VERSION: &str = "2023-06-01";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub struct AnthropicChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    system_prompt: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageStop,
    Error {
        error: AnthropicErrorDetail,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicDelta {
    #[serde(rename = "type")]
    delta_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, PartialEq)]
pub(crate) enum StreamAction {
    Text(String),
    Stop,
}

/// Interprets one SSE line. Non-data lines and events without text yield `Ok(None)`.
pub(crate) fn parse_stream_line(line: &str) -> Result<Option<StreamAction>, AgentError> {
    let data = match line.strip_prefix("data:") {
        Some(d) => d.trim_start(),
        None => {
            return Ok(None);
        }
    };
    if data.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<AnthropicStreamEvent>(data)? {
        AnthropicStreamEvent::ContentBlockDelta { delta } => {
            if delta.delta_type != "text_delta" {
                return Ok(None);
            }
            Ok(delta.text.filter(|t| !t.is_empty()).map(StreamAction::Text))
        }
        AnthropicStreamEvent::MessageStop => Ok(Some(StreamAction::Stop)),
        AnthropicStreamEvent::Error { error } =>
            Err(AgentError::Stream(format!("{}: {}", error.error_type, error.message))),
        AnthropicStreamEvent::Other => Ok(None),
    }
}

impl AnthropicChatClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        system_prompt: String,
        max_tokens: u32
    ) -> Result<Self, AgentError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key).map_err(|e|
                AgentError::Config(format!("Invalid API key format: {}", e))
            )?
        );

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            model,
            base_url,
            system_prompt,
            max_tokens,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, AgentError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgentError::MissingCredential(API_KEY_ENV))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.system_prompt.clone(),
            config.max_tokens
        )
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn build_request<'a>(&'a self, messages: &'a [HistoryEntry], stream: bool) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.model,
            system: &self.system_prompt,
            messages: messages
                .iter()
                .map(|m| AnthropicMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            max_tokens: self.max_tokens,
            stream,
        }
    }

    async fn send(&self, messages: &[HistoryEntry], stream: bool) -> Result<reqwest::Response, AgentError> {
        let resp = self.http
            .post(self.messages_url())
            .json(&self.build_request(messages, stream))
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Api { status: status.as_u16(), body });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatClient for AnthropicChatClient {
    async fn complete(&self, messages: &[HistoryEntry]) -> Result<String, AgentError> {
        debug!("Anthropic complete: model={}, messages={}", self.model, messages.len());
        let resp = self.send(messages, false).await?.json::<AnthropicResponse>().await?;

        let text = resp.content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect::<String>();
        Ok(text)
    }

    async fn complete_stream(&self, messages: &[HistoryEntry]) -> Result<TextStream, AgentError> {
        debug!("Anthropic stream: model={}, messages={}", self.model, messages.len());
        let resp = self.send(messages, true).await?;

        Ok(
            create_streaming_response(move |tx| async move {
                let mut bytes = resp.bytes_stream();
                let mut buffer = LineBuffer::new();

                while let Some(chunk_result) = bytes.next().await {
                    let chunk = match chunk_result {
                        Ok(c) => c,
                        Err(e) => {
                            let _ = tx.send(Err(AgentError::Http(e))).await;
                            return;
                        }
                    };

                    for line in buffer.push(&chunk) {
                        match parse_stream_line(&line) {
                            Ok(Some(StreamAction::Text(text))) => {
                                if tx.send(Ok(text)).await.is_err() {
                                    return;
                                }
                            }
                            Ok(Some(StreamAction::Stop)) => {
                                return;
                            }
                            Ok(None) => {}
                            Err(e) => {
                                warn!("Anthropic stream error: {}", e);
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        }
                    }
                }

                let _ = tx.send(
                    Err(AgentError::Stream("stream ended before message_stop".to_string()))
                ).await;
            })
        )
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}
