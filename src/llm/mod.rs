pub mod chat;

use thiserror::Error;

pub const DEFAULT_CHAT_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant.
You provide clear, concise, and friendly responses.
You maintain a professional yet approachable tone.
When you don't know something, you admit it honestly.";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0} environment variable is required")]
    MissingCredential(&'static str),

    #[error("Agent configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Api {
        status: u16,
        body: String,
    },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Failed to decode provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            completion_model: DEFAULT_CHAT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}
