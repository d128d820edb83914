use clap::{ Parser, Subcommand };
use std::path::PathBuf;

use crate::llm::{ LlmConfig, DEFAULT_SYSTEM_PROMPT };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false", global = true)]
    pub debug: bool,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API server (default).
    Serve,
    /// Chat with a running server from the terminal.
    Chat(ChatArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServerArgs {
    // --- Chat LLM Provider Args ---
    /// API key for the hosted model. Checked on first use, not at startup.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Model name for chat completion
    #[arg(long, env = "CHAT_MODEL", default_value = crate::llm::DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    /// Base URL for the Chat LLM provider API
    #[arg(long, env = "CHAT_BASE_URL", default_value = crate::llm::DEFAULT_BASE_URL)]
    pub chat_base_url: String,

    /// Maximum tokens generated per response
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value_t = crate::llm::DEFAULT_MAX_TOKENS)]
    pub chat_max_tokens: u32,

    /// Overrides the built-in system prompt
    #[arg(long, env = "SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Origin allowed to call the API from a browser.
    #[arg(long, env = "APP_URL", default_value = "http://localhost:3000")]
    pub app_url: String,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChatArgs {
    /// Base URL of the chat API server
    #[arg(long, env = "CHAT_API_URL", default_value = "http://127.0.0.1:4000")]
    pub api_url: String,

    /// Use the streaming endpoint
    #[arg(long, default_value = "false")]
    pub stream: bool,

    /// Directory holding the session's persisted conversation. In-memory if omitted.
    #[arg(long, env = "CHAT_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,
}

impl ServerArgs {
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            api_key: self.anthropic_api_key.clone().filter(|k| !k.trim().is_empty()),
            completion_model: self.chat_model.clone(),
            base_url: self.chat_base_url.clone(),
            max_tokens: self.chat_max_tokens,
            system_prompt: self.system_prompt
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}
