pub mod agent;
pub mod models;
pub mod server;
pub mod llm;
pub mod cli;
pub mod history;
pub mod client;

use agent::AIAgent;
use cli::{ Args, Command, ServerArgs };
use log::{ info, warn };
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command.clone() {
        Some(Command::Chat(chat_args)) => client::repl::run_chat(chat_args).await,
        Some(Command::Serve) | None => serve(args.server).await,
    }
}

pub async fn serve(args: ServerArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let llm_config = args.llm_config();

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Allowed Origin: {}", args.app_url);
    info!("Chat Model: {}", llm_config.completion_model);
    info!("Chat Base URL: {}", llm_config.base_url);
    info!("Max Tokens: {}", llm_config.max_tokens);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    if llm_config.api_key.is_none() {
        warn!("ANTHROPIC_API_KEY is not set. Chat requests will fail until it is provided.");
    }

    let agent = Arc::new(AIAgent::new(llm_config));
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
