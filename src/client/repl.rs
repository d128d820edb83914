use super::controller::ChatController;
use super::input::{ InputBuffer, KeyInput };
use super::render::{ render, render_message, role_label };
use super::transport::HttpTransport;
use crate::cli::ChatArgs;
use crate::history::{ create_session_storage, ConversationStore };
use crate::models::chat::Role;
use log::info;
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{ AsyncBufReadExt, BufReader };

const NEW_CHAT_COMMAND: &str = "/new";
const QUIT_COMMAND: &str = "/quit";

pub async fn run_chat(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("Chat API URL: {}", args.api_url);
    info!("Streaming: {}", args.stream);

    let storage = create_session_storage(args.storage_dir.as_deref());
    let transport = Arc::new(HttpTransport::new(&args.api_url)?);
    let mut controller = ChatController::new(ConversationStore::load(storage), transport);
    let mut input = InputBuffer::new();

    println!("{}", render(controller.messages(), controller.is_loading()));
    println!("(Enter to send, {} for a new conversation, {} to exit)", NEW_CHAT_COMMAND, QUIT_COMMAND);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            QUIT_COMMAND => {
                break;
            }
            NEW_CHAT_COMMAND => {
                controller.clear_messages();
                println!("{}", render(controller.messages(), controller.is_loading()));
                continue;
            }
            _ => {}
        }

        for c in line.chars() {
            input.handle_key(KeyInput::Char(c));
        }
        let Some(content) = input.handle_key(KeyInput::Enter { shift: false, composing: false }) else {
            continue;
        };

        input.set_disabled(true);
        if args.stream {
            print!("{}: ", role_label(Role::Assistant));
            let _ = std::io::stdout().flush();
            controller.send_message_streaming(&content, |chunk| {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            }).await;
            println!();
            if controller.error().is_some() {
                if let Some(last) = controller.messages().last() {
                    println!("{}", render_message(last));
                }
            }
        } else {
            controller.send_message(&content).await;
            if let Some(last) = controller.messages().last() {
                println!("{}", render_message(last));
            }
        }
        input.set_disabled(false);
    }

    Ok(())
}
