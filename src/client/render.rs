use crate::models::chat::{ Message, Role };

pub const GREETING: &str = "Hello! Ask me anything.";
pub const LOADING_INDICATOR: &str = "Assistant: ...";

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    }
}

pub fn render_message(message: &Message) -> String {
    format!("{}: {}", role_label(message.role), message.content)
}

/// Whole-transcript view: the greeting when idle and empty, otherwise every
/// message in order plus the loading line while a reply is pending.
pub fn render(messages: &[Message], loading: bool) -> String {
    if messages.is_empty() && !loading {
        return GREETING.to_string();
    }

    let mut lines: Vec<String> = messages.iter().map(render_message).collect();
    if loading {
        lines.push(LOADING_INDICATOR.to_string());
    }
    lines.join("\n")
}
