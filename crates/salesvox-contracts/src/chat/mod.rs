mod command_registry;
mod conversation;
mod intent_parser;
mod ticket_intent;

pub use command_registry::{ChatAction, CHAT_HELP_COMMANDS, SAMPLE_QUESTIONS};
pub use conversation::{Conversation, Role, ToolInvocation, Turn};
pub use intent_parser::{parse_chat_input, ChatInput};
pub use ticket_intent::{
    direct_ticket, wants_ticket, DIRECT_TICKET_LABEL, FALLBACK_TICKET_TITLE,
    TICKET_INTENT_PHRASES,
};
