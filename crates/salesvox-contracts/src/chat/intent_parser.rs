use super::command_registry::{ChatAction, NO_ARG_COMMANDS, SAMPLE_COMMAND, SAMPLE_QUESTIONS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Noop,
    Command(ChatAction),
    Question(String),
    Invalid(String),
}

fn find_action(command: &str) -> Option<ChatAction> {
    NO_ARG_COMMANDS
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_sample_arg(arg: &str) -> ChatInput {
    let count = SAMPLE_QUESTIONS.len();
    match arg.trim().parse::<usize>() {
        Ok(index) if (1..=count).contains(&index) => {
            ChatInput::Question(SAMPLE_QUESTIONS[index - 1].to_string())
        }
        _ => ChatInput::Invalid(format!("/sample expects a number between 1 and {count}")),
    }
}

/// Classifies one line of REPL input. Lines starting with `/` followed by
/// a command word are commands; everything else non-blank is a question.
pub fn parse_chat_input(text: &str) -> ChatInput {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ChatInput::Noop;
    }

    let Some(slash_tail) = trimmed.strip_prefix('/') else {
        return ChatInput::Question(trimmed.to_string());
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return ChatInput::Question(trimmed.to_string());
    }

    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();
    if command == SAMPLE_COMMAND {
        return parse_sample_arg(arg);
    }
    match find_action(&command) {
        Some(action) if arg.is_empty() => ChatInput::Command(action),
        Some(_) => ChatInput::Invalid(format!("/{command} takes no arguments")),
        None => ChatInput::Invalid(format!("Unknown command: /{command}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_chat_input, ChatInput};
    use crate::chat::{ChatAction, SAMPLE_QUESTIONS};

    #[test]
    fn blank_lines_are_noop() {
        assert_eq!(parse_chat_input(""), ChatInput::Noop);
        assert_eq!(parse_chat_input("  \t "), ChatInput::Noop);
    }

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            parse_chat_input("  Show me sales by region "),
            ChatInput::Question("Show me sales by region".to_string())
        );
        assert_eq!(
            parse_chat_input("/ not a command"),
            ChatInput::Question("/ not a command".to_string())
        );
    }

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(
            parse_chat_input("/RESET"),
            ChatInput::Command(ChatAction::Reset)
        );
        assert_eq!(
            parse_chat_input("/exit"),
            ChatInput::Command(ChatAction::Quit)
        );
        assert_eq!(
            parse_chat_input("/overview"),
            ChatInput::Command(ChatAction::Overview)
        );
    }

    #[test]
    fn sample_command_expands_to_question() {
        assert_eq!(
            parse_chat_input("/sample 2"),
            ChatInput::Question(SAMPLE_QUESTIONS[1].to_string())
        );
        assert!(matches!(parse_chat_input("/sample 0"), ChatInput::Invalid(_)));
        assert!(matches!(parse_chat_input("/sample nine"), ChatInput::Invalid(_)));
    }

    #[test]
    fn unknown_or_overloaded_commands_are_invalid() {
        assert_eq!(
            parse_chat_input("/drop"),
            ChatInput::Invalid("Unknown command: /drop".to_string())
        );
        assert_eq!(
            parse_chat_input("/reset now"),
            ChatInput::Invalid("/reset takes no arguments".to_string())
        );
    }
}
