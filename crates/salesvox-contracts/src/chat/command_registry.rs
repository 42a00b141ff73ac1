#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Help,
    Reset,
    Samples,
    Tables,
    Overview,
    Quit,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: ChatAction,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: ChatAction::Help,
    },
    CommandSpec {
        command: "reset",
        action: ChatAction::Reset,
    },
    CommandSpec {
        command: "samples",
        action: ChatAction::Samples,
    },
    CommandSpec {
        command: "tables",
        action: ChatAction::Tables,
    },
    CommandSpec {
        command: "overview",
        action: ChatAction::Overview,
    },
    CommandSpec {
        command: "quit",
        action: ChatAction::Quit,
    },
    CommandSpec {
        command: "exit",
        action: ChatAction::Quit,
    },
];

/// Takes a 1-based index into [`SAMPLE_QUESTIONS`].
pub(crate) const SAMPLE_COMMAND: &str = "sample";

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/help",
    "/reset",
    "/samples",
    "/sample <n>",
    "/tables",
    "/overview",
    "/quit",
];

pub const SAMPLE_QUESTIONS: &[&str] = &[
    "What are the top 5 products by total sales?",
    "Show me sales by region",
    "Which customer has the highest total spending?",
    "What is the average order value?",
    "Show sales trends over the last 6 months",
    "Which sales rep has the most sales?",
    "What are the best selling categories?",
    "Show me all sales from North America",
];
