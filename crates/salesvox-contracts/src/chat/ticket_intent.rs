use crate::records::TicketRequest;

/// Phrases that force the next completion to open a ticket. Matched against
/// the lower-cased utterance by substring.
pub const TICKET_INTENT_PHRASES: &[&str] = &[
    "create a support ticket",
    "create a ticket",
    "file a support ticket",
    "file a ticket",
    "open a support ticket",
    "open a ticket",
    "submit a support ticket",
    "submit a ticket",
    "raise a ticket",
];

pub const FALLBACK_TICKET_TITLE: &str = "Support request from chat";
pub const DIRECT_TICKET_LABEL: &str = "support";

const MIN_TITLE_CHARS: usize = 5;
const MAX_TITLE_CHARS: usize = 120;

pub fn wants_ticket(utterance: &str) -> bool {
    let lowered = utterance.to_lowercase();
    TICKET_INTENT_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Ticket built straight from the user's words, for when a ticket was
/// demanded but the model did not ask for one.
pub fn direct_ticket(utterance: &str) -> TicketRequest {
    TicketRequest {
        title: title_from_utterance(utterance),
        description: utterance.to_string(),
        labels: vec![DIRECT_TICKET_LABEL.to_string()],
    }
}

fn title_from_utterance(utterance: &str) -> String {
    let Some(tail) = text_after_for(utterance) else {
        return FALLBACK_TICKET_TITLE.to_string();
    };
    let candidate = tail
        .trim()
        .trim_end_matches(['.', '!', '?', ',', ';', ':'])
        .trim_end();
    if candidate.chars().count() < MIN_TITLE_CHARS {
        return FALLBACK_TICKET_TITLE.to_string();
    }
    candidate.chars().take(MAX_TITLE_CHARS).collect()
}

// First standalone "for", case-insensitive. ASCII lowering keeps byte offsets
// identical to the original text.
fn text_after_for(utterance: &str) -> Option<&str> {
    let lowered = utterance.to_ascii_lowercase();
    let bytes = lowered.as_bytes();
    let mut from = 0;
    while let Some(pos) = lowered[from..].find("for") {
        let start = from + pos;
        let end = start + 3;
        let starts_word = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let ends_word = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if starts_word && ends_word {
            return Some(&utterance[end..]);
        }
        from = end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{direct_ticket, wants_ticket, FALLBACK_TICKET_TITLE};

    #[test]
    fn ticket_phrases_are_detected_case_insensitively() {
        assert!(wants_ticket("please file a ticket, the dashboard is broken"));
        assert!(wants_ticket("Can you CREATE A SUPPORT TICKET?"));
        assert!(wants_ticket("I'd like to open a ticket for billing"));
        assert!(!wants_ticket("What are the top 5 products by total sales?"));
        assert!(!wants_ticket("how do tickets work"));
    }

    #[test]
    fn title_comes_from_text_after_for() {
        let request = direct_ticket("Please open a ticket for the broken CSV export.");
        assert_eq!(request.title, "the broken CSV export");
        assert_eq!(
            request.description,
            "Please open a ticket for the broken CSV export."
        );
        assert_eq!(request.labels, vec!["support".to_string()]);
    }

    #[test]
    fn short_or_missing_tail_uses_fallback_title() {
        assert_eq!(
            direct_ticket("please file a ticket, the dashboard is broken").title,
            FALLBACK_TICKET_TITLE
        );
        assert_eq!(
            direct_ticket("file a ticket for me").title,
            FALLBACK_TICKET_TITLE
        );
    }

    #[test]
    fn for_must_be_a_whole_word() {
        let request = direct_ticket("Unable to format reports; please create a ticket");
        assert_eq!(request.title, FALLBACK_TICKET_TITLE);

        let request = direct_ticket("Create a ticket FOR the missing Q3 numbers");
        assert_eq!(request.title, "the missing Q3 numbers");
    }
}
