//! Tool dispatcher for the sales-data chat.
//!
//! One call to [`DataAgent::handle`] runs a full user turn:
//! `Idle -> AwaitingCompletion -> {DirectTicket | ToolExecution -> AwaitingFinalCompletion} -> Idle`.
//! Every turn yields exactly one user-visible string, and the session history
//! keeps whatever was appended before a failure.

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use salesvox_contracts::chat::{direct_ticket, wants_ticket, Conversation, ToolInvocation, Turn};
use salesvox_contracts::events::ActivityLog;
use salesvox_contracts::gate;
use salesvox_contracts::records::{QueryResult, TicketOutcome, TicketRequest};
use salesvox_contracts::tools::{available_tools, ToolCall, OPEN_TICKET_TOOL};

use crate::completion::{CompletionProvider, CompletionRequest, ToolChoice};
use crate::http::{error_chain_text, truncate_text};
use crate::store::QueryStore;
use crate::tracker::IssueTracker;

pub const DATA_SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a Data Insights application.
Your role is to help users query and understand sales data from a database.

IMPORTANT GUIDELINES:
1. You can only execute SELECT queries - never DELETE, DROP, UPDATE, INSERT, or any other modifying operations
2. When users ask complex questions, break them down into SQL queries using the query_database function
3. If a user seems frustrated, needs help beyond your capabilities, or asks explicitly, offer to create a support ticket
4. Always explain your findings in a clear, business-friendly manner
5. If query results are large, summarize the key insights rather than listing all rows
6. Suggest creating a support ticket when you cannot fully resolve an issue or when the user needs human assistance

Available tables:
- sales: Contains sales transactions with columns: id, date, customer, product, category, quantity, unit_price, total_amount, region, sales_rep, created_at
- customers: Contains customer information with columns: id, name, region, contact_email, total_orders, total_spent

Be helpful, accurate, and safety-conscious.";

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a Data Insights application.
Your role is to help users query and understand sales data from a database.";

pub const DEFAULT_REPLY: &str = "I've processed your request.";

/// Rows beyond this are cut from the tool-result turn; `row_count` still
/// reports the full count.
const MAX_ROWS_FOR_MODEL: usize = 200;

/// Conversation state for one chat user. Passed by reference into every turn.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    id: String,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conversation: Conversation::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn reset(&mut self) {
        self.conversation.reset();
        info!(session = %self.id, "Conversation history reset");
    }
}

pub struct DataAgent {
    completions: Box<dyn CompletionProvider>,
    store: Box<dyn QueryStore>,
    tracker: Box<dyn IssueTracker>,
    model: String,
    log: ActivityLog,
}

impl DataAgent {
    pub fn new(
        completions: Box<dyn CompletionProvider>,
        store: Box<dyn QueryStore>,
        tracker: Box<dyn IssueTracker>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            completions,
            store,
            tracker,
            model: model.into(),
            log: ActivityLog::disabled(),
        }
    }

    pub fn with_activity_log(mut self, log: ActivityLog) -> Self {
        self.log = log;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Runs one user turn. Collaborator failures never escape; they become an
    /// apology that offers a ticket.
    pub fn handle(&self, session: &mut ChatSession, utterance: &str) -> String {
        match self.run_turn(session, utterance) {
            Ok(reply) => reply,
            Err(err) => {
                let detail = error_chain_text(&err, 400);
                error!("Error in chat: {detail}");
                self.note(
                    session,
                    "turn_failed",
                    json!({"error": detail, "history_len": session.conversation.len()}),
                );
                format!(
                    "I encountered an error: {detail}. Would you like me to create a support ticket for this issue?"
                )
            }
        }
    }

    fn run_turn(&self, session: &mut ChatSession, utterance: &str) -> Result<String> {
        info!("User message: {utterance}");
        session.conversation.push(Turn::user(utterance));

        let force_ticket = wants_ticket(utterance);
        self.note(
            session,
            "turn_started",
            json!({"utterance": utterance, "force_ticket": force_ticket}),
        );

        let choice = if force_ticket {
            ToolChoice::Forced(OPEN_TICKET_TOOL.to_string())
        } else {
            ToolChoice::Auto
        };
        let request = CompletionRequest::new(
            &self.model,
            with_system(DATA_SYSTEM_PROMPT, &session.conversation),
        )
        .with_tools(available_tools(), choice);
        debug!("Requesting completion from {} ({})", self.completions.name(), self.model);
        let completion = self.completions.complete(&request)?;
        debug!("Assistant response: {:?}", completion.content);

        let invoked_ticket = completion
            .invocations
            .iter()
            .any(|invocation| invocation.name == OPEN_TICKET_TOOL);
        if force_ticket && !invoked_ticket {
            let outcome = self.open_direct_ticket(session, utterance);
            return Ok(self.finish(session, outcome.confirmation(), 0));
        }

        if completion.invocations.is_empty() {
            let reply = completion.trimmed_text().unwrap_or(DEFAULT_REPLY).to_string();
            return Ok(self.finish(session, reply, 0));
        }

        let mut tickets = Vec::new();
        for invocation in &completion.invocations {
            session.conversation.push(Turn::assistant_invocation(
                completion.content.clone(),
                invocation.clone(),
            ));
            let (payload, ticket) = self.dispatch(session, invocation);
            session
                .conversation
                .push(Turn::tool_result(&invocation.id, payload.to_string()));
            tickets.extend(ticket);
        }
        if force_ticket && tickets.is_empty() {
            // The ticket invocation was refused at argument validation.
            tickets.push(self.open_direct_ticket(session, utterance));
        }

        let summary_request = CompletionRequest::new(
            &self.model,
            with_system(SUMMARY_SYSTEM_PROMPT, &session.conversation),
        );
        let summary = self.completions.complete(&summary_request)?;
        let mut reply = summary.trimmed_text().unwrap_or(DEFAULT_REPLY).to_string();

        if force_ticket {
            for ticket in &tickets {
                if !reply.contains(ticket.evidence()) {
                    reply.push_str("\n\n");
                    reply.push_str(&ticket.confirmation());
                }
            }
        }

        Ok(self.finish(session, reply, completion.invocations.len()))
    }

    /// Validates an invocation and runs it. Returns the tool-result payload,
    /// plus the ticket outcome when a ticket was attempted.
    fn dispatch(
        &self,
        session: &ChatSession,
        invocation: &ToolInvocation,
    ) -> (Value, Option<TicketOutcome>) {
        info!(
            "Calling function: {} with args: {}",
            invocation.name,
            truncate_text(&invocation.arguments, 500)
        );
        self.note(
            session,
            "tool_invoked",
            json!({"tool": invocation.name, "call_id": invocation.id, "arguments": invocation.arguments}),
        );

        let (payload, ticket) = match ToolCall::parse(invocation) {
            Ok(ToolCall::RunQuery(args)) => (query_payload(self.query_database(&args.query)), None),
            Ok(ToolCall::OpenTicket(args)) => {
                let outcome = self.create_support_ticket(&TicketRequest::from(args));
                (json!(outcome), Some(outcome))
            }
            Err(err) => {
                warn!("Refusing tool call {}: {err}", invocation.id);
                (json!({"success": false, "error": err.to_string()}), None)
            }
        };

        self.note(
            session,
            "tool_result",
            json!({
                "tool": invocation.name,
                "call_id": invocation.id,
                "success": payload.get("success").and_then(Value::as_bool).unwrap_or(false),
            }),
        );
        (payload, ticket)
    }

    /// Gate first, then the store. Rejections and store errors both come back
    /// as failure results.
    pub fn query_database(&self, query: &str) -> QueryResult {
        info!("Received query: {query}");
        let verdict = gate::check(query);
        if !verdict.allowed {
            let reason = verdict.reason.unwrap_or_default();
            warn!("Blocked unsafe query: {query}");
            return QueryResult::failure(reason);
        }

        match self.store.execute(query) {
            Ok(rows) => {
                info!("Query executed successfully, returned {} rows", rows.len());
                QueryResult::rows(rows)
            }
            Err(err) => {
                let detail = error_chain_text(&err, 400);
                error!("Query execution error: {detail}");
                QueryResult::failure(detail)
            }
        }
    }

    pub fn create_support_ticket(&self, request: &TicketRequest) -> TicketOutcome {
        info!("Creating support ticket: {}", request.title);
        match self.tracker.open(request) {
            Ok(outcome) => outcome,
            Err(err) => {
                let detail = error_chain_text(&err, 400);
                error!("Error creating support ticket via {}: {detail}", self.tracker.name());
                TicketOutcome::failed(detail)
            }
        }
    }

    fn open_direct_ticket(&self, session: &ChatSession, utterance: &str) -> TicketOutcome {
        let request = direct_ticket(utterance);
        info!("Opening ticket directly from the request: {}", request.title);
        let outcome = self.create_support_ticket(&request);
        self.note(
            session,
            "ticket_direct",
            json!({"title": request.title, "success": outcome.success, "evidence": outcome.evidence()}),
        );
        outcome
    }

    fn finish(&self, session: &mut ChatSession, reply: String, tool_calls: usize) -> String {
        session.conversation.push(Turn::assistant(reply.clone()));
        self.note(
            session,
            "turn_finished",
            json!({"tool_calls": tool_calls, "history_len": session.conversation.len()}),
        );
        reply
    }

    fn note(&self, session: &ChatSession, event_type: &str, payload: Value) {
        if let Err(err) = self.log.record(event_type, with_session(payload, session.id())) {
            warn!("activity log write failed: {err:#}");
        }
    }
}

fn with_system(prompt: &str, conversation: &Conversation) -> Vec<Turn> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(Turn::system(prompt));
    messages.extend(conversation.turns().iter().cloned());
    messages
}

fn query_payload(result: QueryResult) -> Value {
    let mut payload = json!(result);
    if let Some(rows) = payload.get_mut("data").and_then(Value::as_array_mut) {
        if rows.len() > MAX_ROWS_FOR_MODEL {
            rows.truncate(MAX_ROWS_FOR_MODEL);
            payload["truncated"] = Value::Bool(true);
        }
    }
    payload
}

fn with_session(payload: Value, session_id: &str) -> Value {
    match payload {
        Value::Object(mut fields) => {
            fields
                .entry("chat_session")
                .or_insert_with(|| Value::String(session_id.to_string()));
            Value::Object(fields)
        }
        other => other,
    }
}
