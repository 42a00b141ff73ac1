use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use tracing::debug;

use salesvox_contracts::chat::{Role, ToolInvocation, Turn};
use salesvox_contracts::tools::ToolSpec;

use crate::config::EngineConfig;
use crate::http::{build_client, response_json_or_error, send_with_retry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call any of the offered tools.
    Auto,
    /// The model must call the named tool.
    Forced(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = choice;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: Option<String>,
    pub invocations: Vec<ToolInvocation>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            invocations: Vec::new(),
        }
    }

    pub fn calling(content: Option<String>, invocations: Vec<ToolInvocation>) -> Self {
        Self {
            content,
            invocations,
        }
    }

    /// Content with surrounding whitespace removed, if any remains.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;
    fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

pub struct OpenAiChat {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl OpenAiChat {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            api_base: config.openai_api_base.clone(),
            api_key: config.require_openai_key()?.to_string(),
            http: build_client(config.http_timeout)?,
        })
    }
}

impl CompletionProvider for OpenAiChat {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let endpoint = format!("{}/chat/completions", self.api_base);
        let payload = chat_payload(request);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "chat completion request"
        );
        let response = send_with_retry("OpenAI chat", || {
            Ok(self
                .http
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&payload))
        })?;
        let value = response_json_or_error("OpenAI chat", response)?;
        parse_completion(&value)
    }
}

pub(crate) fn chat_payload(request: &CompletionRequest) -> Value {
    let mut payload = Map::new();
    payload.insert("model".to_string(), Value::String(request.model.clone()));
    payload.insert(
        "messages".to_string(),
        Value::Array(request.messages.iter().map(turn_message).collect()),
    );
    if !request.tools.is_empty() {
        let tools = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();
        payload.insert("tools".to_string(), Value::Array(tools));
        let choice = match &request.tool_choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::Forced(name) => json!({"type": "function", "function": {"name": name}}),
        };
        payload.insert("tool_choice".to_string(), choice);
    }
    if let Some(temperature) = request.temperature {
        payload.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = request.max_tokens {
        payload.insert("max_tokens".to_string(), json!(max_tokens));
    }
    Value::Object(payload)
}

fn turn_message(turn: &Turn) -> Value {
    let content = turn
        .content
        .as_ref()
        .map(|text| Value::String(text.clone()))
        .unwrap_or(Value::Null);
    match (turn.role, turn.invocation.as_ref(), turn.tool_call_id.as_ref()) {
        (Role::Assistant, Some(invocation), _) => json!({
            "role": "assistant",
            "content": content,
            "tool_calls": [{
                "id": invocation.id,
                "type": "function",
                "function": {
                    "name": invocation.name,
                    "arguments": invocation.arguments,
                }
            }]
        }),
        (Role::Tool, _, Some(call_id)) => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": content,
        }),
        (role, _, _) => json!({"role": role.as_str(), "content": content}),
    }
}

pub(crate) fn parse_completion(value: &Value) -> Result<Completion> {
    let message = value
        .pointer("/choices/0/message")
        .context("OpenAI chat response had no choices")?;
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut invocations = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .context("tool call missing id")?;
            let Some(function) = call.get("function") else {
                bail!("tool call {id} missing function");
            };
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .with_context(|| format!("tool call {id} missing function name"))?;
            // Arguments stay raw; validation happens at dispatch.
            let arguments = match function.get("arguments") {
                Some(Value::String(raw)) => raw.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            invocations.push(ToolInvocation {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            });
        }
    }

    Ok(Completion {
        content,
        invocations,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use salesvox_contracts::chat::{ToolInvocation, Turn};
    use salesvox_contracts::tools::{available_tools, OPEN_TICKET_TOOL};

    use super::{chat_payload, parse_completion, CompletionRequest, ToolChoice};

    #[test]
    fn payload_maps_turns_to_chat_messages() {
        let invocation = ToolInvocation {
            id: "call_7".to_string(),
            name: "query_database".to_string(),
            arguments: "{\"query\":\"SELECT 1\"}".to_string(),
        };
        let request = CompletionRequest::new(
            "gpt-4",
            vec![
                Turn::system("be brief"),
                Turn::user("how many sales?"),
                Turn::assistant_invocation(None, invocation),
                Turn::tool_result("call_7", "{\"success\":true}"),
            ],
        );
        let payload = chat_payload(&request);

        assert_eq!(payload["model"], json!("gpt-4"));
        assert!(payload.get("tools").is_none());
        assert!(payload.get("tool_choice").is_none());
        let messages = payload["messages"].as_array().cloned().unwrap_or_default();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1], json!({"role": "user", "content": "how many sales?"}));
        assert_eq!(messages[2]["content"], json!(null));
        assert_eq!(messages[2]["tool_calls"][0]["id"], json!("call_7"));
        assert_eq!(
            messages[2]["tool_calls"][0]["function"]["arguments"],
            json!("{\"query\":\"SELECT 1\"}")
        );
        assert_eq!(messages[3]["role"], json!("tool"));
        assert_eq!(messages[3]["tool_call_id"], json!("call_7"));
    }

    #[test]
    fn forced_tool_choice_names_the_function() {
        let request = CompletionRequest::new("gpt-4", vec![Turn::user("open a ticket")])
            .with_tools(
                available_tools(),
                ToolChoice::Forced(OPEN_TICKET_TOOL.to_string()),
            )
            .with_temperature(0.7)
            .with_max_tokens(200);
        let payload = chat_payload(&request);

        assert_eq!(payload["tools"].as_array().map(Vec::len), Some(2));
        assert_eq!(payload["tools"][0]["type"], json!("function"));
        assert_eq!(
            payload["tool_choice"],
            json!({"type": "function", "function": {"name": "create_support_ticket"}})
        );
        assert_eq!(payload["max_tokens"], json!(200));
        assert!(payload["temperature"].as_f64().is_some());
    }

    #[test]
    fn parses_text_and_tool_calls() -> anyhow::Result<()> {
        let value = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "query_database", "arguments": "{\"query\":\"SELECT 1\"}"}
                    }]
                }
            }]
        });
        let completion = parse_completion(&value)?;
        assert_eq!(completion.content, None);
        assert_eq!(completion.invocations.len(), 1);
        assert_eq!(completion.invocations[0].name, "query_database");
        assert_eq!(completion.invocations[0].arguments, "{\"query\":\"SELECT 1\"}");

        let plain = parse_completion(&json!({
            "choices": [{"message": {"role": "assistant", "content": "  Total is 42.  "}}]
        }))?;
        assert_eq!(plain.trimmed_text(), Some("Total is 42."));
        assert!(plain.invocations.is_empty());
        Ok(())
    }

    #[test]
    fn missing_choices_is_an_error() {
        assert!(parse_completion(&json!({"choices": []})).is_err());
        assert!(parse_completion(&json!({"error": "nope"})).is_err());
    }
}
