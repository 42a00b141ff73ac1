//! Callable tools offered to the completion model, and the typed argument
//! payloads they are validated into before anything runs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::chat::ToolInvocation;
use crate::errors::ToolArgumentError;
use crate::records::TicketRequest;

pub const RUN_QUERY_TOOL: &str = "query_database";
pub const OPEN_TICKET_TOOL: &str = "create_support_ticket";

/// JSON-schema described function, serialized in the chat-completions
/// `tools` shape by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub fn available_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: RUN_QUERY_TOOL.to_string(),
            description: "Execute a safe SELECT query on the sales database. Only SELECT queries are allowed. Returns query results as a list of rows.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "SQL SELECT query to execute. Must be a SELECT statement only."
                    }
                },
                "required": ["query"]
            }),
        },
        ToolSpec {
            name: OPEN_TICKET_TOOL.to_string(),
            description: "Create a support ticket in GitHub Issues when the user needs human assistance or encounters issues that cannot be resolved automatically.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Title of the support ticket"
                    },
                    "description": {
                        "type": "string",
                        "description": "Detailed description of the issue or question"
                    },
                    "labels": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Optional labels for categorizing the ticket (e.g., 'bug', 'question', 'feature-request')"
                    }
                },
                "required": ["title", "description"]
            }),
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunQueryArgs {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenTicketArgs {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

impl From<OpenTicketArgs> for TicketRequest {
    fn from(args: OpenTicketArgs) -> Self {
        TicketRequest {
            title: args.title.trim().to_string(),
            description: args.description,
            labels: args
                .labels
                .unwrap_or_default()
                .into_iter()
                .map(|label| label.trim().to_string())
                .filter(|label| !label.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    RunQuery(RunQueryArgs),
    OpenTicket(OpenTicketArgs),
}

impl ToolCall {
    /// Validates a raw invocation. Anything that does not fit the tool's
    /// schema is refused whole; no call runs on partial arguments.
    pub fn parse(invocation: &ToolInvocation) -> Result<Self, ToolArgumentError> {
        match invocation.name.as_str() {
            RUN_QUERY_TOOL => {
                let args: RunQueryArgs = decode_arguments(RUN_QUERY_TOOL, &invocation.arguments)?;
                require_text(RUN_QUERY_TOOL, "query", &args.query)?;
                Ok(ToolCall::RunQuery(args))
            }
            OPEN_TICKET_TOOL => {
                let args: OpenTicketArgs =
                    decode_arguments(OPEN_TICKET_TOOL, &invocation.arguments)?;
                require_text(OPEN_TICKET_TOOL, "title", &args.title)?;
                require_text(OPEN_TICKET_TOOL, "description", &args.description)?;
                Ok(ToolCall::OpenTicket(args))
            }
            other => Err(ToolArgumentError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::RunQuery(_) => RUN_QUERY_TOOL,
            ToolCall::OpenTicket(_) => OPEN_TICKET_TOOL,
        }
    }
}

fn decode_arguments<T: DeserializeOwned>(tool: &str, raw: &str) -> Result<T, ToolArgumentError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| ToolArgumentError::InvalidArguments {
            tool: tool.to_string(),
            reason: err.to_string(),
        })?;
    if !value.is_object() {
        return Err(ToolArgumentError::InvalidArguments {
            tool: tool.to_string(),
            reason: "arguments must be a JSON object".to_string(),
        });
    }
    serde_json::from_value(value).map_err(|err| ToolArgumentError::InvalidArguments {
        tool: tool.to_string(),
        reason: err.to_string(),
    })
}

fn require_text(tool: &str, field: &'static str, value: &str) -> Result<(), ToolArgumentError> {
    if value.trim().is_empty() {
        return Err(ToolArgumentError::EmptyField {
            tool: tool.to_string(),
            field,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::chat::ToolInvocation;
    use crate::errors::ToolArgumentError;
    use crate::records::TicketRequest;

    use super::{available_tools, ToolCall, OPEN_TICKET_TOOL, RUN_QUERY_TOOL};

    fn invocation(name: &str, arguments: &str) -> ToolInvocation {
        ToolInvocation {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn tool_specs_require_their_core_fields() {
        let tools = available_tools();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, RUN_QUERY_TOOL);
        assert_eq!(tools[0].parameters["required"][0], "query");
        assert_eq!(tools[1].name, OPEN_TICKET_TOOL);
        assert_eq!(
            tools[1].parameters["required"],
            serde_json::json!(["title", "description"])
        );
    }

    #[test]
    fn run_query_arguments_parse() {
        let call = ToolCall::parse(&invocation(
            RUN_QUERY_TOOL,
            r#"{"query": "SELECT COUNT(*) FROM sales"}"#,
        ));
        match call {
            Ok(ToolCall::RunQuery(args)) => assert_eq!(args.query, "SELECT COUNT(*) FROM sales"),
            other => panic!("unexpected parse result: {other:?}"),
        }
    }

    #[test]
    fn ticket_labels_are_optional_and_trimmed() {
        let call = ToolCall::parse(&invocation(
            OPEN_TICKET_TOOL,
            r#"{"title": " Export broken ", "description": "CSV export fails", "labels": [" bug ", ""]}"#,
        ));
        let Ok(ToolCall::OpenTicket(args)) = call else {
            panic!("expected ticket call");
        };
        let request = TicketRequest::from(args);
        assert_eq!(request.title, "Export broken");
        assert_eq!(request.labels, vec!["bug".to_string()]);

        let call = ToolCall::parse(&invocation(
            OPEN_TICKET_TOOL,
            r#"{"title": "Help", "description": "Need a hand", "labels": null}"#,
        ));
        assert!(matches!(call, Ok(ToolCall::OpenTicket(_))));
    }

    #[test]
    fn malformed_arguments_fail_closed() {
        let err = ToolCall::parse(&invocation(RUN_QUERY_TOOL, r#"{"query": "SELECT 1""#))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.starts_with("invalid arguments for query_database"), "{err}");

        assert!(matches!(
            ToolCall::parse(&invocation(RUN_QUERY_TOOL, r#"{"sql": "SELECT 1"}"#)),
            Err(ToolArgumentError::InvalidArguments { .. })
        ));
        assert!(matches!(
            ToolCall::parse(&invocation(RUN_QUERY_TOOL, r#"["SELECT 1"]"#)),
            Err(ToolArgumentError::InvalidArguments { .. })
        ));
        assert!(matches!(
            ToolCall::parse(&invocation(OPEN_TICKET_TOOL, r#"{"title": "x"}"#)),
            Err(ToolArgumentError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn blank_required_fields_are_rejected() {
        assert_eq!(
            ToolCall::parse(&invocation(RUN_QUERY_TOOL, r#"{"query": "  "}"#)),
            Err(ToolArgumentError::EmptyField {
                tool: RUN_QUERY_TOOL.to_string(),
                field: "query",
            })
        );
        assert!(matches!(
            ToolCall::parse(&invocation(
                OPEN_TICKET_TOOL,
                r#"{"title": "", "description": "x"}"#
            )),
            Err(ToolArgumentError::EmptyField { field: "title", .. })
        ));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        assert_eq!(
            ToolCall::parse(&invocation("drop_everything", "{}")),
            Err(ToolArgumentError::UnknownTool("drop_everything".to_string()))
        );
    }
}
