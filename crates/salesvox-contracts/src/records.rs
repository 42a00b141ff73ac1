use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One result row, columns in select-list order.
pub type Row = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data: Option<Vec<Row>>,
    #[serde(default)]
    pub row_count: usize,
}

impl QueryResult {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            success: true,
            error: None,
            row_count: rows.len(),
            data: Some(rows),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: None,
            row_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

pub const MOCK_TICKET_URL: &str = "https://github.com/example/issues/1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketOutcome {
    pub success: bool,
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TicketOutcome {
    pub fn created(url: impl Into<String>, issue_number: Option<u64>) -> Self {
        let url = url.into();
        Self {
            success: true,
            message: Some(format!("Support ticket created successfully: {url}")),
            url: Some(url),
            issue_number,
            error: None,
        }
    }

    /// Placeholder result used when no tracker credentials are configured.
    pub fn mock() -> Self {
        Self {
            success: true,
            url: Some(MOCK_TICKET_URL.to_string()),
            issue_number: None,
            message: Some(
                "Support ticket created (mock - configure GitHub credentials for real tickets)"
                    .to_string(),
            ),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            issue_number: None,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Text that must appear in any response reporting this outcome.
    pub fn evidence(&self) -> &str {
        if self.success {
            self.url.as_deref().unwrap_or_default()
        } else {
            self.error.as_deref().unwrap_or("unknown error")
        }
    }

    pub fn confirmation(&self) -> String {
        if self.success {
            format!(
                "I've created a support ticket for you: {}",
                self.url.as_deref().unwrap_or("(no link returned)")
            )
        } else {
            format!(
                "I wasn't able to create a support ticket: {}",
                self.evidence()
            )
        }
    }
}
