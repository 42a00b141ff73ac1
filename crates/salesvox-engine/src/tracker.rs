use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::{json, Value};
use tracing::{info, warn};

use salesvox_contracts::chat::DIRECT_TICKET_LABEL;
use salesvox_contracts::records::{TicketOutcome, TicketRequest};

use crate::config::{EngineConfig, GitHubConfig};
use crate::http::{build_client, response_json_or_error, send_with_retry};

const GITHUB_API_VERSION: &str = "2022-11-28";

pub trait IssueTracker: Send + Sync {
    fn name(&self) -> &str;
    fn open(&self, request: &TicketRequest) -> Result<TicketOutcome>;
}

/// Stand-in used when tracker credentials are absent. Always reports the
/// placeholder issue link.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockTracker;

impl IssueTracker for MockTracker {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&self, request: &TicketRequest) -> Result<TicketOutcome> {
        warn!(
            title = %request.title,
            "GitHub credentials not configured. Returning mock response."
        );
        Ok(TicketOutcome::mock())
    }
}

pub struct GitHubIssues {
    api_base: String,
    repo: GitHubConfig,
    http: HttpClient,
}

impl GitHubIssues {
    pub fn new(config: &EngineConfig, repo: GitHubConfig) -> Result<Self> {
        Ok(Self {
            api_base: config.github_api_base.clone(),
            repo,
            http: build_client(config.http_timeout)?,
        })
    }
}

impl IssueTracker for GitHubIssues {
    fn name(&self) -> &str {
        "github"
    }

    fn open(&self, request: &TicketRequest) -> Result<TicketOutcome> {
        let endpoint = format!(
            "{}/repos/{}/{}/issues",
            self.api_base, self.repo.owner, self.repo.repo
        );
        let payload = issue_payload(request);
        let response = send_with_retry("GitHub issues", || {
            Ok(self
                .http
                .post(&endpoint)
                .bearer_auth(&self.repo.token)
                .header(ACCEPT, "application/vnd.github+json")
                .header(USER_AGENT, "salesvox")
                .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
                .json(&payload))
        })?;
        let value = response_json_or_error("GitHub issues", response)?;
        let outcome = parse_issue(&value)?;
        info!(
            "Created GitHub issue #{}: {}",
            outcome.issue_number.unwrap_or_default(),
            outcome.evidence()
        );
        Ok(outcome)
    }
}

/// GitHub when all three credentials are configured, otherwise the mock.
pub fn tracker_from_config(config: &EngineConfig) -> Result<Box<dyn IssueTracker>> {
    match config.github.clone() {
        Some(repo) => Ok(Box::new(GitHubIssues::new(config, repo)?)),
        None => Ok(Box::new(MockTracker)),
    }
}

pub(crate) fn issue_payload(request: &TicketRequest) -> Value {
    let labels: Vec<&str> = if request.labels.is_empty() {
        vec![DIRECT_TICKET_LABEL]
    } else {
        request.labels.iter().map(String::as_str).collect()
    };
    json!({
        "title": request.title,
        "body": request.description,
        "labels": labels,
    })
}

pub(crate) fn parse_issue(value: &Value) -> Result<TicketOutcome> {
    let url = value
        .get("html_url")
        .and_then(Value::as_str)
        .context("GitHub issue response missing html_url")?;
    Ok(TicketOutcome::created(
        url,
        value.get("number").and_then(Value::as_u64),
    ))
}
