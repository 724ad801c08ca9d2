//! GitHub REST v3 response shapes.

use crate::models::{IssueRef, PullRequestRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(super) struct ApiRepository {
    pub full_name: String,
    pub permissions: Option<ApiPermissions>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiPermissions {
    #[serde(default)]
    pub push: bool,
}

/// Any object addressed by number: pull requests and issues alike.
#[derive(Debug, Deserialize)]
pub(super) struct ApiNumbered {
    pub number: u64,
    pub html_url: String,
}

impl From<ApiNumbered> for PullRequestRef {
    fn from(value: ApiNumbered) -> Self {
        Self {
            number: value.number,
            url: value.html_url,
        }
    }
}

impl From<ApiNumbered> for IssueRef {
    fn from(value: ApiNumbered) -> Self {
        Self {
            number: value.number,
            url: value.html_url,
        }
    }
}

/// Issue list entry. Pull requests appear in the list with a
/// `pull_request` key.
#[derive(Debug, Deserialize)]
pub(super) struct ApiIssue {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(super) struct NewPullRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct NewComment<'a> {
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct NewIssue<'a> {
    pub title: &'a str,
    pub body: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub labels: &'a [String],
}

#[derive(Debug, Serialize)]
pub(super) struct IssueUpdate<'a> {
    pub state: &'a str,
    pub state_reason: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewRequest<'a> {
    pub reviewers: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

/// Extracts the top-level message and any nested validation messages.
///
/// `{"message": "Validation Failed", "errors": [{"message": "A pull request
/// already exists for acme:feature."}]}` yields both sentences joined.
pub(super) fn extract_github_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;

    let details = parsed
        .errors
        .into_iter()
        .filter_map(|detail| detail.message.or(detail.code));

    let parts: Vec<String> = parsed.message.into_iter().chain(details).collect();
    (!parts.is_empty()).then(|| parts.join(": "))
}
