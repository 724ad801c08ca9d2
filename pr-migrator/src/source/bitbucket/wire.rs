//! Bitbucket Cloud REST 2.0 response shapes and their conversion into the
//! platform-neutral models.

use crate::models::{
    ApprovalState, ClosureMetadata, Comment, ForkOrigin, InlineAnchor, LifecycleState,
    PullRequest, Reviewer, TaskStatus,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

/// Task ids live in their own id space; they are offset so they never
/// collide with comment ids once merged into one stream.
pub(super) const TASK_ID_BASE: u64 = 1 << 40;

/// One page of a paginated collection.
#[derive(Debug, Deserialize)]
pub(super) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct User {
    pub nickname: Option<String>,
    pub display_name: Option<String>,
    pub account_id: Option<String>,
}

impl User {
    /// Identity used for mapping: nickname, then display name, then account id.
    pub fn identity(&self) -> String {
        [&self.nickname, &self.display_name, &self.account_id]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .unwrap_or("unknown")
            .to_string()
    }

    /// Account id, when the source sent a non-empty one.
    pub fn account(&self) -> Option<String> {
        self.account_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct Named {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct Hash {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RepositoryRef {
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Endpoint {
    pub branch: Named,
    pub repository: Option<RepositoryRef>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Link {
    pub href: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Links {
    pub html: Option<Link>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Participant {
    pub role: Option<String>,
    #[serde(default)]
    pub approved: bool,
    pub state: Option<String>,
    #[serde(default)]
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub(super) struct WirePullRequest {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: User,
    pub state: String,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub created_on: DateTime<Utc>,
    pub updated_on: Option<DateTime<Utc>>,
    pub closed_on: Option<DateTime<Utc>>,
    pub merge_commit: Option<Hash>,
    pub reason: Option<String>,
    pub closed_by: Option<User>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub links: Links,
}

impl WirePullRequest {
    /// Converts into the neutral model. Unknown states map to merged when a
    /// merge commit exists and to declined otherwise.
    pub fn into_model(self) -> PullRequest {
        let merge_commit = self.merge_commit.map(|commit| commit.hash);
        let state = parse_state(&self.state, self.id, merge_commit.is_some());
        let fork = fork_origin(&self.source, &self.destination);

        let closure = match (self.reason.filter(|r| !r.trim().is_empty()), self.closed_by) {
            (None, None) => None,
            (reason, closed_by) => Some(ClosureMetadata {
                reason,
                closed_by: closed_by.map(|user| user.identity()),
            }),
        };

        let reviewers = self
            .participants
            .iter()
            .filter(|p| matches!(p.role.as_deref(), Some("REVIEWER" | "PARTICIPANT")))
            .map(|p| Reviewer {
                identity: p.user.identity(),
                approval: if p.approved {
                    ApprovalState::Approved
                } else if p.state.as_deref() == Some("changes_requested") {
                    ApprovalState::ChangesRequested
                } else {
                    ApprovalState::NoReview
                },
            })
            .collect();

        PullRequest {
            id: self.id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            author: self.author.identity(),
            source_branch: self.source.branch.name,
            destination_branch: self.destination.branch.name,
            state,
            created_date: self.created_on,
            updated_date: self.updated_on,
            closed_date: self.closed_on,
            merge_commit,
            closure,
            fork,
            web_url: self.links.html.map(|link| link.href),
            comments: Vec::new(),
            reviewers,
            commits: Vec::new(),
        }
    }
}

fn parse_state(raw: &str, id: u64, has_merge_commit: bool) -> LifecycleState {
    match raw.to_ascii_uppercase().as_str() {
        "OPEN" => LifecycleState::Open,
        "MERGED" => LifecycleState::Merged,
        "DECLINED" => LifecycleState::Declined,
        "SUPERSEDED" => LifecycleState::Superseded,
        other => {
            let fallback = if has_merge_commit {
                LifecycleState::Merged
            } else {
                LifecycleState::Declined
            };
            warn!(pr_id = id, state = other, fallback = %fallback, "Unknown pull request state");
            fallback
        }
    }
}

fn fork_origin(source: &Endpoint, destination: &Endpoint) -> Option<ForkOrigin> {
    let source_name = source.repository.as_ref()?.full_name.as_deref()?;
    let destination_name = destination.repository.as_ref()?.full_name.as_deref()?;

    if source_name.eq_ignore_ascii_case(destination_name) {
        return None;
    }

    let (owner, repository) = source_name.split_once('/')?;
    Some(ForkOrigin {
        owner: owner.to_string(),
        repository: repository.to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct Content {
    #[serde(default)]
    pub raw: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct IdRef {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct Inline {
    pub path: String,
    pub from: Option<u32>,
    pub to: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireComment {
    pub id: u64,
    #[serde(default)]
    pub user: User,
    pub content: Content,
    pub created_on: DateTime<Utc>,
    pub updated_on: Option<DateTime<Utc>>,
    pub parent: Option<IdRef>,
    pub inline: Option<Inline>,
    #[serde(default)]
    pub deleted: bool,
}

impl WireComment {
    pub fn into_model(self) -> Comment {
        Comment {
            id: self.id,
            author: self.user.identity(),
            author_account_id: self.user.account(),
            body: self.content.raw,
            created_date: self.created_on,
            updated_date: self.updated_on,
            parent_id: self.parent.map(|parent| parent.id),
            task: None,
            inline: self.inline.map(|inline| InlineAnchor {
                path: inline.path,
                from_line: inline.from,
                to_line: inline.to,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireTask {
    pub id: u64,
    pub content: Content,
    pub state: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub creator: User,
    pub comment: Option<IdRef>,
}

impl WireTask {
    /// Converts a task into a task comment attached to its comment, if any.
    pub fn into_model(self) -> Comment {
        Comment {
            id: TASK_ID_BASE + self.id,
            author: self.creator.identity(),
            author_account_id: self.creator.account(),
            body: self.content.raw,
            created_date: self.created_on,
            updated_date: self.updated_on,
            parent_id: self.comment.map(|comment| comment.id),
            task: Some(TaskStatus {
                resolved: self.state.eq_ignore_ascii_case("RESOLVED"),
            }),
            inline: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireCommit {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorDetail {
    pub message: Option<String>,
}

/// Extracts `error.message` from a Bitbucket error body.
pub(super) fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .and_then(|error| error.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(state: &str) -> serde_json::Value {
        json!({
            "id": 12,
            "title": "Add widgets",
            "description": "Adds widgets",
            "author": { "display_name": "Alice A", "nickname": "alice", "account_id": "557058:1" },
            "state": state,
            "source": {
                "branch": { "name": "feature/widgets" },
                "repository": { "full_name": "acme/widgets" },
                "commit": { "hash": "abc" }
            },
            "destination": {
                "branch": { "name": "main" },
                "repository": { "full_name": "acme/widgets" }
            },
            "created_on": "2024-01-02T03:04:05.000000+00:00",
            "updated_on": "2024-01-03T03:04:05.000000+00:00",
            "participants": [
                { "role": "REVIEWER", "approved": true, "user": { "nickname": "carol" } },
                { "role": "PARTICIPANT", "approved": false, "state": "changes_requested", "user": { "display_name": "Dave" } },
                { "role": "AUTHOR", "approved": false, "user": { "nickname": "alice" } }
            ],
            "links": { "html": { "href": "https://bitbucket.org/acme/widgets/pull-requests/12" } }
        })
    }

    #[test]
    fn converts_pull_request() {
        let pr: WirePullRequest = serde_json::from_value(wire("OPEN")).unwrap();
        let model = pr.into_model();

        assert_eq!(model.author, "alice");
        assert_eq!(model.state, LifecycleState::Open);
        assert_eq!(model.source_branch, "feature/widgets");
        assert!(model.fork.is_none());
        assert_eq!(model.reviewers.len(), 2);
        assert_eq!(model.reviewers[0].approval, ApprovalState::Approved);
        assert_eq!(model.reviewers[1].identity, "Dave");
        assert_eq!(model.reviewers[1].approval, ApprovalState::ChangesRequested);
        assert_eq!(
            model.web_url.as_deref(),
            Some("https://bitbucket.org/acme/widgets/pull-requests/12")
        );
    }

    #[test]
    fn detects_forks() {
        let mut value = wire("OPEN");
        value["source"]["repository"]["full_name"] = json!("mallory/widgets");

        let model = serde_json::from_value::<WirePullRequest>(value)
            .unwrap()
            .into_model();

        assert_eq!(model.fork.unwrap().to_string(), "mallory/widgets");
    }

    #[test]
    fn unknown_state_falls_back_on_merge_commit() {
        let mut value = wire("ARCHIVED");
        let declined = serde_json::from_value::<WirePullRequest>(value.clone())
            .unwrap()
            .into_model();
        assert_eq!(declined.state, LifecycleState::Declined);

        value["merge_commit"] = json!({ "hash": "def" });
        let merged = serde_json::from_value::<WirePullRequest>(value)
            .unwrap()
            .into_model();
        assert_eq!(merged.state, LifecycleState::Merged);
        assert_eq!(merged.merge_commit.as_deref(), Some("def"));
    }

    #[test]
    fn closure_reason_is_kept() {
        let mut value = wire("DECLINED");
        value["reason"] = json!("Superseded by #14");
        value["closed_by"] = json!({ "nickname": "bob" });

        let model = serde_json::from_value::<WirePullRequest>(value)
            .unwrap()
            .into_model();

        let closure = model.closure.unwrap();
        assert_eq!(closure.reason.as_deref(), Some("Superseded by #14"));
        assert_eq!(closure.closed_by.as_deref(), Some("bob"));
    }

    #[test]
    fn tasks_become_task_comments() {
        let task: WireTask = serde_json::from_value(json!({
            "id": 3,
            "content": { "raw": "Add tests" },
            "state": "RESOLVED",
            "created_on": "2024-01-02T03:04:05Z",
            "creator": { "nickname": "bob" },
            "comment": { "id": 99 }
        }))
        .unwrap();

        let comment = task.into_model();
        assert_eq!(comment.id, TASK_ID_BASE + 3);
        assert_eq!(comment.parent_id, Some(99));
        assert_eq!(comment.task, Some(TaskStatus { resolved: true }));
    }

    #[test]
    fn user_identity_priority() {
        let user = User {
            nickname: Some(" ".to_string()),
            display_name: Some("Jane Doe".to_string()),
            account_id: Some("557058:2".to_string()),
        };
        assert_eq!(user.identity(), "Jane Doe");
        assert_eq!(user.account().as_deref(), Some("557058:2"));
        assert_eq!(User::default().identity(), "unknown");
        assert_eq!(User::default().account(), None);
    }

    #[test]
    fn comments_keep_the_author_account() {
        let comment: WireComment = serde_json::from_value(json!({
            "id": 5,
            "user": { "nickname": "bob", "account_id": "557058:abc-1" },
            "content": { "raw": "hi @{557058:def-2}" },
            "created_on": "2024-01-02T03:04:05Z",
            "updated_on": null
        }))
        .unwrap();

        let comment = comment.into_model();
        assert_eq!(comment.author, "bob");
        assert_eq!(comment.author_account_id.as_deref(), Some("557058:abc-1"));
    }
}
