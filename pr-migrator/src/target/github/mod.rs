//! GitHub REST v3 adapter built on octocrab's raw request methods.

mod wire;

use super::{IssueCloseReason, TargetRepository};
use crate::error::RemoteError;
use crate::models::{IssueRef, PullRequestRef};
use crate::rate_limit::{retry_after, RateLimitInfo, RateLimitedExecutor};
use async_trait::async_trait;
use chrono::Utc;
use http::{HeaderMap, StatusCode, Uri};
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;
use wire::{
    extract_github_message, ApiIssue, ApiNumbered, ApiRepository, IssueUpdate,
    NewComment, NewIssue, NewPullRequest, ReviewRequest,
};

/// Issues fetched per page by the title lookup.
const ISSUE_PAGE_SIZE: usize = 100;

/// Raw response with the body already read.
#[derive(Debug)]
struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Reply {
    fn json<T: DeserializeOwned>(&self, operation: &str) -> Result<T, RemoteError> {
        serde_json::from_str(&self.body).map_err(|error| {
            RemoteError::fatal(operation, format!("unexpected response body: {error}"))
        })
    }

    /// Maps an unsuccessful reply onto [`RemoteError`]. A 403 or 429 whose
    /// message mentions the rate limit is transient.
    fn into_error(self, operation: &str, resource: &str) -> RemoteError {
        let message = extract_github_message(&self.body);
        let is_rate_limit_status = matches!(
            self.status,
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
        );
        let mentions_rate_limit = message
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains("rate limit"));

        if is_rate_limit_status && mentions_rate_limit {
            let wait = retry_after(&self.headers).or_else(|| {
                RateLimitInfo::from_headers(&self.headers).map(|info| info.until_reset(Utc::now()))
            });
            return RemoteError::Transient {
                operation: operation.to_string(),
                message: message.unwrap_or_else(|| "rate limit exceeded".to_string()),
                status: Some(self.status.as_u16()),
                retry_after: wait,
            };
        }

        RemoteError::from_status(operation, resource, self.status, &self.headers, message)
    }
}

enum Request<'a, B: Serialize> {
    Get,
    Post(&'a B),
    Patch(&'a B),
}

impl<B: Serialize> Clone for Request<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Serialize> Copy for Request<'_, B> {}

/// Target repository on GitHub or GitHub Enterprise.
///
/// Every call goes through the executor. Rate-limit headers of every reply
/// feed the executor's shared gate.
#[derive(Debug)]
pub struct GitHubTarget {
    client: Octocrab,
    owner: String,
    repository: String,
    executor: RateLimitedExecutor,
}

impl GitHubTarget {
    /// Creates an adapter for `owner/repository`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a fatal error when the API base is not a valid URI or the
    /// client cannot be built.
    pub fn new(
        api_base: &str,
        token: &str,
        owner: &str,
        repository: &str,
        executor: RateLimitedExecutor,
    ) -> Result<Self, RemoteError> {
        let base_uri: Uri = api_base
            .parse::<Uri>()
            .map_err(|error| RemoteError::fatal("build GitHub client", error.to_string()))?;

        // Retries are the executor's job.
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .add_retry_config(RetryConfig::None)
            .base_uri(base_uri)
            .map_err(|error| RemoteError::fatal("build GitHub client", error.to_string()))?
            .build()
            .map_err(|error| RemoteError::fatal("build GitHub client", error.to_string()))?;

        Ok(Self {
            client,
            owner: owner.to_string(),
            repository: repository.to_string(),
            executor,
        })
    }

    /// Path below the repository with every segment percent-encoded.
    fn repo_path(&self, segments: &[&str]) -> Result<String, RemoteError> {
        let mut all = vec!["repos", self.owner.as_str(), self.repository.as_str()];
        all.extend_from_slice(segments);
        api_path(&all)
    }

    /// Sends one request without retries.
    async fn send<B: Serialize>(
        &self,
        operation: &str,
        path: &str,
        request: Request<'_, B>,
    ) -> Result<Reply, RemoteError> {
        let response = match request {
            Request::Get => self.client._get(path).await,
            Request::Post(body) => self.client._post(path, Some(body)).await,
            Request::Patch(body) => self.client._patch(path, Some(body)).await,
        }
        .map_err(|error| map_octocrab_error(operation, &error))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = self
            .client
            .body_to_string(response)
            .await
            .map_err(|error| map_octocrab_error(operation, &error))?;

        if let Some(info) = RateLimitInfo::from_headers(&headers) {
            self.executor.gate().observe(&info);
        }

        debug!(operation, status = status.as_u16(), "GitHub replied");
        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    /// Retried GET; returns `None` for the statuses in `absent`.
    async fn probe(
        &self,
        operation: &str,
        resource: &str,
        path: &str,
        absent: &[StatusCode],
    ) -> Result<Option<Reply>, RemoteError> {
        self.executor
            .run(operation, || async {
                let reply = self.send::<()>(operation, path, Request::Get).await?;
                if reply.status.is_success() {
                    Ok(Some(reply))
                } else if absent.contains(&reply.status) {
                    Ok(None)
                } else {
                    Err(reply.into_error(operation, resource))
                }
            })
            .await
    }

    /// Retried request decoding a JSON reply.
    async fn call<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        operation: &str,
        resource: &str,
        path: &str,
        request: Request<'_, B>,
    ) -> Result<T, RemoteError> {
        self.executor
            .run(operation, || async {
                let reply = self.send(operation, path, request).await?;
                if reply.status.is_success() {
                    reply.json(operation)
                } else {
                    Err(reply.into_error(operation, resource))
                }
            })
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        operation: &str,
        resource: &str,
        path: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        self.call(operation, resource, path, Request::Post(body)).await
    }
}

#[async_trait]
impl TargetRepository for GitHubTarget {
    async fn verify_access(&self) -> Result<(), RemoteError> {
        let resource = format!("repository {}/{}", self.owner, self.repository);
        let path = self.repo_path(&[])?;
        let repository: ApiRepository = self
            .call::<_, ()>("verify target access", &resource, &path, Request::Get)
            .await?;

        if repository
            .permissions
            .as_ref()
            .is_some_and(|permissions| !permissions.push)
        {
            return Err(RemoteError::fatal(
                "verify target access",
                format!("token has no push access to {}", repository.full_name),
            ));
        }

        info!(repository = %repository.full_name, "Target repository reachable");
        Ok(())
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, RemoteError> {
        let mut segments = vec!["git", "ref", "heads"];
        segments.extend(branch.split('/'));
        let path = self.repo_path(&segments)?;
        let reply = self
            .probe(
                "check branch",
                &format!("branch {branch}"),
                &path,
                &[StatusCode::NOT_FOUND],
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn commit_exists(&self, sha: &str) -> Result<bool, RemoteError> {
        let path = self.repo_path(&["commits", sha])?;
        let reply = self
            .probe(
                "check commit",
                &format!("commit {sha}"),
                &path,
                &[StatusCode::NOT_FOUND, StatusCode::UNPROCESSABLE_ENTITY],
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn find_existing_pull_request(
        &self,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequestRef>, RemoteError> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("state", "all")
            .append_pair("head", &format!("{}:{head}", self.owner))
            .append_pair("base", base)
            .append_pair("per_page", "1")
            .finish();
        let path = format!("{}?{query}", self.repo_path(&["pulls"])?);

        let found: Vec<ApiNumbered> = self
            .call::<_, ()>(
                "find pull request",
                &format!("pull requests {head} -> {base}"),
                &path,
                Request::Get,
            )
            .await?;
        Ok(found.into_iter().next().map(PullRequestRef::from))
    }

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestRef, RemoteError> {
        let created: ApiNumbered = self
            .post(
                "create pull request",
                &format!("pull request {head} -> {base}"),
                &self.repo_path(&["pulls"])?,
                &NewPullRequest {
                    title,
                    body,
                    head,
                    base,
                },
            )
            .await?;

        info!(number = created.number, head, base, "Created pull request");
        Ok(created.into())
    }

    async fn add_comment(
        &self,
        pr: &PullRequestRef,
        author_label: &str,
        body: &str,
    ) -> Result<(), RemoteError> {
        let number = pr.number.to_string();
        let _: serde_json::Value = self
            .post(
                "add comment",
                &format!("pull request #{}", pr.number),
                &self.repo_path(&["issues", number.as_str(), "comments"])?,
                &NewComment { body },
            )
            .await?;

        debug!(number = pr.number, author = author_label, "Added comment");
        Ok(())
    }

    async fn is_collaborator(&self, login: &str) -> Result<bool, RemoteError> {
        let path = self.repo_path(&["collaborators", login])?;
        let reply = self
            .probe(
                "check collaborator",
                &format!("collaborator {login}"),
                &path,
                &[StatusCode::NOT_FOUND],
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn request_reviewers(
        &self,
        pr: &PullRequestRef,
        logins: &[String],
    ) -> Result<Vec<String>, RemoteError> {
        let mut accepted = Vec::with_capacity(logins.len());
        for login in logins {
            if self.is_collaborator(login).await? {
                accepted.push(login.clone());
            } else {
                warn!(login = %login, "Reviewer is not a collaborator on the target");
            }
        }

        if accepted.is_empty() {
            return Ok(accepted);
        }

        let number = pr.number.to_string();
        let _: serde_json::Value = self
            .post(
                "request reviewers",
                &format!("pull request #{}", pr.number),
                &self.repo_path(&["pulls", number.as_str(), "requested_reviewers"])?,
                &ReviewRequest {
                    reviewers: &accepted,
                },
            )
            .await?;

        Ok(accepted)
    }

    /// Walks the issue list newest first. The list includes issues created
    /// moments earlier, which the search index can still miss.
    async fn find_existing_issue(&self, title: &str) -> Result<Option<IssueRef>, RemoteError> {
        let base = self.repo_path(&["issues"])?;
        let resource = format!("issue \"{title}\"");

        for page in 1.. {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("state", "all")
                .append_pair("sort", "created")
                .append_pair("direction", "desc")
                .append_pair("per_page", &ISSUE_PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string())
                .finish();
            let path = format!("{base}?{query}");

            let issues: Vec<ApiIssue> = self
                .call::<_, ()>("find issue", &resource, &path, Request::Get)
                .await?;
            let exhausted = issues.len() < ISSUE_PAGE_SIZE;

            let found = issues
                .into_iter()
                .filter(|issue| issue.pull_request.is_none())
                .find(|issue| issue.title == title);
            if let Some(issue) = found {
                return Ok(Some(IssueRef {
                    number: issue.number,
                    url: issue.html_url,
                }));
            }
            if exhausted {
                break;
            }
        }
        Ok(None)
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<IssueRef, RemoteError> {
        let created: ApiNumbered = self
            .post(
                "create issue",
                &format!("issue \"{title}\""),
                &self.repo_path(&["issues"])?,
                &NewIssue {
                    title,
                    body,
                    labels,
                },
            )
            .await?;

        info!(number = created.number, "Created issue");
        Ok(created.into())
    }

    async fn add_issue_comment(&self, issue: &IssueRef, body: &str) -> Result<(), RemoteError> {
        let number = issue.number.to_string();
        let _: serde_json::Value = self
            .post(
                "add issue comment",
                &format!("issue #{}", issue.number),
                &self.repo_path(&["issues", number.as_str(), "comments"])?,
                &NewComment { body },
            )
            .await?;
        Ok(())
    }

    async fn close_issue(
        &self,
        issue: &IssueRef,
        reason: IssueCloseReason,
    ) -> Result<(), RemoteError> {
        let number = issue.number.to_string();
        let update = IssueUpdate {
            state: "closed",
            state_reason: reason.as_str(),
        };
        let _: serde_json::Value = self
            .call(
                "close issue",
                &format!("issue #{}", issue.number),
                &self.repo_path(&["issues", number.as_str()])?,
                Request::Patch(&update),
            )
            .await?;
        Ok(())
    }
}

/// Joins `segments` into an absolute, percent-encoded API path.
fn api_path(segments: &[&str]) -> Result<String, RemoteError> {
    let invalid = |reason: String| RemoteError::fatal("build request path", reason);

    // Only the encoded path of this placeholder base is kept.
    let mut url = Url::parse("https://api.invalid/").map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("base cannot hold a path".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.path().to_string())
}

fn map_octocrab_error(operation: &str, error: &octocrab::Error) -> RemoteError {
    let is_network_error = matches!(
        error,
        octocrab::Error::Http { .. }
            | octocrab::Error::Hyper { .. }
            | octocrab::Error::Service { .. }
    );

    if is_network_error {
        RemoteError::transient(operation, error.to_string())
    } else {
        RemoteError::fatal(operation, error.to_string())
    }
}
