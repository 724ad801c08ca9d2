//! Bitbucket Cloud REST 2.0 adapter.

mod auth;
mod wire;

pub use auth::BitbucketAuth;

use super::SourceRepository;
use crate::error::RemoteError;
use crate::models::{Comment, PullRequest};
use crate::rate_limit::{RateLimitInfo, RateLimitedExecutor};
use async_trait::async_trait;
use auth::Authenticator;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use wire::{error_message, Page, WireComment, WireCommit, WirePullRequest, WireTask};

/// States requested when enumerating pull requests.
const LISTED_STATES: [&str; 4] = ["OPEN", "MERGED", "DECLINED", "SUPERSEDED"];

/// Fields added to the default pull request list representation.
const EXTRA_FIELDS: &str = "+values.participants,+values.reason,+values.closed_by";

const PAGE_LENGTH: &str = "50";

/// Read-only Bitbucket repository accessor.
///
/// Every request goes through the executor, so page fetches and point
/// lookups are retried individually and share one rate-limit gate.
#[derive(Debug)]
pub struct BitbucketSource {
    client: Client,
    api_base: String,
    workspace: String,
    repository: String,
    auth: Authenticator,
    executor: RateLimitedExecutor,
}

impl BitbucketSource {
    /// Creates an adapter for `workspace/repository`.
    ///
    /// # Errors
    ///
    /// Returns a fatal error if the HTTP client cannot be built.
    pub fn new(
        api_base: &str,
        workspace: &str,
        repository: &str,
        auth: BitbucketAuth,
        executor: RateLimitedExecutor,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(concat!("pr-migrator/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RemoteError::fatal("build Bitbucket client", e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            workspace: workspace.to_string(),
            repository: repository.to_string(),
            auth: Authenticator::new(auth),
            executor,
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repositories/{}/{}{}",
            self.api_base, self.workspace, self.repository, path
        )
    }

    fn pull_requests_url(&self) -> Result<String, RemoteError> {
        let mut url = Url::parse(&self.repo_url("/pullrequests"))
            .map_err(|e| RemoteError::fatal("list pull requests", e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            for state in LISTED_STATES {
                query.append_pair("state", state);
            }
            query.append_pair("fields", EXTRA_FIELDS);
            query.append_pair("pagelen", PAGE_LENGTH);
        }
        Ok(url.into())
    }

    /// Single GET without retries.
    async fn get(&self, operation: &str, url: &str) -> Result<Response, RemoteError> {
        let token = self.auth.bearer(&self.client).await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        if let Some(info) = RateLimitInfo::from_headers(response.headers()) {
            self.executor.gate().observe(&info);
        }

        Ok(response)
    }

    /// Retried GET decoding a JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        resource: &str,
        url: &str,
    ) -> Result<T, RemoteError> {
        self.executor
            .run(operation, || async {
                let response = self.get(operation, url).await?;
                handle_response(operation, resource, response).await
            })
            .await
    }

    /// Follows `next` links until the collection is exhausted.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        operation: &str,
        resource: &str,
        first: String,
    ) -> Result<Vec<T>, RemoteError> {
        let mut all = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: Page<T> = self.get_json(operation, resource, &url).await?;
            all.extend(page.values);
            next = page.next;
        }

        Ok(all)
    }
}

#[async_trait]
impl SourceRepository for BitbucketSource {
    async fn verify_access(&self) -> Result<(), RemoteError> {
        let resource = format!("repository {}/{}", self.workspace, self.repository);
        let _: serde_json::Value = self
            .get_json("verify source access", &resource, &self.repo_url(""))
            .await?;

        info!(
            workspace = %self.workspace,
            repository = %self.repository,
            "Source repository reachable"
        );
        Ok(())
    }

    fn list_pull_requests(&self) -> BoxStream<'_, Result<PullRequest, RemoteError>> {
        let first = match self.pull_requests_url() {
            Ok(url) => url,
            Err(error) => return stream::once(async { Err(error) }).boxed(),
        };

        stream::try_unfold(Some(first), move |next| async move {
            let Some(url) = next else {
                return Ok(None);
            };

            debug!(url = %url, "Fetching pull request page");
            let page: Page<WirePullRequest> = self
                .get_json("list pull requests", "pull request list", &url)
                .await?;
            Ok::<_, RemoteError>(Some((page.values, page.next)))
        })
        .map_ok(|values| stream::iter(values.into_iter().map(Ok)))
        .try_flatten()
        .map_ok(WirePullRequest::into_model)
        .boxed()
    }

    async fn list_comments(&self, pr_id: u64) -> Result<Vec<Comment>, RemoteError> {
        let resource = format!("pull request #{pr_id}");

        let comments: Vec<WireComment> = self
            .get_all_pages(
                "list comments",
                &resource,
                self.repo_url(&format!("/pullrequests/{pr_id}/comments?pagelen=100")),
            )
            .await?;

        let tasks: Vec<WireTask> = match self
            .get_all_pages(
                "list tasks",
                &resource,
                self.repo_url(&format!("/pullrequests/{pr_id}/tasks?pagelen=100")),
            )
            .await
        {
            Ok(tasks) => tasks,
            Err(RemoteError::NotFound { .. }) => Vec::new(),
            Err(error) => return Err(error),
        };

        let mut merged: Vec<Comment> = comments
            .into_iter()
            .filter(|comment| !comment.deleted)
            .map(WireComment::into_model)
            .chain(tasks.into_iter().map(WireTask::into_model))
            .collect();
        merged.sort_by_key(|comment| (comment.created_date, comment.id));

        debug!(pr_id, count = merged.len(), "Fetched comments");
        Ok(merged)
    }

    async fn list_commits(&self, pr_id: u64) -> Result<Vec<String>, RemoteError> {
        let result: Result<Vec<WireCommit>, RemoteError> = self
            .get_all_pages(
                "list commits",
                &format!("pull request #{pr_id}"),
                self.repo_url(&format!("/pullrequests/{pr_id}/commits?pagelen=100")),
            )
            .await;

        // The commits endpoint reports newest first and 404s once the
        // source branch is gone.
        match result {
            Ok(commits) => Ok(commits.into_iter().rev().map(|c| c.hash).collect()),
            Err(RemoteError::NotFound { .. }) => Ok(Vec::new()),
            Err(error) => Err(error),
        }
    }

    async fn commit_exists(&self, hash: &str) -> Result<bool, RemoteError> {
        let url = self.repo_url(&format!("/commit/{hash}"));
        let result: Result<serde_json::Value, RemoteError> = self
            .get_json("look up source commit", &format!("commit {hash}"), &url)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(RemoteError::NotFound { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn pull_request_url(&self, pr_id: u64) -> String {
        format!(
            "https://bitbucket.org/{}/{}/pull-requests/{pr_id}",
            self.workspace, self.repository
        )
    }
}

/// Decodes a successful response or maps the failure onto [`RemoteError`].
async fn handle_response<T: DeserializeOwned>(
    operation: &str,
    resource: &str,
    response: Response,
) -> Result<T, RemoteError> {
    let status = response.status();

    if status.is_success() {
        return response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                RemoteError::fatal(operation, format!("unexpected response body: {e}"))
            } else {
                transport_error(operation, e)
            }
        });
    }

    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).or_else(|| {
        (status == StatusCode::UNAUTHORIZED)
            .then(|| "Bitbucket credentials rejected".to_string())
    });

    Err(RemoteError::from_status(
        operation, resource, status, &headers, message,
    ))
}

/// Network-level failures are transient; anything else reqwest reports is not.
pub(super) fn transport_error(operation: &str, error: reqwest::Error) -> RemoteError {
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        RemoteError::transient(operation, error.to_string())
    } else {
        RemoteError::fatal(operation, error.to_string())
    }
}
