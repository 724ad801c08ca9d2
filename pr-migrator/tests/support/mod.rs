//! In-memory repositories for orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use pr_migrator::error::RemoteError;
use pr_migrator::models::{Comment, IssueRef, LifecycleState, PullRequest, PullRequestRef};
use pr_migrator::rate_limit::RateLimitedExecutor;
use pr_migrator::{IssueCloseReason, SourceRepository, TargetRepository};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap()
}

pub fn pull_request(id: u64, state: LifecycleState) -> PullRequest {
    PullRequest {
        id,
        title: format!("Change {id}"),
        description: format!("Description of change {id}"),
        author: "alice".to_string(),
        source_branch: format!("feature/{id}"),
        destination_branch: "main".to_string(),
        state,
        created_date: at(0),
        updated_date: None,
        closed_date: state.is_closed().then(|| at(30)),
        merge_commit: (state == LifecycleState::Merged).then(|| format!("merge{id}")),
        closure: None,
        fork: None,
        web_url: None,
        comments: Vec::new(),
        reviewers: Vec::new(),
        commits: Vec::new(),
    }
}

pub fn comment(id: u64, author: &str, minute: u32, body: &str) -> Comment {
    Comment {
        id,
        author: author.to_string(),
        author_account_id: None,
        body: body.to_string(),
        created_date: at(minute),
        updated_date: None,
        parent_id: None,
        task: None,
        inline: None,
    }
}

/// Reply to comment `parent`.
pub fn reply(id: u64, parent: u64, author: &str, minute: u32, body: &str) -> Comment {
    Comment {
        parent_id: Some(parent),
        ..comment(id, author, minute, body)
    }
}

/// Source serving a fixed set of pull requests.
#[derive(Default)]
pub struct FakeSource {
    pull_requests: Vec<PullRequest>,
    comments: HashMap<u64, Vec<Comment>>,
    commits: HashMap<u64, Vec<String>>,
    fail_after: Option<usize>,
    vanished: HashSet<u64>,
    enumerated: AtomicU32,
}

impl FakeSource {
    pub fn new(pull_requests: Vec<PullRequest>) -> Self {
        Self {
            pull_requests,
            ..Self::default()
        }
    }

    pub fn with_comments(mut self, pr_id: u64, comments: Vec<Comment>) -> Self {
        self.comments.insert(pr_id, comments);
        self
    }

    pub fn with_commits(mut self, pr_id: u64, commits: &[&str]) -> Self {
        self.commits
            .insert(pr_id, commits.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Enumeration fails after yielding `count` pull requests.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// The pull request is enumerated but its details answer 404.
    pub fn vanished(mut self, pr_id: u64) -> Self {
        self.vanished.insert(pr_id);
        self
    }

    /// Pull requests handed out by the enumeration stream.
    pub fn enumerated(&self) -> u32 {
        self.enumerated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceRepository for FakeSource {
    async fn verify_access(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    fn list_pull_requests(&self) -> BoxStream<'_, Result<PullRequest, RemoteError>> {
        let limit = self.fail_after.unwrap_or(self.pull_requests.len());
        let records = stream::iter(self.pull_requests.iter().take(limit).cloned()).map(|pr| {
            self.enumerated.fetch_add(1, Ordering::SeqCst);
            Ok(pr)
        });

        match self.fail_after {
            Some(_) => records
                .chain(stream::once(async {
                    Err(RemoteError::transient("list pull requests", "connection reset"))
                }))
                .boxed(),
            None => records.boxed(),
        }
    }

    async fn list_comments(&self, pr_id: u64) -> Result<Vec<Comment>, RemoteError> {
        if self.vanished.contains(&pr_id) {
            return Err(RemoteError::NotFound {
                resource: format!("pull request #{pr_id}"),
            });
        }
        Ok(self.comments.get(&pr_id).cloned().unwrap_or_default())
    }

    async fn list_commits(&self, pr_id: u64) -> Result<Vec<String>, RemoteError> {
        Ok(self.commits.get(&pr_id).cloned().unwrap_or_default())
    }

    async fn commit_exists(&self, hash: &str) -> Result<bool, RemoteError> {
        Ok(self.commits.values().flatten().any(|c| c == hash))
    }

    fn pull_request_url(&self, pr_id: u64) -> String {
        format!("https://bitbucket.org/acme/widgets/pull-requests/{pr_id}")
    }
}

#[derive(Debug, Clone)]
pub struct CreatedPr {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

#[derive(Debug, Clone)]
pub struct PostedComment {
    pub number: u64,
    pub author_label: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct CreatedIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub comments: Vec<String>,
    pub closed: Option<IssueCloseReason>,
}

#[derive(Debug, Default)]
pub struct TargetState {
    pub branches: HashSet<String>,
    pub commits: HashSet<String>,
    pub collaborators: HashSet<String>,
    pub pull_requests: Vec<CreatedPr>,
    pub comments: Vec<PostedComment>,
    pub issues: Vec<CreatedIssue>,
    pub reviewer_requests: Vec<(u64, Vec<String>)>,
    next_number: u64,
}

impl TargetState {
    fn next_number(&mut self) -> u64 {
        self.next_number += 1;
        self.next_number
    }
}

/// Target keeping everything in memory and counting mutating calls.
pub struct FakeTarget {
    pub state: Mutex<TargetState>,
    mutations: AtomicU32,
    create_attempts: AtomicU32,
    rate_limited_creates: AtomicU32,
    hidden_lookups: AtomicU32,
    failing_closes: AtomicU32,
    executor: Option<RateLimitedExecutor>,
}

impl FakeTarget {
    /// Target where `branches` exist and no commit resolves.
    pub fn with_branches(branches: &[&str]) -> Self {
        let state = TargetState {
            branches: branches.iter().map(|b| b.to_string()).collect(),
            ..TargetState::default()
        };
        Self {
            state: Mutex::new(state),
            mutations: AtomicU32::new(0),
            create_attempts: AtomicU32::new(0),
            rate_limited_creates: AtomicU32::new(0),
            hidden_lookups: AtomicU32::new(0),
            failing_closes: AtomicU32::new(0),
            executor: None,
        }
    }

    /// Only the listed commits resolve.
    pub fn with_commits(self, commits: &[&str]) -> Self {
        self.state.lock().unwrap().commits = commits.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_collaborators(self, logins: &[&str]) -> Self {
        self.state.lock().unwrap().collaborators =
            logins.iter().map(|l| l.to_string()).collect();
        self
    }

    /// The first `count` creation attempts answer 429 with `Retry-After: 2`.
    /// Retries run through `executor`, as the real adapter's do.
    pub fn rate_limited(self, count: u32, executor: RateLimitedExecutor) -> Self {
        self.rate_limited_creates.store(count, Ordering::SeqCst);
        Self {
            executor: Some(executor),
            ..self
        }
    }

    /// A pull request from `head` into `base` already exists on the target.
    pub fn with_existing_pull_request(self, head: &str, base: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let number = state.next_number();
            state.pull_requests.push(CreatedPr {
                number,
                title: format!("{head} -> {base}"),
                body: String::new(),
                head: head.to_string(),
                base: base.to_string(),
            });
        }
        self
    }

    /// The first `count` pull request lookups find nothing, as when a
    /// concurrent writer creates the pull request after the lookup.
    pub fn hiding_existing(self, count: u32) -> Self {
        self.hidden_lookups.store(count, Ordering::SeqCst);
        self
    }

    /// The first `count` issue closes fail and leave the issue open.
    pub fn failing_closes(self, count: u32) -> Self {
        self.failing_closes.store(count, Ordering::SeqCst);
        self
    }

    pub fn mutations(&self) -> u32 {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn create_attempts(&self) -> u32 {
        self.create_attempts.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<CreatedPr> {
        self.state.lock().unwrap().pull_requests.clone()
    }

    pub fn comments(&self) -> Vec<PostedComment> {
        self.state.lock().unwrap().comments.clone()
    }

    pub fn issues(&self) -> Vec<CreatedIssue> {
        self.state.lock().unwrap().issues.clone()
    }

    fn try_create(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestRef, RemoteError> {
        self.create_attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.rate_limited_creates) {
            return Err(RemoteError::Transient {
                operation: "create pull request".to_string(),
                message: "rate limited".to_string(),
                status: Some(429),
                retry_after: Some(Duration::from_secs(2)),
            });
        }

        let mut state = self.state.lock().unwrap();
        if state
            .pull_requests
            .iter()
            .any(|pr| pr.head == head && pr.base == base)
        {
            return Err(RemoteError::Validation {
                operation: "create pull request".to_string(),
                kind: pr_migrator::error::ValidationKind::AlreadyExists,
                message: "A pull request already exists".to_string(),
            });
        }

        self.mutations.fetch_add(1, Ordering::SeqCst);
        let number = state.next_number();
        state.pull_requests.push(CreatedPr {
            number,
            title: title.to_string(),
            body: body.to_string(),
            head: head.to_string(),
            base: base.to_string(),
        });
        Ok(pr_ref(number))
    }
}

/// Consumes one unit of `counter`; false once it is exhausted.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

fn pr_ref(number: u64) -> PullRequestRef {
    PullRequestRef {
        number,
        url: format!("https://github.com/acme/widgets/pull/{number}"),
    }
}

#[async_trait]
impl TargetRepository for FakeTarget {
    async fn verify_access(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, RemoteError> {
        Ok(self.state.lock().unwrap().branches.contains(branch))
    }

    async fn commit_exists(&self, sha: &str) -> Result<bool, RemoteError> {
        Ok(self.state.lock().unwrap().commits.contains(sha))
    }

    async fn find_existing_pull_request(
        &self,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequestRef>, RemoteError> {
        if take_one(&self.hidden_lookups) {
            return Ok(None);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .pull_requests
            .iter()
            .find(|pr| pr.head == head && pr.base == base)
            .map(|pr| pr_ref(pr.number)))
    }

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestRef, RemoteError> {
        match &self.executor {
            Some(executor) => {
                executor
                    .run("create pull request", || async {
                        self.try_create(title, body, head, base)
                    })
                    .await
            }
            None => self.try_create(title, body, head, base),
        }
    }

    async fn add_comment(
        &self,
        pr: &PullRequestRef,
        author_label: &str,
        body: &str,
    ) -> Result<(), RemoteError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().comments.push(PostedComment {
            number: pr.number,
            author_label: author_label.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn is_collaborator(&self, login: &str) -> Result<bool, RemoteError> {
        Ok(self.state.lock().unwrap().collaborators.contains(login))
    }

    async fn request_reviewers(
        &self,
        pr: &PullRequestRef,
        logins: &[String],
    ) -> Result<Vec<String>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let accepted: Vec<String> = logins
            .iter()
            .filter(|login| state.collaborators.contains(*login))
            .cloned()
            .collect();
        if !accepted.is_empty() {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            state.reviewer_requests.push((pr.number, accepted.clone()));
        }
        Ok(accepted)
    }

    async fn find_existing_issue(&self, title: &str) -> Result<Option<IssueRef>, RemoteError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .issues
            .iter()
            .find(|issue| issue.title == title)
            .map(|issue| issue_ref(issue.number)))
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<IssueRef, RemoteError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let number = state.next_number();
        state.issues.push(CreatedIssue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.to_vec(),
            comments: Vec::new(),
            closed: None,
        });
        Ok(issue_ref(number))
    }

    async fn add_issue_comment(&self, issue: &IssueRef, body: &str) -> Result<(), RemoteError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let stored = state
            .issues
            .iter_mut()
            .find(|stored| stored.number == issue.number)
            .ok_or_else(|| RemoteError::NotFound {
                resource: format!("issue #{}", issue.number),
            })?;
        stored.comments.push(body.to_string());
        Ok(())
    }

    async fn close_issue(
        &self,
        issue: &IssueRef,
        reason: IssueCloseReason,
    ) -> Result<(), RemoteError> {
        if take_one(&self.failing_closes) {
            return Err(RemoteError::fatal("close issue", "server error"));
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(stored) = state
            .issues
            .iter_mut()
            .find(|stored| stored.number == issue.number)
        {
            stored.closed = Some(reason);
        }
        Ok(())
    }
}

fn issue_ref(number: u64) -> IssueRef {
    IssueRef {
        number,
        url: format!("https://github.com/acme/widgets/issues/{number}"),
    }
}
