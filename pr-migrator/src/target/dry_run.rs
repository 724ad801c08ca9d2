//! Rehearsal decorator: reads pass through, writes are logged and dropped.

use super::{IssueCloseReason, TargetRepository};
use crate::error::RemoteError;
use crate::models::{IssueRef, PullRequestRef};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Number handed out for pull requests and issues that were not created.
pub const PLACEHOLDER_NUMBER: u64 = 0;

/// Wraps a target so that every mutating call becomes a logged no-op.
///
/// Lookups still reach the wrapped target, so validation and duplicate
/// checks behave exactly as in a real run.
pub struct DryRunTarget {
    inner: Arc<dyn TargetRepository>,
    intended: AtomicUsize,
}

impl DryRunTarget {
    #[must_use]
    pub fn new(inner: Arc<dyn TargetRepository>) -> Self {
        Self {
            inner,
            intended: AtomicUsize::new(0),
        }
    }

    /// Mutating calls suppressed so far.
    #[must_use]
    pub fn intended_actions(&self) -> usize {
        self.intended.load(Ordering::Relaxed)
    }

    fn suppress(&self) {
        self.intended.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl TargetRepository for DryRunTarget {
    async fn verify_access(&self) -> Result<(), RemoteError> {
        self.inner.verify_access().await
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, RemoteError> {
        self.inner.branch_exists(branch).await
    }

    async fn commit_exists(&self, sha: &str) -> Result<bool, RemoteError> {
        self.inner.commit_exists(sha).await
    }

    async fn find_existing_pull_request(
        &self,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequestRef>, RemoteError> {
        self.inner.find_existing_pull_request(head, base).await
    }

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestRef, RemoteError> {
        self.suppress();
        info!(
            title,
            head,
            base,
            body_chars = body.chars().count(),
            "[DRY RUN] Would create pull request"
        );
        Ok(PullRequestRef {
            number: PLACEHOLDER_NUMBER,
            url: format!("dry-run://pull/{head}..{base}"),
        })
    }

    async fn add_comment(
        &self,
        _pr: &PullRequestRef,
        author_label: &str,
        body: &str,
    ) -> Result<(), RemoteError> {
        self.suppress();
        info!(
            author = author_label,
            body_chars = body.chars().count(),
            "[DRY RUN] Would add comment"
        );
        Ok(())
    }

    async fn is_collaborator(&self, login: &str) -> Result<bool, RemoteError> {
        self.inner.is_collaborator(login).await
    }

    /// Runs the wrapped target's collaborator check so the accepted subset
    /// matches a real run.
    async fn request_reviewers(
        &self,
        _pr: &PullRequestRef,
        logins: &[String],
    ) -> Result<Vec<String>, RemoteError> {
        let mut accepted = Vec::with_capacity(logins.len());
        for login in logins {
            if self.inner.is_collaborator(login).await? {
                accepted.push(login.clone());
            } else {
                warn!(login = %login, "Reviewer is not a collaborator on the target");
            }
        }

        if !accepted.is_empty() {
            self.suppress();
            info!(reviewers = ?accepted, "[DRY RUN] Would request reviewers");
        }
        Ok(accepted)
    }

    async fn find_existing_issue(&self, title: &str) -> Result<Option<IssueRef>, RemoteError> {
        self.inner.find_existing_issue(title).await
    }

    async fn create_issue(
        &self,
        title: &str,
        _body: &str,
        labels: &[String],
    ) -> Result<IssueRef, RemoteError> {
        self.suppress();
        info!(title, labels = ?labels, "[DRY RUN] Would create issue");
        Ok(IssueRef {
            number: PLACEHOLDER_NUMBER,
            url: "dry-run://issue".to_string(),
        })
    }

    async fn add_issue_comment(&self, issue: &IssueRef, body: &str) -> Result<(), RemoteError> {
        self.suppress();
        info!(
            number = issue.number,
            body_chars = body.chars().count(),
            "[DRY RUN] Would add issue comment"
        );
        Ok(())
    }

    async fn close_issue(
        &self,
        issue: &IssueRef,
        reason: IssueCloseReason,
    ) -> Result<(), RemoteError> {
        self.suppress();
        info!(
            number = issue.number,
            reason = reason.as_str(),
            "[DRY RUN] Would close issue"
        );
        Ok(())
    }

    fn is_rehearsal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    /// Answers lookups and records whether any write got through.
    #[derive(Default)]
    struct Inner {
        written: AtomicBool,
    }

    impl Inner {
        fn write(&self) -> RemoteError {
            self.written.store(true, Ordering::Relaxed);
            RemoteError::fatal("write", "write reached the wrapped target")
        }
    }

    #[async_trait]
    impl TargetRepository for Inner {
        async fn verify_access(&self) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn branch_exists(&self, branch: &str) -> Result<bool, RemoteError> {
            Ok(branch == "main")
        }

        async fn commit_exists(&self, _sha: &str) -> Result<bool, RemoteError> {
            Ok(true)
        }

        async fn find_existing_pull_request(
            &self,
            head: &str,
            _base: &str,
        ) -> Result<Option<PullRequestRef>, RemoteError> {
            Ok((head == "done").then(|| PullRequestRef {
                number: 3,
                url: "https://github.com/acme/widgets/pull/3".to_string(),
            }))
        }

        async fn create_pull_request(
            &self,
            _title: &str,
            _body: &str,
            _head: &str,
            _base: &str,
        ) -> Result<PullRequestRef, RemoteError> {
            Err(self.write())
        }

        async fn add_comment(
            &self,
            _pr: &PullRequestRef,
            _author_label: &str,
            _body: &str,
        ) -> Result<(), RemoteError> {
            Err(self.write())
        }

        async fn is_collaborator(&self, login: &str) -> Result<bool, RemoteError> {
            Ok(login == "bob")
        }

        async fn request_reviewers(
            &self,
            _pr: &PullRequestRef,
            _logins: &[String],
        ) -> Result<Vec<String>, RemoteError> {
            Err(self.write())
        }

        async fn find_existing_issue(&self, _title: &str) -> Result<Option<IssueRef>, RemoteError> {
            Ok(None)
        }

        async fn create_issue(
            &self,
            _title: &str,
            _body: &str,
            _labels: &[String],
        ) -> Result<IssueRef, RemoteError> {
            Err(self.write())
        }

        async fn add_issue_comment(
            &self,
            _issue: &IssueRef,
            _body: &str,
        ) -> Result<(), RemoteError> {
            Err(self.write())
        }

        async fn close_issue(
            &self,
            _issue: &IssueRef,
            _reason: IssueCloseReason,
        ) -> Result<(), RemoteError> {
            Err(self.write())
        }
    }

    #[tokio::test]
    async fn lookups_reach_the_wrapped_target() {
        let target = DryRunTarget::new(Arc::new(Inner::default()));

        assert!(target.branch_exists("main").await.unwrap());
        assert!(!target.branch_exists("feature").await.unwrap());
        let existing = target.find_existing_pull_request("done", "main").await.unwrap();
        assert_eq!(existing.map(|pr| pr.number), Some(3));
        assert_eq!(target.intended_actions(), 0);
    }

    #[tokio::test]
    async fn writes_are_counted_but_never_forwarded() {
        let inner = Arc::new(Inner::default());
        let target = DryRunTarget::new(inner.clone());

        let pr = target
            .create_pull_request("Add login", "body", "feature/1", "main")
            .await
            .unwrap();
        target.add_comment(&pr, "bob", "looks good").await.unwrap();
        target
            .request_reviewers(&pr, &["bob".to_string()])
            .await
            .unwrap();
        let issue = target.create_issue("title", "body", &[]).await.unwrap();
        target.add_issue_comment(&issue, "comment").await.unwrap();
        target
            .close_issue(&issue, IssueCloseReason::Completed)
            .await
            .unwrap();

        assert_eq!(pr.number, PLACEHOLDER_NUMBER);
        assert_eq!(target.intended_actions(), 6);
        assert!(!inner.written.load(Ordering::Relaxed));
        assert!(target.is_rehearsal());
    }

    #[tokio::test]
    async fn empty_reviewer_list_is_not_an_action() {
        let target = DryRunTarget::new(Arc::new(Inner::default()));
        let pr = PullRequestRef {
            number: PLACEHOLDER_NUMBER,
            url: String::new(),
        };

        let accepted = target.request_reviewers(&pr, &[]).await.unwrap();

        assert!(accepted.is_empty());
        assert_eq!(target.intended_actions(), 0);
    }

    #[tokio::test]
    async fn reviewers_are_filtered_by_the_wrapped_target() {
        let inner = Arc::new(Inner::default());
        let target = DryRunTarget::new(inner.clone());
        let pr = PullRequestRef {
            number: PLACEHOLDER_NUMBER,
            url: String::new(),
        };

        let accepted = target
            .request_reviewers(&pr, &["bob".to_string(), "mallory".to_string()])
            .await
            .unwrap();

        assert_eq!(accepted, vec!["bob".to_string()]);
        assert_eq!(target.intended_actions(), 1);
        assert!(!inner.written.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn no_collaborators_means_no_intended_request() {
        let target = DryRunTarget::new(Arc::new(Inner::default()));
        let pr = PullRequestRef {
            number: PLACEHOLDER_NUMBER,
            url: String::new(),
        };

        let accepted = target
            .request_reviewers(&pr, &["mallory".to_string()])
            .await
            .unwrap();

        assert!(accepted.is_empty());
        assert_eq!(target.intended_actions(), 0);
    }
}
