//! Best-effort reviewer assignment.

use super::MigrationOrchestrator;
use crate::models::{PullRequest, PullRequestRef};
use crate::templates::ReviewerRow;
use std::collections::BTreeSet;
use tracing::{info, warn};

impl MigrationOrchestrator {
    /// ReviewersAssigned: mapped reviewers are requested on the target.
    /// Reviewers that could not be assigned are listed in a summary comment.
    /// Never fails the record; returns the number of accepted reviewers.
    pub(super) async fn assign_reviewers(
        &self,
        pr: &PullRequest,
        created: &PullRequestRef,
    ) -> usize {
        if pr.reviewers.is_empty() {
            return 0;
        }

        let logins: Vec<String> = pr
            .reviewers
            .iter()
            .filter_map(|reviewer| self.identities.resolve(&reviewer.identity))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let accepted: BTreeSet<String> = if logins.is_empty() {
            BTreeSet::new()
        } else {
            match self.target.request_reviewers(created, &logins).await {
                Ok(accepted) => accepted.into_iter().collect(),
                Err(e) => {
                    warn!(error = %e, "Reviewer request failed; listing reviewers in a comment");
                    BTreeSet::new()
                }
            }
        };

        let rows: Vec<ReviewerRow> = pr
            .reviewers
            .iter()
            .map(|reviewer| ReviewerRow {
                label: self.identities.label(&reviewer.identity),
                approval: reviewer.approval,
                assigned: self
                    .identities
                    .resolve(&reviewer.identity)
                    .is_some_and(|login| accepted.contains(login)),
            })
            .collect();

        if rows.iter().any(|row| !row.assigned) {
            match self.renderer.render_reviewer_summary(&rows) {
                Ok(body) => {
                    if let Err(e) = self.target.add_comment(created, "reviewers", &body).await {
                        warn!(error = %e, "Could not add reviewer summary comment");
                    }
                }
                Err(e) => warn!(error = %e, "Could not render reviewer summary"),
            }
        }

        info!(
            requested = logins.len(),
            accepted = accepted.len(),
            "Reviewers assigned"
        );
        accepted.len()
    }
}
