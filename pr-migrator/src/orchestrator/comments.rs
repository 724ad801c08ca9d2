//! Flattening of threaded comments into the target's linear stream.

use super::MigrationOrchestrator;
use crate::models::{Comment, PullRequest};
use crate::rewrite::{BodyKind, BodyRewriter, MentionRewriter};
use crate::templates::{ReplyContext, TemplateError};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Parent links followed before a thread is cut off.
pub const MAX_THREAD_DEPTH: usize = 16;

/// A comment in replay order together with the comment it replies to.
#[derive(Debug, Clone, Copy)]
pub struct FlatComment<'a> {
    pub comment: &'a Comment,
    /// Direct parent, if it is part of the same pull request.
    pub parent: Option<&'a Comment>,
    /// Number of ancestors, bounded by [`MAX_THREAD_DEPTH`].
    pub depth: usize,
}

/// Orders comments chronologically (ties broken by id) and resolves parents.
///
/// Parent links are followed iteratively with a visited set, so malformed or
/// cyclic threads terminate.
#[must_use]
pub fn flatten_comments(comments: &[Comment]) -> Vec<FlatComment<'_>> {
    let by_id: HashMap<u64, &Comment> = comments.iter().map(|c| (c.id, c)).collect();

    let mut ordered: Vec<&Comment> = comments.iter().collect();
    ordered.sort_by_key(|comment| (comment.created_date, comment.id));

    ordered
        .into_iter()
        .map(|comment| FlatComment {
            comment,
            parent: comment
                .parent_id
                .filter(|id| *id != comment.id)
                .and_then(|id| by_id.get(&id).copied()),
            depth: thread_depth(comment, &by_id),
        })
        .collect()
}

impl MigrationOrchestrator {
    /// Runs the installed rewrite hook, then resolves account mentions
    /// against the comment authors of `pr`.
    pub(super) fn rewrite_body(&self, pr: &PullRequest, kind: BodyKind, body: &str) -> String {
        let text = self.rewriter.rewrite(pr.id, kind, body);
        MentionRewriter::new(&self.identities, &pr.comments).rewrite(pr.id, kind, &text)
    }

    /// Renders a flattened comment of `pr`. Returns the author's
    /// attribution label and the body to post.
    pub(super) fn render_flat_comment(
        &self,
        pr: &PullRequest,
        entry: &FlatComment<'_>,
    ) -> Result<(String, String), TemplateError> {
        let comment = entry.comment;
        let author_label = self.identities.label(&comment.author);
        let parent = entry.parent.map(|parent| {
            (
                self.identities.label(&parent.author),
                self.rewrite_body(pr, BodyKind::Comment, &parent.body),
            )
        });
        let reply = parent.as_ref().map(|(label, text)| ReplyContext {
            author_label: label,
            body: text,
        });

        let text = self.rewrite_body(pr, BodyKind::Comment, &comment.body);
        let body = self
            .renderer
            .render_comment(comment, &text, &author_label, reply)?;
        Ok((author_label, body))
    }
}

fn thread_depth(comment: &Comment, by_id: &HashMap<u64, &Comment>) -> usize {
    let mut visited = HashSet::from([comment.id]);
    let mut current = comment;
    let mut depth = 0;

    while let Some(parent) = current.parent_id.and_then(|id| by_id.get(&id).copied()) {
        if !visited.insert(parent.id) {
            warn!(comment_id = comment.id, "Comment thread contains a cycle");
            break;
        }
        if depth == MAX_THREAD_DEPTH {
            warn!(comment_id = comment.id, "Comment thread exceeds maximum depth");
            break;
        }
        depth += 1;
        current = parent;
    }

    depth
}
