//! Hook for rewriting body text before it is written to the target.
//!
//! Bodies are opaque strings. Markdown dialect conversion and media re-hosting
//! plug in here; the default leaves text untouched. Account mentions are
//! always rewritten by [`MentionRewriter`] after the installed hook.

use crate::identity::IdentityResolver;
use crate::models::Comment;
use std::collections::HashMap;

/// Replacement for a mention whose account is not known.
pub const UNKNOWN_MENTION: &str = "*(user mention)*";

/// What a body belongs to, for rewriters that treat them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Pull request description.
    Description,
    /// Comment or task text.
    Comment,
}

/// Transforms body text on its way to the target.
pub trait BodyRewriter: Send + Sync {
    /// Returns the text to write for `body` of source pull request `pr_id`.
    fn rewrite(&self, pr_id: u64, kind: BodyKind, body: &str) -> String;
}

/// Leaves bodies untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughRewriter;

impl BodyRewriter for PassthroughRewriter {
    fn rewrite(&self, _pr_id: u64, _kind: BodyKind, body: &str) -> String {
        body.to_string()
    }
}

/// Replaces Bitbucket account mentions (`@{557058:0f1e-...}`) with target
/// logins.
///
/// Account ids are known from the comment authors of one pull request. A
/// known account becomes `@login` when its author is mapped and `@name`
/// otherwise; an unknown one becomes [`UNKNOWN_MENTION`].
pub struct MentionRewriter<'a> {
    identities: &'a IdentityResolver,
    accounts: HashMap<&'a str, &'a str>,
}

impl<'a> MentionRewriter<'a> {
    /// Builds the account table from the authors of `comments`.
    #[must_use]
    pub fn new(identities: &'a IdentityResolver, comments: &'a [Comment]) -> Self {
        let accounts = comments
            .iter()
            .filter_map(|comment| {
                comment
                    .author_account_id
                    .as_deref()
                    .map(|id| (id, comment.author.as_str()))
            })
            .collect();

        Self {
            identities,
            accounts,
        }
    }

    /// Rewrites every well-formed mention in `body`. Anything that only
    /// looks like one is left as it is.
    #[must_use]
    pub fn replace_mentions(&self, body: &str) -> String {
        let mut out = String::with_capacity(body.len());
        let mut rest = body;

        while let Some(start) = rest.find("@{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            match after.find('}') {
                Some(end) if is_account_id(&after[..end]) => {
                    out.push_str(&self.mention(&after[..end]));
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push_str("@{");
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }

    fn mention(&self, account_id: &str) -> String {
        match self.accounts.get(account_id) {
            Some(name) => match self.identities.resolve(name) {
                Some(login) => format!("@{login}"),
                None => format!("@{name}"),
            },
            None => UNKNOWN_MENTION.to_string(),
        }
    }
}

impl BodyRewriter for MentionRewriter<'_> {
    fn rewrite(&self, _pr_id: u64, _kind: BodyKind, body: &str) -> String {
        self.replace_mentions(body)
    }
}

/// `<digits>:<lower-case hex and dashes>`
fn is_account_id(candidate: &str) -> bool {
    let Some((prefix, suffix)) = candidate.split_once(':') else {
        return false;
    };

    !prefix.is_empty()
        && prefix.bytes().all(|b| b.is_ascii_digit())
        && !suffix.is_empty()
        && suffix
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f' | b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn authored(author: &str, account_id: &str) -> Comment {
        Comment {
            id: 1,
            author: author.to_string(),
            author_account_id: Some(account_id.to_string()),
            body: String::new(),
            created_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_date: None,
            parent_id: None,
            task: None,
            inline: None,
        }
    }

    fn rewrite(body: &str) -> String {
        let identities = IdentityResolver::new([("bob", "bob-gh")]);
        let comments = vec![
            authored("bob", "557058:0f1e-2d3c"),
            authored("carol", "712020:abc-123"),
        ];
        MentionRewriter::new(&identities, &comments).replace_mentions(body)
    }

    #[test]
    fn mapped_authors_become_target_logins() {
        assert_eq!(rewrite("ping @{557058:0f1e-2d3c} please"), "ping @bob-gh please");
    }

    #[test]
    fn unmapped_authors_keep_their_source_name() {
        assert_eq!(rewrite("@{712020:abc-123}: done"), "@carol: done");
    }

    #[test]
    fn unknown_accounts_get_a_placeholder() {
        assert_eq!(rewrite("cc @{999:ffff}"), "cc *(user mention)*");
    }

    #[test]
    fn several_mentions_in_one_body() {
        assert_eq!(
            rewrite("@{557058:0f1e-2d3c} and @{712020:abc-123}"),
            "@bob-gh and @carol"
        );
    }

    #[test]
    fn lookalikes_are_left_alone() {
        assert_eq!(rewrite("@{not-an-id} @{123:XYZ}"), "@{not-an-id} @{123:XYZ}");
        assert_eq!(rewrite("unterminated @{557058:0f1e"), "unterminated @{557058:0f1e");
        assert_eq!(rewrite("@{:abc} @{12:}"), "@{:abc} @{12:}");
        assert_eq!(rewrite("plain @bob text"), "plain @bob text");
    }

    #[test]
    fn broken_prefix_does_not_hide_a_later_mention() {
        assert_eq!(rewrite("@{oops @{712020:abc-123}"), "@{oops @carol");
    }
}
