//! Template rendering using Handlebars.
//!
//! This module renders the generated markdown: recreated pull request bodies,
//! flattened comments, reviewer summaries, and tracking issues.

mod error;
mod renderer;

pub use error::TemplateError;
pub use renderer::{create_handlebars_registry, ReplyContext, ReviewerRow, TemplateRenderer};

use crate::models::PullRequest;
use chrono::{DateTime, Utc};

/// Characters of a parent comment quoted in a reply.
pub const QUOTE_LIMIT: usize = 200;

/// Generates the title of a closed pull request's tracking issue.
///
/// Format: "[Closed PR #{id}] {title}"
#[must_use]
pub fn generate_issue_title(pr: &PullRequest) -> String {
    format!("[Closed PR #{}] {}", pr.id, pr.title)
}

/// Formats a timestamp the way generated text shows it.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Quotes the first [`QUOTE_LIMIT`] characters of `body` as a markdown
/// block quote.
#[must_use]
pub fn quote_excerpt(body: &str) -> String {
    let mut excerpt: String = body.chars().take(QUOTE_LIMIT).collect();
    if body.chars().count() > QUOTE_LIMIT {
        excerpt.push_str("...");
    }

    excerpt
        .lines()
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_issue_title() {
        let mut pr: PullRequest = serde_json::from_value(serde_json::json!({
            "id": 17,
            "title": "Fix login",
            "description": "",
            "author": "alice",
            "source_branch": "fix",
            "destination_branch": "main",
            "state": "DECLINED",
            "created_date": "2024-01-01T00:00:00Z",
            "updated_date": null,
            "closed_date": null,
            "merge_commit": null
        }))
        .unwrap();

        assert_eq!(generate_issue_title(&pr), "[Closed PR #17] Fix login");
        pr.title = "Other".to_string();
        assert_eq!(generate_issue_title(&pr), "[Closed PR #17] Other");
    }

    #[test]
    fn excerpt_is_truncated_by_characters() {
        let body = "é".repeat(250);
        let quoted = quote_excerpt(&body);

        assert!(quoted.starts_with("> "));
        assert_eq!(quoted.chars().filter(|c| *c == 'é').count(), QUOTE_LIMIT);
        assert!(quoted.ends_with("..."));
    }

    #[test]
    fn timestamps_are_minute_precision_utc() {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(at), "2024-05-06 07:08 UTC");
    }
}
