//! Template renderer.

use super::{format_timestamp, quote_excerpt, TemplateError};
use crate::models::{ApprovalState, Comment, LifecycleState, PullRequest};
use handlebars::{no_escape, Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde_json::{json, Value};

const PR_BODY: &str = "\
{{#if description}}{{description}}{{else}}*No description provided*{{/if}}

---
_Migrated from Bitbucket pull request [#{{id}}]({{source_url}}) opened by {{author}} on {{created}}._
{{#if commits}}_{{commits}} commit(s) on `{{source_branch}}`._
{{/if}}";

const COMMENT_BODY: &str = "\
**{{author}}** commented on {{created}}{{#if edited}} _(edited {{updated}})_{{/if}}
{{#if inline}}
_Inline comment on `{{inline.path}}`{{#if inline.lines}} (lines {{inline.lines}}){{/if}}_
{{/if}}
{{#if reply}}
> {{reply.author}} wrote:
{{reply.quote}}

{{/if}}
{{#if task}}
- [{{#if task.resolved}}x{{else}} {{/if}}] {{body}}
{{else}}
{{body}}
{{/if}}";

const REVIEWER_SUMMARY: &str = "\
**Reviewers on Bitbucket**

| Reviewer | Review state | Requested on GitHub |
| --- | --- | --- |
{{#each reviewers}}| {{label}} | {{state}} | {{#if assigned}}yes{{else}}no{{/if}} |
{{/each}}";

const CLOSED_ISSUE_BODY: &str = "\
{{source_url}}

---
**Bitbucket pull request #{{id}}** by {{author}}: `{{source_branch}}` into `{{destination_branch}}`
{{#if (eq state \"MERGED\")}}Merged{{else}}Closed without merging ({{state}}){{/if}}{{#if closed}} on {{closed}}{{/if}}.
{{#if reason}}
Closure reason: {{reason}}
{{/if}}

{{#if description}}{{description}}{{else}}*No description provided*{{/if}}";

/// Creates a configured Handlebars registry with custom helpers.
///
/// The registry is configured with:
/// - No HTML escaping (for markdown output)
/// - Strict mode (catches missing variables)
/// - `eq` helper for equality comparisons
#[must_use]
pub fn create_handlebars_registry() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();

    hbs.register_escape_fn(no_escape);
    hbs.set_strict_mode(true);
    hbs.register_helper("eq", Box::new(eq_helper));

    hbs
}

/// Usage: `{{#if (eq variable "value")}}...{{/if}}`
fn eq_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param1 = h.param(0).and_then(|v| v.value().as_str());
    let param2 = h.param(1).and_then(|v| v.value().as_str());

    let result = match (param1, param2) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };

    out.write(if result { "true" } else { "" })?;
    Ok(())
}

/// The parent of a reply, as shown in the quoted excerpt.
#[derive(Debug, Clone, Copy)]
pub struct ReplyContext<'a> {
    /// Attribution label of the parent's author.
    pub author_label: &'a str,
    /// Parent body.
    pub body: &'a str,
}

/// One row of the reviewer summary comment.
#[derive(Debug, Clone)]
pub struct ReviewerRow {
    /// Attribution label of the reviewer.
    pub label: String,
    /// Review state on the source.
    pub approval: ApprovalState,
    /// Whether the target accepted the review request.
    pub assigned: bool,
}

/// Renders every generated body of a migration.
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Creates a new template renderer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlebars: create_handlebars_registry(),
        }
    }

    /// Renders the body of a recreated pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_pr_body(
        &self,
        pr: &PullRequest,
        description: &str,
        author_label: &str,
        source_url: &str,
    ) -> Result<String, TemplateError> {
        let data = json!({
            "id": pr.id,
            "description": description,
            "author": author_label,
            "source_url": source_url,
            "created": format_timestamp(pr.created_date),
            "commits": pr.commits.len(),
            "source_branch": pr.source_branch,
        });

        self.render_template(PR_BODY, &data)
    }

    /// Renders one flattened comment, carrying its attribution, reply
    /// quote, inline anchor, and task checkbox.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_comment(
        &self,
        comment: &Comment,
        body: &str,
        author_label: &str,
        reply: Option<ReplyContext<'_>>,
    ) -> Result<String, TemplateError> {
        let inline = comment.inline.as_ref().map(|anchor| {
            let lines = match (anchor.from_line, anchor.to_line) {
                (Some(from), Some(to)) if from != to => Some(format!("{from}-{to}")),
                (Some(line), _) | (None, Some(line)) => Some(line.to_string()),
                (None, None) => None,
            };
            json!({ "path": anchor.path, "lines": lines })
        });

        let data = json!({
            "author": author_label,
            "created": format_timestamp(comment.created_date),
            "edited": comment.was_edited(),
            "updated": comment.updated_date.map(format_timestamp),
            "inline": inline,
            "reply": reply.map(|parent| json!({
                "author": parent.author_label,
                "quote": quote_excerpt(parent.body),
            })),
            "task": comment.task.map(|task| json!({ "resolved": task.resolved })),
            "body": body,
        });

        self.render_template(COMMENT_BODY, &data)
    }

    /// Renders the summary comment listing source reviewers.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_reviewer_summary(&self, rows: &[ReviewerRow]) -> Result<String, TemplateError> {
        let reviewers: Vec<Value> = rows
            .iter()
            .map(|row| {
                json!({
                    "label": row.label,
                    "state": row.approval.label(),
                    "assigned": row.assigned,
                })
            })
            .collect();

        self.render_template(REVIEWER_SUMMARY, &json!({ "reviewers": reviewers }))
    }

    /// Renders the body of the tracking issue of an archived pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_closed_issue(
        &self,
        pr: &PullRequest,
        state: LifecycleState,
        description: &str,
        author_label: &str,
        source_url: &str,
    ) -> Result<String, TemplateError> {
        let data = json!({
            "id": pr.id,
            "source_url": source_url,
            "author": author_label,
            "source_branch": pr.source_branch,
            "destination_branch": pr.destination_branch,
            "state": state.as_str(),
            "closed": pr.closed_date.map(format_timestamp),
            "reason": pr.closure.as_ref().and_then(|closure| closure.reason.clone()),
            "description": description,
        });

        self.render_template(CLOSED_ISSUE_BODY, &data)
    }

    fn render_template(&self, template: &str, data: &Value) -> Result<String, TemplateError> {
        Ok(self.handlebars.render_template(template, data)?)
    }
}
