use futures::TryStreamExt;
use pr_migrator::error::RemoteError;
use pr_migrator::models::LifecycleState;
use pr_migrator::rate_limit::{RateLimitGate, RateLimitedExecutor, RetryPolicy};
use pr_migrator::{BitbucketAuth, BitbucketSource, SourceRepository};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO: &str = "/repositories/acme/widgets";

fn executor() -> RateLimitedExecutor {
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_total_wait: Duration::from_secs(5),
        call_timeout: Some(Duration::from_secs(5)),
        ..RetryPolicy::default()
    }
    .without_jitter();
    RateLimitedExecutor::new(policy, Arc::new(RateLimitGate::new()))
}

fn source(server: &MockServer, auth: BitbucketAuth) -> BitbucketSource {
    BitbucketSource::new(&server.uri(), "acme", "widgets", auth, executor()).unwrap()
}

fn token() -> BitbucketAuth {
    BitbucketAuth::Token("bb-token".to_string())
}

fn wire_pr(id: u64, state: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Change {id}"),
        "description": "",
        "author": { "nickname": "alice" },
        "state": state,
        "source": {
            "branch": { "name": format!("feature/{id}") },
            "repository": { "full_name": "acme/widgets" }
        },
        "destination": {
            "branch": { "name": "main" },
            "repository": { "full_name": "acme/widgets" }
        },
        "created_on": "2024-01-02T03:04:05.000000+00:00",
        "updated_on": null
    })
}

fn wire_comment(id: u64, minute: u32, parent: Option<u64>, deleted: bool) -> Value {
    json!({
        "id": id,
        "user": { "nickname": "bob" },
        "content": { "raw": format!("comment {id}") },
        "created_on": format!("2024-01-02T10:{minute:02}:00+00:00"),
        "updated_on": null,
        "parent": parent.map(|id| json!({ "id": id })),
        "deleted": deleted
    })
}

#[tokio::test]
async fn enumeration_follows_next_links() {
    let server = MockServer::start().await;
    let second_page = format!("{}{REPO}/pullrequests?page=2", server.uri());

    Mock::given(method("GET"))
        .and(path(format!("{REPO}/pullrequests")))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [wire_pr(2, "MERGED")]
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{REPO}/pullrequests")))
        .and(query_param("pagelen", "50"))
        .and(header("authorization", "Bearer bb-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [wire_pr(1, "OPEN"), wire_pr(3, "SOMETHING_NEW")],
            "next": second_page
        })))
        .mount(&server)
        .await;

    let source = source(&server, token());
    let prs: Vec<_> = source.list_pull_requests().try_collect().await.unwrap();

    let ids: Vec<u64> = prs.iter().map(|pr| pr.id).collect();
    assert_eq!(ids, vec![1, 3, 2]);
    assert_eq!(prs[0].state, LifecycleState::Open);
    assert_eq!(prs[0].source_branch, "feature/1");
    assert_eq!(prs[0].author, "alice");
    assert_eq!(prs[1].state, LifecycleState::Declined);
    assert_eq!(prs[2].state, LifecycleState::Merged);
}

#[tokio::test]
async fn enumeration_error_ends_the_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/pullrequests")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "message": "Access denied" }
        })))
        .mount(&server)
        .await;

    let source = source(&server, token());
    let result: Result<Vec<_>, _> = source.list_pull_requests().try_collect().await;

    let Err(RemoteError::Fatal { message, .. }) = result else {
        panic!("expected fatal error");
    };
    assert!(message.contains("Access denied"));
}

#[tokio::test]
async fn comments_merge_tasks_and_drop_deleted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/pullrequests/4/comments")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [
                wire_comment(12, 30, Some(11), false),
                wire_comment(11, 10, None, false),
                wire_comment(13, 20, None, true)
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/pullrequests/4/tasks")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [{
                "id": 1,
                "content": { "raw": "fix the docs" },
                "state": "RESOLVED",
                "created_on": "2024-01-02T10:15:00+00:00",
                "updated_on": null,
                "creator": { "nickname": "carol" },
                "comment": { "id": 11 }
            }]
        })))
        .mount(&server)
        .await;

    let comments = source(&server, token()).list_comments(4).await.unwrap();

    let bodies: Vec<&str> = comments.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, vec!["comment 11", "fix the docs", "comment 12"]);
    assert_eq!(comments[1].parent_id, Some(11));
    assert!(comments[1].task.is_some_and(|task| task.resolved));
    assert_eq!(comments[2].parent_id, Some(11));
}

#[tokio::test]
async fn missing_task_endpoint_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/pullrequests/4/comments")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [wire_comment(11, 10, None, false)]
        })))
        .mount(&server)
        .await;

    let comments = source(&server, token()).list_comments(4).await.unwrap();

    assert_eq!(comments.len(), 1);
}

#[tokio::test]
async fn commits_are_returned_oldest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/pullrequests/4/commits")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [{ "hash": "ccc" }, { "hash": "bbb" }, { "hash": "aaa" }]
        })))
        .mount(&server)
        .await;

    let commits = source(&server, token()).list_commits(4).await.unwrap();

    assert_eq!(commits, vec!["aaa", "bbb", "ccc"]);
}

#[tokio::test]
async fn unknown_commits_do_not_exist() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/commit/abc")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hash": "abc" })))
        .mount(&server)
        .await;

    let source = source(&server, token());

    assert!(source.commit_exists("abc").await.unwrap());
    assert!(!source.commit_exists("def").await.unwrap());
}

#[tokio::test]
async fn rate_limited_requests_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPO))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(REPO))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "slug": "widgets" })))
        .expect(1)
        .mount(&server)
        .await;

    source(&server, token()).verify_access().await.unwrap();
}

#[tokio::test]
async fn rejected_credentials_are_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPO))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let error = source(&server, token()).verify_access().await.unwrap_err();

    assert!(matches!(error, RemoteError::Fatal { status: Some(401), .. }));
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn oauth_token_is_exchanged_once_and_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "short-lived",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(REPO))
        .and(header("authorization", "Bearer short-lived"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "slug": "widgets" })))
        .expect(2)
        .mount(&server)
        .await;

    let source = source(
        &server,
        BitbucketAuth::OAuth {
            key: "key".to_string(),
            secret: "secret".to_string(),
            token_url: format!("{}/oauth/token", server.uri()),
        },
    );

    source.verify_access().await.unwrap();
    source.verify_access().await.unwrap();
}

#[test]
fn web_links_point_at_bitbucket() {
    let source = BitbucketSource::new(
        "https://api.bitbucket.org/2.0",
        "acme",
        "widgets",
        token(),
        executor(),
    )
    .unwrap();

    assert_eq!(
        source.pull_request_url(42),
        "https://bitbucket.org/acme/widgets/pull-requests/42"
    );
}
