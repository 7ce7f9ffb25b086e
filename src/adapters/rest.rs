use crate::adapters::github::{
    ApiComment, DiffFile, GitHubApi, PrDetails, PullRequestDiff, Reaction, RepoRef, ReviewInput,
    User,
};
use crate::core::diff_parser::DiffParser;
use crate::core::request::{CommentKind, ReviewEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";
const PER_PAGE: usize = 100;
const BASE_DELAY_MS: u64 = 250;

pub struct RestClient {
    client: Client,
    base_url: String,
    token: String,
    retry_count: u32,
}

#[derive(Deserialize)]
struct RawPull {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    html_url: String,
    user: User,
    head: RawRef,
    base: RawRef,
}

#[derive(Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    name: String,
    #[serde(default)]
    sha: String,
}

#[derive(Deserialize)]
struct RawReview {
    id: u64,
    state: String,
}

#[derive(Deserialize)]
struct RawReaction {
    id: u64,
    content: String,
    user: User,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ThreadsData {
    repository: Option<ThreadsRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadsRepository {
    pull_request: Option<ThreadsPullRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadsPullRequest {
    review_threads: Connection<ReviewThread>,
}

#[derive(Deserialize)]
struct Connection<T> {
    nodes: Vec<T>,
}

#[derive(Deserialize)]
struct ReviewThread {
    id: String,
    comments: Connection<ThreadComment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadComment {
    database_id: Option<u64>,
}

const REVIEW_THREADS_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      reviewThreads(first: 100) {
        nodes {
          id
          comments(first: 100) { nodes { databaseId } }
        }
      }
    }
  }
}"#;

const RESOLVE_THREAD_MUTATION: &str = r#"
mutation($threadId: ID!) {
  resolveReviewThread(input: { threadId: $threadId }) {
    thread { id isResolved }
  }
}"#;

impl RestClient {
    pub fn new(base_url: &str, token: String, timeout: Duration, retry_count: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ghcomment/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            retry_count,
        })
    }

    /// Sends one request. Only GETs are retried, on 429/5xx and transport
    /// errors, with linear backoff. Failures carry the status, method and
    /// path so callers can classify them.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        accept: &str,
    ) -> Result<reqwest::Response> {
        let retries = if method == Method::GET { self.retry_count } else { 0 };
        let url = format!("{}{}", self.base_url, path);

        for attempt in 0..=retries {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.token)
                .header(ACCEPT, accept)
                .header("X-GitHub-Api-Version", "2022-11-28");
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    if is_retryable_status(status) && attempt < retries {
                        warn!("{} {} returned {}; retrying", method, path, status.as_u16());
                        sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))).await;
                        continue;
                    }
                    anyhow::bail!(
                        "GitHub API error ({}) {} {}: {}",
                        status.as_u16(),
                        method,
                        path,
                        text.trim()
                    );
                }
                Err(err) => {
                    if attempt < retries {
                        debug!("{} {} failed ({}); retrying", method, path, err);
                        sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))).await;
                        continue;
                    }
                    return Err(err).with_context(|| format!("request failed: {} {}", method, path));
                }
            }
        }

        anyhow::bail!("GitHub request {} {} failed after retries", method, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None, JSON_MEDIA_TYPE)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from GET {}", path))
    }

    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for page in 1.. {
            let batch: Vec<T> = self
                .get_json(&format!("{}?per_page={}&page={}", path, PER_PAGE, page))
                .await?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                break;
            }
        }
        Ok(items)
    }

    async fn send_json<T: DeserializeOwned>(&self, method: Method, path: &str, body: &Value) -> Result<T> {
        let verb = method.to_string();
        self.send(method, path, Some(body), JSON_MEDIA_TYPE)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {} {}", verb, path))
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let body = json!({ "query": query, "variables": variables });
        let response: GraphQlResponse<T> = self.send_json(Method::POST, "/graphql", &body).await?;

        if !response.errors.is_empty() {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            anyhow::bail!("GitHub GraphQL error: {}", messages.join("; "));
        }
        response.data.context("GitHub GraphQL response had no data")
    }

    fn comment_path(repo: &RepoRef, kind: CommentKind, comment_id: u64) -> String {
        let collection = match kind {
            CommentKind::Issue => "issues",
            CommentKind::Review => "pulls",
        };
        format!("/repos/{}/{}/comments/{}", repo, collection, comment_id)
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl GitHubApi for RestClient {
    async fn list_issue_comments(&self, repo: &RepoRef, pr: u64) -> Result<Vec<ApiComment>> {
        self.get_all(&format!("/repos/{}/issues/{}/comments", repo, pr))
            .await
    }

    async fn list_review_comments(&self, repo: &RepoRef, pr: u64) -> Result<Vec<ApiComment>> {
        self.get_all(&format!("/repos/{}/pulls/{}/comments", repo, pr))
            .await
    }

    async fn create_issue_comment(&self, repo: &RepoRef, pr: u64, body: &str) -> Result<ApiComment> {
        self.send_json(
            Method::POST,
            &format!("/repos/{}/issues/{}/comments", repo, pr),
            &json!({ "body": body }),
        )
        .await
    }

    async fn create_review_comment_reply(
        &self,
        repo: &RepoRef,
        pr: u64,
        comment_id: u64,
        body: &str,
    ) -> Result<ApiComment> {
        self.send_json(
            Method::POST,
            &format!("/repos/{}/pulls/{}/comments/{}/replies", repo, pr, comment_id),
            &json!({ "body": body }),
        )
        .await
    }

    async fn add_reaction(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        kind: CommentKind,
        reaction: Reaction,
    ) -> Result<()> {
        let path = format!("{}/reactions", Self::comment_path(repo, kind, comment_id));
        self.send(
            Method::POST,
            &path,
            Some(&json!({ "content": reaction.as_str() })),
            JSON_MEDIA_TYPE,
        )
        .await?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        kind: CommentKind,
        reaction: Reaction,
    ) -> Result<()> {
        let me: User = self.get_json("/user").await?;
        let path = format!("{}/reactions", Self::comment_path(repo, kind, comment_id));
        let reactions: Vec<RawReaction> = self.get_all(&path).await?;

        let existing = reactions
            .into_iter()
            .find(|r| r.content == reaction.as_str() && r.user.login == me.login)
            .with_context(|| {
                format!(
                    "no {} reaction from {} on comment {}",
                    reaction, me.login, comment_id
                )
            })?;

        self.send(
            Method::DELETE,
            &format!("{}/{}", path, existing.id),
            None,
            JSON_MEDIA_TYPE,
        )
        .await?;
        Ok(())
    }

    async fn edit_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        kind: CommentKind,
        body: &str,
    ) -> Result<()> {
        self.send(
            Method::PATCH,
            &Self::comment_path(repo, kind, comment_id),
            Some(&json!({ "body": body })),
            JSON_MEDIA_TYPE,
        )
        .await?;
        Ok(())
    }

    async fn fetch_pr_diff(&self, repo: &RepoRef, pr: u64) -> Result<PullRequestDiff> {
        let diff = self
            .send(
                Method::GET,
                &format!("/repos/{}/pulls/{}", repo, pr),
                None,
                DIFF_MEDIA_TYPE,
            )
            .await?
            .text()
            .await
            .context("Failed to read PR diff")?;

        let files = DiffParser::parse_unified_diff(&diff)?
            .into_iter()
            .map(|file| DiffFile {
                lines: file.commentable_lines(),
                filename: file.path,
            })
            .collect();
        Ok(PullRequestDiff { files })
    }

    async fn create_review(&self, repo: &RepoRef, pr: u64, review: &ReviewInput) -> Result<()> {
        let body = serde_json::to_value(review)?;
        self.send(
            Method::POST,
            &format!("/repos/{}/pulls/{}/reviews", repo, pr),
            Some(&body),
            JSON_MEDIA_TYPE,
        )
        .await?;
        Ok(())
    }

    async fn get_pr_details(&self, repo: &RepoRef, pr: u64) -> Result<PrDetails> {
        let raw: RawPull = self
            .get_json(&format!("/repos/{}/pulls/{}", repo, pr))
            .await?;
        Ok(PrDetails {
            number: raw.number,
            title: raw.title,
            state: raw.state,
            author: raw.user.login,
            head_ref: raw.head.name,
            head_sha: raw.head.sha,
            base_ref: raw.base.name,
            html_url: raw.html_url,
        })
    }

    /// GitHub only shows a pending review to its author, so any pending
    /// review in the listing is the caller's.
    async fn find_pending_review(&self, repo: &RepoRef, pr: u64) -> Result<Option<u64>> {
        let reviews: Vec<RawReview> = self
            .get_all(&format!("/repos/{}/pulls/{}/reviews", repo, pr))
            .await?;
        Ok(reviews
            .into_iter()
            .find(|r| r.state == "PENDING")
            .map(|r| r.id))
    }

    async fn submit_review(
        &self,
        repo: &RepoRef,
        pr: u64,
        review_id: u64,
        body: &str,
        event: ReviewEvent,
    ) -> Result<()> {
        self.send(
            Method::POST,
            &format!("/repos/{}/pulls/{}/reviews/{}/events", repo, pr, review_id),
            Some(&json!({ "body": body, "event": event.as_str() })),
            JSON_MEDIA_TYPE,
        )
        .await?;
        Ok(())
    }

    async fn find_review_thread_for_comment(
        &self,
        repo: &RepoRef,
        pr: u64,
        comment_id: u64,
    ) -> Result<String> {
        let data: ThreadsData = self
            .graphql(
                REVIEW_THREADS_QUERY,
                json!({ "owner": repo.owner, "name": repo.name, "number": pr }),
            )
            .await?;

        let threads = data
            .repository
            .and_then(|r| r.pull_request)
            .with_context(|| format!("PR #{} not found in {}", pr, repo))?
            .review_threads
            .nodes;

        threads
            .into_iter()
            .find(|thread| {
                thread
                    .comments
                    .nodes
                    .iter()
                    .any(|c| c.database_id == Some(comment_id))
            })
            .map(|thread| thread.id)
            .with_context(|| format!("no review thread found for comment {}", comment_id))
    }

    async fn resolve_review_thread(&self, thread_id: &str) -> Result<()> {
        let _: Value = self
            .graphql(RESOLVE_THREAD_MUTATION, json!({ "threadId": thread_id }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::api_error::{classify, ApiErrorKind};
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard, retry_count: u32) -> RestClient {
        RestClient::new(&server.url(), "t0ken".into(), Duration::from_secs(5), retry_count).unwrap()
    }

    fn repo() -> RepoRef {
        RepoRef::new("octo", "widgets")
    }

    const COMMENT_JSON: &str = r#"[{
        "id": 11,
        "body": "hello",
        "user": {"login": "alice", "id": 1},
        "created_at": "2024-01-02T03:04:05Z",
        "updated_at": "2024-01-02T03:04:05Z",
        "path": "src/a.go",
        "line": 7
    }]"#;

    #[tokio::test]
    async fn lists_comments_with_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/octo/widgets/pulls/5/comments")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer t0ken")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(COMMENT_JSON)
            .create_async()
            .await;

        let comments = client(&server, 0)
            .list_review_comments(&repo(), 5)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].user.login, "alice");
        assert_eq!(comments[0].line, Some(7));
    }

    #[tokio::test]
    async fn get_is_retried_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/octo/widgets/issues/5/comments")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .expect(2)
            .create_async()
            .await;

        let err = client(&server, 1)
            .list_issue_comments(&repo(), 5)
            .await
            .unwrap_err();
        mock.assert_async().await;
        assert!(err.to_string().contains("GitHub API error (503) GET"));
    }

    #[tokio::test]
    async fn writes_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/widgets/issues/5/comments")
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let result = client(&server, 3)
            .create_issue_comment(&repo(), 5, "hi")
            .await;
        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reply_404_text_classifies_as_threading_limitation() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/repos/octo/widgets/pulls/5/comments/77/replies")
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let err = client(&server, 0)
            .create_review_comment_reply(&repo(), 5, 77, "thanks")
            .await
            .unwrap_err();
        let text = format!("{:#}", err);
        assert!(text.contains("(404) POST /repos/octo/widgets/pulls/5/comments/77/replies"));
        assert_eq!(classify(&text), ApiErrorKind::ThreadingLimitation);
    }

    #[tokio::test]
    async fn diff_is_requested_as_diff_and_parsed() {
        let diff = "\
diff --git a/test.go b/test.go
index 111..222 100644
--- a/test.go
+++ b/test.go
@@ -40,3 +40,4 @@ func x() {
 a
-b
+c
+d
 e
";
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/octo/widgets/pulls/5")
            .match_header("accept", DIFF_MEDIA_TYPE)
            .with_status(200)
            .with_body(diff)
            .create_async()
            .await;

        let parsed = client(&server, 0).fetch_pr_diff(&repo(), 5).await.unwrap();
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].filename, "test.go");
        assert_eq!(
            parsed.files[0].lines.iter().copied().collect::<Vec<_>>(),
            vec![40, 41, 42, 43]
        );
    }

    #[tokio::test]
    async fn review_is_posted_as_one_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/widgets/pulls/5/reviews")
            .match_body(Matcher::Json(json!({
                "event": "APPROVE",
                "comments": [{"path": "a.go", "line": 5, "side": "RIGHT", "body": "x"}]
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let review = ReviewInput {
            body: String::new(),
            event: ReviewEvent::Approve,
            comments: vec![crate::adapters::github::ReviewCommentInput {
                path: "a.go".into(),
                line: 5,
                start_line: None,
                body: "x".into(),
                side: crate::adapters::github::Side::Right,
                start_side: None,
            }],
        };
        client(&server, 0)
            .create_review(&repo(), 5, &review)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn pending_review_is_found_by_state() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/octo/widgets/pulls/5/reviews")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"id": 1, "state": "APPROVED"}, {"id": 2, "state": "PENDING"}]"#)
            .create_async()
            .await;

        let found = client(&server, 0).find_pending_review(&repo(), 5).await.unwrap();
        assert_eq!(found, Some(2));
    }

    #[tokio::test]
    async fn thread_lookup_uses_graphql() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(
                r#"{"data": {"repository": {"pullRequest": {"reviewThreads": {"nodes": [
                    {"id": "T1", "comments": {"nodes": [{"databaseId": 10}]}},
                    {"id": "T2", "comments": {"nodes": [{"databaseId": 77}, {"databaseId": 78}]}}
                ]}}}}}"#,
            )
            .create_async()
            .await;

        let thread = client(&server, 0)
            .find_review_thread_for_comment(&repo(), 5, 78)
            .await
            .unwrap();
        assert_eq!(thread, "T2");
    }

    #[tokio::test]
    async fn graphql_errors_are_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data": null, "errors": [{"message": "Resource not accessible"}]}"#)
            .create_async()
            .await;

        let err = client(&server, 0)
            .resolve_review_thread("T1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Resource not accessible"));
    }

    #[tokio::test]
    async fn remove_reaction_deletes_own_reaction() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user")
            .with_status(200)
            .with_body(r#"{"login": "me", "id": 5}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/widgets/issues/comments/9/reactions")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"id": 1, "content": "+1", "user": {"login": "other"}},
                    {"id": 2, "content": "+1", "user": {"login": "me"}}]"#,
            )
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/repos/octo/widgets/issues/comments/9/reactions/2")
            .with_status(204)
            .create_async()
            .await;

        client(&server, 0)
            .remove_reaction(&repo(), 9, CommentKind::Issue, Reaction::PlusOne)
            .await
            .unwrap();
        delete.assert_async().await;
    }
}
