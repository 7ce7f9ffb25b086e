use crate::adapters::github::{ApiComment, GitHubApi, RepoRef};
use crate::core::filter::{ListedComment, StringPool};
use crate::core::request::CommentKind;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Fetches both comment kinds concurrently under one deadline. Any failure or
/// the deadline discards both results; the first error observed is returned.
pub async fn fetch_all_comments(
    api: Arc<dyn GitHubApi>,
    repo: &RepoRef,
    pr: u64,
    timeout: Duration,
    pool: &StringPool,
) -> Result<Vec<ListedComment>> {
    let issue_task: JoinHandle<Result<Vec<ApiComment>>> = {
        let api = Arc::clone(&api);
        let repo = repo.clone();
        tokio::spawn(async move { api.list_issue_comments(&repo, pr).await })
    };
    let review_task: JoinHandle<Result<Vec<ApiComment>>> = {
        let api = Arc::clone(&api);
        let repo = repo.clone();
        tokio::spawn(async move { api.list_review_comments(&repo, pr).await })
    };
    let aborts = [issue_task.abort_handle(), review_task.abort_handle()];

    let joined = tokio::time::timeout(timeout, async {
        tokio::try_join!(
            flatten(issue_task, "issue comments"),
            flatten(review_task, "review comments")
        )
    })
    .await;

    let (issues, reviews) = match joined {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "timed out after {}s fetching comments for PR #{}",
            timeout.as_secs(),
            pr
        )),
    }
    .map_err(|err| {
        for handle in &aborts {
            handle.abort();
        }
        err
    })?;

    debug!(
        "Fetched {} issue and {} review comments for {}#{}",
        issues.len(),
        reviews.len(),
        repo,
        pr
    );

    let mut comments: Vec<ListedComment> = issues
        .into_iter()
        .map(|c| to_listed(c, CommentKind::Issue, pool))
        .chain(reviews.into_iter().map(|c| to_listed(c, CommentKind::Review, pool)))
        .collect();
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(comments)
}

async fn flatten<T>(handle: JoinHandle<Result<T>>, what: &str) -> Result<T> {
    handle
        .await
        .with_context(|| format!("task fetching {} did not complete", what))?
        .with_context(|| format!("failed to fetch {}", what))
}

fn to_listed(comment: ApiComment, kind: CommentKind, pool: &StringPool) -> ListedComment {
    ListedComment {
        id: comment.id,
        kind,
        author: pool.intern(&comment.user.login),
        body: comment.body,
        created_at: comment.created_at,
        path: comment.path.as_deref().map(|p| pool.intern(p)),
        line: comment.line,
        commit_id: comment.commit_id.as_deref().map(|c| pool.intern(c)),
        html_url: comment.html_url,
        resolved: false,
    }
}

pub fn render_text(comments: &[ListedComment], pr: u64, now: DateTime<Utc>) -> String {
    if comments.is_empty() {
        return format!("No comments found on PR #{}\n", pr);
    }

    let review_count = comments
        .iter()
        .filter(|c| c.kind == CommentKind::Review)
        .count();
    let mut out = format!(
        "📝 Comments on PR #{} ({} total: {} review, {} issue)\n\n",
        pr,
        comments.len(),
        review_count,
        comments.len() - review_count
    );

    for comment in comments {
        let location = match (comment.kind, comment.path.as_deref(), comment.line) {
            (CommentKind::Review, Some(path), Some(line)) => format!("[📋 Review: {}:{}]", path, line),
            (CommentKind::Review, _, _) => "[📋 Review]".to_string(),
            (CommentKind::Issue, _, _) => "[💬 Issue]".to_string(),
        };
        out.push_str(&format!(
            "🔹 ID:{} • {} • {} • {}\n",
            comment.id,
            comment.author,
            time_ago(comment.created_at, now),
            location
        ));

        let body = comment.body.trim();
        let body = if body.is_empty() { "(empty comment)" } else { body };
        for line in body.lines() {
            out.push_str("   ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct JsonListing<'a> {
    pr: u64,
    total: usize,
    comments: Vec<JsonComment<'a>>,
}

#[derive(Serialize)]
struct JsonComment<'a> {
    id: u64,
    #[serde(rename = "type")]
    kind: CommentKind,
    author: &'a str,
    body: &'a str,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_url: Option<&'a str>,
}

pub fn render_json(comments: &[ListedComment], pr: u64) -> Result<String> {
    let listing = JsonListing {
        pr,
        total: comments.len(),
        comments: comments
            .iter()
            .map(|c| JsonComment {
                id: c.id,
                kind: c.kind,
                author: &c.author,
                body: &c.body,
                created_at: c.created_at,
                path: c.path.as_deref(),
                line: c.line,
                commit_id: c.commit_id.as_deref(),
                html_url: c.html_url.as_deref(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&listing).context("failed to serialize comments")
}

fn time_ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    let unit = |n: i64, name: &str| {
        if n == 1 {
            format!("1 {} ago", name)
        } else {
            format!("{} {}s ago", n, name)
        }
    };

    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        unit(elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        unit(elapsed.num_hours(), "hour")
    } else if elapsed.num_days() < 7 {
        unit(elapsed.num_days(), "day")
    } else {
        at.format("%b %-d, %Y").to_string()
    }
}
