use crate::adapters::github::{
    ApiComment, GitHubApi, PrDetails, PullRequestDiff, Reaction, RepoRef, ReviewInput, User,
};
use crate::core::request::{CommentKind, ReviewEvent};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListIssueComments,
    ListReviewComments,
    CreateIssueComment(String),
    CreateReviewCommentReply(u64, String),
    AddReaction(u64, CommentKind, Reaction),
    RemoveReaction(u64, CommentKind, Reaction),
    EditComment(u64, CommentKind, String),
    FetchPrDiff,
    CreateReview(ReviewInput),
    GetPrDetails,
    FindPendingReview,
    SubmitReview(u64, String, ReviewEvent),
    FindReviewThread(u64),
    ResolveReviewThread(String),
}

/// In-memory GitHub that records every call. Failures are keyed by the
/// operation name; `issue_comment_failure_at` fails the Nth (1-based)
/// issue comment only.
#[derive(Default)]
pub struct MockGitHub {
    pub issue_comments: Vec<ApiComment>,
    pub review_comments: Vec<ApiComment>,
    pub diff: PullRequestDiff,
    pub pending_review: Option<u64>,
    pub threads: HashMap<u64, String>,
    pub failures: HashMap<&'static str, String>,
    pub issue_comment_failure_at: Option<usize>,
    pub list_delay: Option<Duration>,
    pub log: Mutex<Vec<Call>>,
}

impl MockGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, operation: &'static str, message: &str) -> Self {
        self.failures.insert(operation, message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        match self.failures.get(operation) {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn timestamp(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
}

pub fn comment(id: u64, author: &str, body: &str, day: u32) -> ApiComment {
    ApiComment {
        id,
        body: body.to_string(),
        user: User {
            login: author.to_string(),
            id,
        },
        created_at: timestamp(day),
        updated_at: timestamp(day),
        path: None,
        line: None,
        start_line: None,
        commit_id: None,
        html_url: None,
    }
}

pub fn review_comment(id: u64, author: &str, path: &str, line: u32, day: u32) -> ApiComment {
    ApiComment {
        path: Some(path.to_string()),
        line: Some(line),
        ..comment(id, author, "inline", day)
    }
}

#[async_trait]
impl GitHubApi for MockGitHub {
    async fn list_issue_comments(&self, _repo: &RepoRef, _pr: u64) -> Result<Vec<ApiComment>> {
        self.record(Call::ListIssueComments);
        self.pause().await;
        self.check("list_issue_comments")?;
        Ok(self.issue_comments.clone())
    }

    async fn list_review_comments(&self, _repo: &RepoRef, _pr: u64) -> Result<Vec<ApiComment>> {
        self.record(Call::ListReviewComments);
        self.pause().await;
        self.check("list_review_comments")?;
        Ok(self.review_comments.clone())
    }

    async fn create_issue_comment(&self, _repo: &RepoRef, _pr: u64, body: &str) -> Result<ApiComment> {
        self.record(Call::CreateIssueComment(body.to_string()));
        let attempt = self
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::CreateIssueComment(_)))
            .count();
        if self.issue_comment_failure_at == Some(attempt) {
            return Err(anyhow!(
                "GitHub API error (500) POST /repos/o/r/issues/1/comments: boom"
            ));
        }
        self.check("create_issue_comment")?;
        Ok(comment(1000 + attempt as u64, "me", body, 1))
    }

    async fn create_review_comment_reply(
        &self,
        _repo: &RepoRef,
        _pr: u64,
        comment_id: u64,
        body: &str,
    ) -> Result<ApiComment> {
        self.record(Call::CreateReviewCommentReply(comment_id, body.to_string()));
        self.check("create_review_comment_reply")?;
        Ok(comment(2000, "me", body, 1))
    }

    async fn add_reaction(
        &self,
        _repo: &RepoRef,
        comment_id: u64,
        kind: CommentKind,
        reaction: Reaction,
    ) -> Result<()> {
        self.record(Call::AddReaction(comment_id, kind, reaction));
        self.check("add_reaction")
    }

    async fn remove_reaction(
        &self,
        _repo: &RepoRef,
        comment_id: u64,
        kind: CommentKind,
        reaction: Reaction,
    ) -> Result<()> {
        self.record(Call::RemoveReaction(comment_id, kind, reaction));
        self.check("remove_reaction")
    }

    async fn edit_comment(
        &self,
        _repo: &RepoRef,
        comment_id: u64,
        kind: CommentKind,
        body: &str,
    ) -> Result<()> {
        self.record(Call::EditComment(comment_id, kind, body.to_string()));
        self.check("edit_comment")
    }

    async fn fetch_pr_diff(&self, _repo: &RepoRef, _pr: u64) -> Result<PullRequestDiff> {
        self.record(Call::FetchPrDiff);
        self.check("fetch_pr_diff")?;
        Ok(self.diff.clone())
    }

    async fn create_review(&self, _repo: &RepoRef, _pr: u64, review: &ReviewInput) -> Result<()> {
        self.record(Call::CreateReview(review.clone()));
        self.check("create_review")
    }

    async fn get_pr_details(&self, _repo: &RepoRef, pr: u64) -> Result<PrDetails> {
        self.record(Call::GetPrDetails);
        self.check("get_pr_details")?;
        Ok(PrDetails {
            number: pr,
            title: "Test PR".into(),
            state: "open".into(),
            ..PrDetails::default()
        })
    }

    async fn find_pending_review(&self, _repo: &RepoRef, _pr: u64) -> Result<Option<u64>> {
        self.record(Call::FindPendingReview);
        self.check("find_pending_review")?;
        Ok(self.pending_review)
    }

    async fn submit_review(
        &self,
        _repo: &RepoRef,
        _pr: u64,
        review_id: u64,
        body: &str,
        event: ReviewEvent,
    ) -> Result<()> {
        self.record(Call::SubmitReview(review_id, body.to_string(), event));
        self.check("submit_review")
    }

    async fn find_review_thread_for_comment(
        &self,
        _repo: &RepoRef,
        _pr: u64,
        comment_id: u64,
    ) -> Result<String> {
        self.record(Call::FindReviewThread(comment_id));
        self.check("find_review_thread_for_comment")?;
        self.threads
            .get(&comment_id)
            .cloned()
            .ok_or_else(|| anyhow!("no review thread found for comment {}", comment_id))
    }

    async fn resolve_review_thread(&self, thread_id: &str) -> Result<()> {
        self.record(Call::ResolveReviewThread(thread_id.to_string()));
        self.check("resolve_review_thread")
    }
}
