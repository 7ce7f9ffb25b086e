use crate::core::request::{CommentKind, ReviewEvent};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub id: u64,
}

/// A comment as GitHub reports it, for either comment kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: User,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub start_line: Option<u32>,
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestDiff {
    pub files: Vec<DiffFile>,
}

/// One changed file with the RIGHT-side line numbers that accept comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffFile {
    pub filename: String,
    pub lines: BTreeSet<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewCommentInput {
    pub path: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    pub body: String,
    pub side: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_side: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    pub event: ReviewEvent,
    pub comments: Vec<ReviewCommentInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrDetails {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author: String,
    pub head_ref: String,
    pub head_sha: String,
    pub base_ref: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    PlusOne,
    MinusOne,
    Laugh,
    Confused,
    Heart,
    Hooray,
    Rocket,
    Eyes,
}

impl Reaction {
    pub const NAMES: &'static str = "+1, -1, laugh, confused, heart, hooray, rocket, eyes";

    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::PlusOne => "+1",
            Reaction::MinusOne => "-1",
            Reaction::Laugh => "laugh",
            Reaction::Confused => "confused",
            Reaction::Heart => "heart",
            Reaction::Hooray => "hooray",
            Reaction::Rocket => "rocket",
            Reaction::Eyes => "eyes",
        }
    }
}

impl FromStr for Reaction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "+1" | "thumbsup" => Ok(Reaction::PlusOne),
            "-1" | "thumbsdown" => Ok(Reaction::MinusOne),
            "laugh" => Ok(Reaction::Laugh),
            "confused" => Ok(Reaction::Confused),
            "heart" => Ok(Reaction::Heart),
            "hooray" => Ok(Reaction::Hooray),
            "rocket" => Ok(Reaction::Rocket),
            "eyes" => Ok(Reaction::Eyes),
            other => anyhow::bail!("invalid reaction '{}': must be one of {}", other, Self::NAMES),
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the tool needs from GitHub. Failures are opaque text; callers
/// only pattern-match on it.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn list_issue_comments(&self, repo: &RepoRef, pr: u64) -> Result<Vec<ApiComment>>;

    async fn list_review_comments(&self, repo: &RepoRef, pr: u64) -> Result<Vec<ApiComment>>;

    async fn create_issue_comment(&self, repo: &RepoRef, pr: u64, body: &str) -> Result<ApiComment>;

    async fn create_review_comment_reply(
        &self,
        repo: &RepoRef,
        pr: u64,
        comment_id: u64,
        body: &str,
    ) -> Result<ApiComment>;

    async fn add_reaction(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        kind: CommentKind,
        reaction: Reaction,
    ) -> Result<()>;

    async fn remove_reaction(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        kind: CommentKind,
        reaction: Reaction,
    ) -> Result<()>;

    async fn edit_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        kind: CommentKind,
        body: &str,
    ) -> Result<()>;

    async fn fetch_pr_diff(&self, repo: &RepoRef, pr: u64) -> Result<PullRequestDiff>;

    async fn create_review(&self, repo: &RepoRef, pr: u64, review: &ReviewInput) -> Result<()>;

    async fn get_pr_details(&self, repo: &RepoRef, pr: u64) -> Result<PrDetails>;

    /// Id of the caller's pending review on the PR, if one exists.
    async fn find_pending_review(&self, repo: &RepoRef, pr: u64) -> Result<Option<u64>>;

    async fn submit_review(
        &self,
        repo: &RepoRef,
        pr: u64,
        review_id: u64,
        body: &str,
        event: ReviewEvent,
    ) -> Result<()>;

    async fn find_review_thread_for_comment(
        &self,
        repo: &RepoRef,
        pr: u64,
        comment_id: u64,
    ) -> Result<String>;

    async fn resolve_review_thread(&self, thread_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_input_serializes_github_shape() {
        let review = ReviewInput {
            body: String::new(),
            event: ReviewEvent::RequestChanges,
            comments: vec![ReviewCommentInput {
                path: "src/x.go".into(),
                line: 15,
                start_line: Some(10),
                body: "fix".into(),
                side: Side::Right,
                start_side: Some(Side::Right),
            }],
        };
        let json = serde_json::to_value(&review).unwrap();
        assert!(json.get("body").is_none());
        assert_eq!(json["event"], "REQUEST_CHANGES");
        assert_eq!(json["comments"][0]["start_line"], 10);
        assert_eq!(json["comments"][0]["side"], "RIGHT");
    }

    #[test]
    fn single_line_comment_omits_start_fields() {
        let comment = ReviewCommentInput {
            path: "a.go".into(),
            line: 5,
            start_line: None,
            body: "x".into(),
            side: Side::Right,
            start_side: None,
        };
        let json = serde_json::to_value(&comment).unwrap();
        assert!(json.get("start_line").is_none());
        assert!(json.get("start_side").is_none());
    }

    #[test]
    fn reaction_names_round_trip() {
        for name in Reaction::NAMES.split(", ") {
            assert_eq!(name.parse::<Reaction>().unwrap().as_str(), name);
        }
        assert!("party".parse::<Reaction>().is_err());
    }
}
