use crate::adapters::github::{ApiComment, GitHubApi, Reaction, RepoRef, ReviewInput};
use crate::core::api_error::{describe, ApiError, FailureContext};
use crate::core::error::SubmitError;
use crate::core::planner::SubmissionPlan;
use crate::core::request::{CommentKind, ReviewEvent};
use anyhow::Result;
use std::fmt;
use tracing::{debug, info, warn};

/// What a submission actually posted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionReport {
    pub issue_comments: usize,
    pub review_comments: usize,
    pub review_event: Option<ReviewEvent>,
}

impl fmt::Display for SubmissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let review = match self.review_event {
            Some(event) => format!(
                "{} PR with a review of {} review comment{}",
                capitalize(event.past_tense()),
                self.review_comments,
                plural(self.review_comments)
            ),
            None => "no review, 0 review comments".to_string(),
        };
        write!(
            f,
            "{}; posted {} issue comment{}",
            review,
            self.issue_comments,
            plural(self.issue_comments)
        )
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Executes plans and single-comment actions against one pull request.
pub struct ReviewSubmitter<'a> {
    api: &'a dyn GitHubApi,
    repo: &'a RepoRef,
    pr: u64,
}

impl<'a> ReviewSubmitter<'a> {
    pub fn new(api: &'a dyn GitHubApi, repo: &'a RepoRef, pr: u64) -> Self {
        Self { api, repo, pr }
    }

    /// Issue comments go first, one call each, stopping at the first failure.
    /// The review follows as a single call carrying every review comment.
    pub async fn submit(&self, plan: &SubmissionPlan) -> Result<SubmissionReport, SubmitError> {
        let total = plan.issue_comments.len();
        for (i, comment) in plan.issue_comments.iter().enumerate() {
            debug!("Posting issue comment {}/{}", i + 1, total);
            if let Err(err) = self
                .api
                .create_issue_comment(self.repo, self.pr, &comment.body)
                .await
            {
                warn!("Issue comment {}/{} failed after {} succeeded", i + 1, total, i);
                return Err(SubmitError::IssueComment {
                    failed_index: i + 1,
                    succeeded: i,
                    total,
                    detail: describe(&err),
                });
            }
        }

        let mut report = SubmissionReport {
            issue_comments: total,
            ..SubmissionReport::default()
        };

        if let Some(review) = &plan.review {
            let input = ReviewInput {
                body: review.body.clone(),
                event: review.event,
                comments: review.comments.clone(),
            };
            info!(
                "Creating {} review with {} comments on {}#{}",
                review.event,
                review.comments.len(),
                self.repo,
                self.pr
            );
            self.api
                .create_review(self.repo, self.pr, &input)
                .await
                .map_err(|err| SubmitError::Review {
                    comments: review.comments.len(),
                    issue_comments_posted: total,
                    detail: describe(&err),
                })?;
            report.review_comments = review.comments.len();
            report.review_event = Some(review.event);
        }

        Ok(report)
    }

    /// Replies to a comment. Review comments get a threaded reply; issue
    /// comments cannot be threaded, so a new top-level comment is posted.
    pub async fn reply(
        &self,
        comment_id: u64,
        kind: CommentKind,
        body: &str,
    ) -> Result<ApiComment, ApiError> {
        let result = match kind {
            CommentKind::Review => {
                self.api
                    .create_review_comment_reply(self.repo, self.pr, comment_id, body)
                    .await
            }
            CommentKind::Issue => self.api.create_issue_comment(self.repo, self.pr, body).await,
        };

        match result {
            Ok(comment) => Ok(comment),
            Err(err) => {
                let context = FailureContext {
                    comment_id: Some(comment_id),
                    pr: Some(self.pr),
                    location: self.comment_location(comment_id, kind).await,
                };
                Err(ApiError::new("replying to comment", &err, &context))
            }
        }
    }

    /// Best effort `path:line` of a review comment, for remediation text.
    async fn comment_location(&self, comment_id: u64, kind: CommentKind) -> Option<String> {
        if kind != CommentKind::Review {
            return None;
        }
        match self.api.list_review_comments(self.repo, self.pr).await {
            Ok(comments) => comments
                .into_iter()
                .find(|c| c.id == comment_id)
                .and_then(|c| Some(format!("{}:{}", c.path?, c.line?))),
            Err(err) => {
                debug!("Could not look up comment {} location: {:#}", comment_id, err);
                None
            }
        }
    }

    pub async fn react(
        &self,
        comment_id: u64,
        kind: CommentKind,
        reaction: Reaction,
    ) -> Result<(), ApiError> {
        self.api
            .add_reaction(self.repo, comment_id, kind, reaction)
            .await
            .map_err(|err| ApiError::new("adding reaction", &err, &self.context(comment_id)))
    }

    pub async fn unreact(
        &self,
        comment_id: u64,
        kind: CommentKind,
        reaction: Reaction,
    ) -> Result<(), ApiError> {
        self.api
            .remove_reaction(self.repo, comment_id, kind, reaction)
            .await
            .map_err(|err| ApiError::new("removing reaction", &err, &self.context(comment_id)))
    }

    pub async fn edit(&self, comment_id: u64, kind: CommentKind, body: &str) -> Result<(), ApiError> {
        self.api
            .edit_comment(self.repo, comment_id, kind, body)
            .await
            .map_err(|err| ApiError::new("editing comment", &err, &self.context(comment_id)))
    }

    /// Resolves the review thread that contains `comment_id`.
    pub async fn resolve(&self, comment_id: u64) -> Result<(), ApiError> {
        let thread_id = self
            .api
            .find_review_thread_for_comment(self.repo, self.pr, comment_id)
            .await
            .map_err(|err| ApiError::new("finding review thread", &err, &self.context(comment_id)))?;
        debug!("Comment {} belongs to thread {}", comment_id, thread_id);
        self.api
            .resolve_review_thread(&thread_id)
            .await
            .map_err(|err| ApiError::new("resolving conversation", &err, &self.context(comment_id)))
    }

    /// Submits the caller's pending review, typically one started in the web UI.
    /// Returns the review id.
    pub async fn close_pending_review(&self, body: &str, event: ReviewEvent) -> Result<u64> {
        let context = FailureContext {
            pr: Some(self.pr),
            ..FailureContext::default()
        };
        let review_id = self
            .api
            .find_pending_review(self.repo, self.pr)
            .await
            .map_err(|err| ApiError::new("finding pending review", &err, &context))?
            .ok_or_else(|| anyhow::anyhow!("no pending review found on PR #{}", self.pr))?;

        self.api
            .submit_review(self.repo, self.pr, review_id, body, event)
            .await
            .map_err(|err| ApiError::new("submitting pending review", &err, &context))?;
        Ok(review_id)
    }

    fn context(&self, comment_id: u64) -> FailureContext {
        FailureContext {
            comment_id: Some(comment_id),
            pr: Some(self.pr),
            location: None,
        }
    }
}
