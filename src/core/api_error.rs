//! Post-hoc classification of opaque GitHub failures.
//!
//! The collaborator only hands back text. Known signatures get actionable
//! remediation; everything else is wrapped with the attempted operation and,
//! when the HTTP status is recognisable, a one-line hint.

use crate::core::request::CommentKind;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Replying into a thread GitHub refuses to extend, typically one that
    /// started in a web UI pending review.
    ThreadingLimitation,
    /// The comment id exists, but under the other comment kind.
    TypeMismatch { attempted: CommentKind },
    Generic,
}

/// What is known about the failing call, used to make the hints concrete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureContext {
    pub comment_id: Option<u64>,
    pub pr: Option<u64>,
    /// `path:line` of the comment being replied to, when it could be looked up.
    pub location: Option<String>,
}

#[derive(Debug, Error)]
pub struct ApiError {
    pub operation: String,
    pub kind: ApiErrorKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl ApiError {
    pub fn new(operation: &str, err: &anyhow::Error, context: &FailureContext) -> Self {
        let message = format!("{:#}", err);
        let kind = classify(&message);
        let suggestions = remediation(kind, &message, context);
        Self {
            operation: operation.to_string(),
            kind,
            message,
            suggestions,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ApiErrorKind::ThreadingLimitation => write!(
                f,
                "GitHub does not allow replying to this comment during {}: {}",
                self.operation, self.message
            )?,
            ApiErrorKind::TypeMismatch { attempted } => write!(
                f,
                "{} comment not found during {}: {}",
                attempted, self.operation, self.message
            )?,
            ApiErrorKind::Generic => write!(
                f,
                "GitHub API error during {}: {}",
                self.operation, self.message
            )?,
        }

        if !self.suggestions.is_empty() {
            f.write_str("\n\n💡 Suggestions:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n  • {}", suggestion)?;
            }
        }
        Ok(())
    }
}

pub fn classify(text: &str) -> ApiErrorKind {
    let lower = text.to_lowercase();
    let not_found = lower.contains("404") || lower.contains("not found");

    if (not_found && lower.contains("/replies"))
        || (lower.contains("in_reply_to") && lower.contains("not permitted"))
    {
        return ApiErrorKind::ThreadingLimitation;
    }

    if lower.contains("404") {
        if lower.contains("pulls/comments") {
            return ApiErrorKind::TypeMismatch {
                attempted: CommentKind::Review,
            };
        }
        if lower.contains("issues/comments") {
            return ApiErrorKind::TypeMismatch {
                attempted: CommentKind::Issue,
            };
        }
    }

    ApiErrorKind::Generic
}

/// One-line hint keyed on the HTTP status visible in the error text.
pub fn status_hint(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["(401)", "401 ", "unauthorized", "bad credentials"]) {
        Some("Authentication failed: set GITHUB_TOKEN or run 'gh auth login'")
    } else if has(&["(403)", "403 ", "forbidden"]) {
        Some("Permission denied: check that your token has write access to this repository")
    } else if has(&["(429)", "rate limit", "too many requests"]) {
        Some("Rate limit exceeded: wait a few minutes before trying again")
    } else if has(&["(422)", "unprocessable", "validation failed"]) {
        Some("GitHub rejected the request: use 'ghcomment lines <pr> <file>' to check that every line is part of the diff")
    } else if has(&["(404)", "404 ", "not found"]) {
        Some("Not found: verify the repository, PR number and comment id")
    } else if has(&["(500)", "(502)", "(503)", "(504)", "server error", "bad gateway"]) {
        Some("GitHub server error: this is usually temporary, try again shortly")
    } else {
        None
    }
}

/// Error text with the status hint appended, for places that only carry a
/// string detail.
pub fn describe(err: &anyhow::Error) -> String {
    let text = format!("{:#}", err);
    match status_hint(&text) {
        Some(hint) => format!("{}\n\n💡 {}", text, hint),
        None => text,
    }
}

fn remediation(kind: ApiErrorKind, text: &str, context: &FailureContext) -> Vec<String> {
    let id = context
        .comment_id
        .map_or_else(|| "<comment-id>".to_string(), |id| id.to_string());
    let pr = context
        .pr
        .map_or_else(|| "<pr>".to_string(), |pr| pr.to_string());

    match kind {
        ApiErrorKind::ThreadingLimitation => {
            let location = context
                .location
                .clone()
                .unwrap_or_else(|| "<file>:<line>".to_string());
            vec![
                "The comment most likely belongs to a review started in GitHub's web UI; GitHub returns 404 for API replies to those threads".to_string(),
                format!(
                    "Add a new comment at the same location: ghcomment review {} --comment '{}:<message>'",
                    pr, location
                ),
                format!("React instead: ghcomment reply {} --reaction +1", id),
                format!(
                    "Resolve the conversation, which often works even when replying does not: ghcomment reply {} --resolve",
                    id
                ),
            ]
        }
        ApiErrorKind::TypeMismatch { attempted } => {
            let other = match attempted {
                CommentKind::Review => CommentKind::Issue,
                CommentKind::Issue => CommentKind::Review,
            };
            vec![
                format!(
                    "Comment #{} may be a {} comment rather than a {} comment",
                    id, other, attempted
                ),
                format!("Run 'ghcomment list {}' to see each comment's type", pr),
                format!("Retry with --type {}", other),
            ]
        }
        ApiErrorKind::Generic => status_hint(text).map(str::to_string).into_iter().collect(),
    }
}
