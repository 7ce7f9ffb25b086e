//! Error taxonomy for planning and submission.
//!
//! Validation and diff-mismatch errors are raised before any network call and
//! guarantee that nothing was posted. Submission errors carry how far the run
//! got so partial success is never hidden.

use crate::core::diff_index::{format_ranges, LineRange};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    EmptyBatch,
    MissingFile,
    MissingMessage,
    MissingLocation,
    ConflictingLocation,
    InvalidLine,
    InvalidRange,
    InvalidPath,
    BodyTooLong,
    InvalidType,
    InvalidEvent,
    InvalidSpec,
    InvalidRepository,
}

/// A request that is malformed on its own, independent of any diff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    /// 1-based position of the offending item, when the error is item-specific.
    pub item_index: Option<usize>,
    pub kind: ValidationKind,
    pub detail: String,
}

impl ValidationError {
    pub fn new(kind: ValidationKind, detail: impl Into<String>) -> Self {
        Self {
            item_index: None,
            kind,
            detail: detail.into(),
        }
    }

    pub fn at(mut self, item_index: usize) -> Self {
        self.item_index = Some(item_index);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item_index {
            Some(index) => write!(f, "comment {}: {}", index, self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

/// A well-formed request that points outside the pull request's diff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffMismatch {
    FileNotFound {
        path: String,
        available: Vec<String>,
        pr: Option<u64>,
    },
    LineNotInDiff {
        path: String,
        lines: Vec<u32>,
        available: Vec<LineRange>,
        pr: Option<u64>,
    },
}

impl fmt::Display for DiffMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffMismatch::FileNotFound {
                path,
                available,
                pr,
            } => {
                write!(f, "file '{}' not found in {} diff", path, pr_label(*pr))?;
                if !available.is_empty() {
                    f.write_str("\n\nAvailable files in this PR:\n")?;
                    for file in available {
                        writeln!(f, "  • {}", file)?;
                    }
                    write!(
                        f,
                        "\nTip: Use 'ghcomment lines {} <file>' to see commentable lines",
                        pr_arg(*pr)
                    )?;
                }
                Ok(())
            }
            DiffMismatch::LineNotInDiff {
                path,
                lines,
                available,
                pr,
            } => {
                let listed = lines
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "line(s) [{}] do not exist in diff for file '{}'",
                    listed, path
                )?;
                if available.is_empty() {
                    write!(
                        f,
                        "\n\nNo commentable lines found in '{}' - file may not have changes in this PR",
                        path
                    )
                } else {
                    write!(
                        f,
                        "\n\nAvailable lines for comments: {}\n\nTip: Use 'ghcomment lines {} {}' to see detailed line information",
                        format_ranges(available),
                        pr_arg(*pr),
                        path
                    )
                }
            }
        }
    }
}

fn pr_label(pr: Option<u64>) -> String {
    match pr {
        Some(number) => format!("PR #{}", number),
        None => "PR".to_string(),
    }
}

fn pr_arg(pr: Option<u64>) -> String {
    match pr {
        Some(number) => number.to_string(),
        None => "<pr>".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("comment {item_index} validation failed: {source}")]
    DiffMismatch {
        item_index: usize,
        #[source]
        source: DiffMismatch,
    },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(
        "failed to create issue comment {failed_index} of {total} ({succeeded} succeeded before the failure): {detail}"
    )]
    IssueComment {
        failed_index: usize,
        succeeded: usize,
        total: usize,
        detail: String,
    },

    #[error("failed to create review with {comments} comments: {detail}")]
    Review {
        comments: usize,
        issue_comments_posted: usize,
        detail: String,
    },
}
