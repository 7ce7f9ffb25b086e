//! Turns raw comment requests into a submission plan.
//!
//! Planning is all-or-nothing: the first malformed item or the first item that
//! points outside the diff aborts with its 1-based position, and nothing is
//! returned for partial submission.

use crate::adapters::github::{ReviewCommentInput, Side};
use crate::core::diff_index::DiffIndex;
use crate::core::error::{PlanError, ValidationError, ValidationKind};
use crate::core::request::{
    parse_line, parse_range, validate_comment_body, validate_file_path, CommentKind,
    CommentRequest, ReviewEvent, ReviewSpec,
};
use crate::core::suggestion::{expand_suggestions, has_suggestion_markers};
use crate::core::validator::LineValidator;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Line(u32),
    Range { start: u32, end: u32 },
}

/// Knobs that used to be process-wide flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub validate: bool,
    pub expand_suggestions: bool,
    pub pr: Option<u64>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            validate: true,
            expand_suggestions: true,
            pr: None,
        }
    }
}

/// A request whose shape has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedComment {
    pub index: usize,
    pub target: Target,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Review { path: String, anchor: Anchor },
    Issue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPlan {
    pub body: String,
    pub event: ReviewEvent,
    pub comments: Vec<ReviewCommentInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueComment {
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionPlan {
    pub review: Option<ReviewPlan>,
    pub issue_comments: Vec<IssueComment>,
}

impl SubmissionPlan {
    pub fn review_comment_count(&self) -> usize {
        self.review.as_ref().map_or(0, |r| r.comments.len())
    }
}

pub struct CommentBatchPlanner {
    options: PlanOptions,
}

impl CommentBatchPlanner {
    pub fn new(options: PlanOptions) -> Self {
        Self { options }
    }

    /// Shape checks that need no diff: message, location, range, path.
    pub fn check_shapes(
        &self,
        requests: &[CommentRequest],
        review: &ReviewSpec,
    ) -> Result<Vec<CheckedComment>, ValidationError> {
        let review_body = review.body.as_deref().unwrap_or("");
        if requests.is_empty() && review_body.trim().is_empty() {
            return Err(ValidationError::new(
                ValidationKind::EmptyBatch,
                "batch must contain at least one comment or a review body",
            ));
        }
        validate_comment_body(review_body)?;

        requests
            .iter()
            .enumerate()
            .map(|(i, request)| {
                let target = Self::check_target(request).map_err(|err| err.at(i + 1))?;
                Ok(CheckedComment {
                    index: i + 1,
                    target,
                    message: request.message.clone(),
                })
            })
            .collect()
    }

    fn check_target(request: &CommentRequest) -> Result<Target, ValidationError> {
        if request.message.trim().is_empty() {
            return Err(ValidationError::new(
                ValidationKind::MissingMessage,
                "message is required",
            ));
        }
        validate_comment_body(&request.message)?;

        let target = match request.kind {
            CommentKind::Issue => {
                if request.file.is_some() || request.line.is_some() || request.range.is_some() {
                    warn!(
                        "Ignoring location {} on issue comment; issue comments are not anchored to lines",
                        request.location_label()
                    );
                }
                Target::Issue
            }
            CommentKind::Review => {
                let path = match request.file.as_deref().map(str::trim) {
                    Some(path) if !path.is_empty() => path.to_string(),
                    _ => {
                        return Err(ValidationError::new(
                            ValidationKind::MissingFile,
                            "file is required for review comments",
                        ))
                    }
                };
                validate_file_path(&path)?;

                let anchor = match (request.line, request.range.as_deref()) {
                    (Some(_), Some(_)) => {
                        return Err(ValidationError::new(
                            ValidationKind::ConflictingLocation,
                            "cannot specify both line and range",
                        ))
                    }
                    (None, None) => {
                        return Err(ValidationError::new(
                            ValidationKind::MissingLocation,
                            "either line or range is required",
                        ))
                    }
                    (Some(line), None) => Anchor::Line(parse_line(line)?),
                    (None, Some(range)) => {
                        let (start, end) = parse_range(range)?;
                        Anchor::Range { start, end }
                    }
                };

                Target::Review { path, anchor }
            }
        };

        Ok(target)
    }

    /// True when planning would consult a diff index.
    pub fn needs_diff(&self, checked: &[CheckedComment]) -> bool {
        self.options.validate
            && checked
                .iter()
                .any(|c| matches!(c.target, Target::Review { .. }))
    }

    /// Diff-validates, expands and assembles. `index` of `None` means the diff
    /// could not be obtained; line validation is then skipped.
    pub fn plan(
        &self,
        checked: Vec<CheckedComment>,
        review: &ReviewSpec,
        index: Option<&DiffIndex>,
    ) -> Result<SubmissionPlan, PlanError> {
        let validator = match (self.options.validate, index) {
            (true, Some(index)) => Some(LineValidator::new(index, self.options.pr)),
            (true, None) => {
                debug!("No diff index available; line validation skipped");
                None
            }
            (false, _) => None,
        };

        let mut review_comments = Vec::new();
        let mut issue_comments = Vec::new();

        for comment in checked {
            let body = self.render_body(&comment.message);
            match comment.target {
                Target::Issue => issue_comments.push(IssueComment { body }),
                Target::Review { path, anchor } => {
                    if let Some(validator) = &validator {
                        validator.validate(&path, anchor).map_err(|source| {
                            PlanError::DiffMismatch {
                                item_index: comment.index,
                                source,
                            }
                        })?;
                    }
                    review_comments.push(review_comment(path, anchor, body));
                }
            }
        }

        let review_body = review.body.clone().unwrap_or_default();
        let review = if !review_body.trim().is_empty() || !review_comments.is_empty() {
            Some(ReviewPlan {
                body: review_body,
                event: review.event.unwrap_or(ReviewEvent::Comment),
                comments: review_comments,
            })
        } else {
            None
        };

        Ok(SubmissionPlan {
            review,
            issue_comments,
        })
    }

    /// Shape check followed by planning, for callers that already hold the
    /// diff index (or know they will not validate).
    pub fn plan_batch(
        &self,
        requests: &[CommentRequest],
        review: &ReviewSpec,
        index: Option<&DiffIndex>,
    ) -> Result<SubmissionPlan, PlanError> {
        let checked = self.check_shapes(requests, review)?;
        self.plan(checked, review, index)
    }

    fn render_body(&self, message: &str) -> String {
        if self.options.expand_suggestions && has_suggestion_markers(message) {
            expand_suggestions(message)
        } else {
            message.to_string()
        }
    }
}

fn review_comment(path: String, anchor: Anchor, body: String) -> ReviewCommentInput {
    let (start_line, line) = match anchor {
        Anchor::Line(line) => (None, line),
        Anchor::Range { start, end } if start == end => (None, end),
        Anchor::Range { start, end } => (Some(start), end),
    };
    ReviewCommentInput {
        path,
        line,
        start_line,
        body,
        side: Side::Right,
        start_side: start_line.map(|_| Side::Right),
    }
}
