//! The review flow shared by `review`, `batch` and `add`.

use crate::adapters::github::{GitHubApi, RepoRef};
use crate::core::diff_index::DiffIndex;
use crate::core::error::PlanError;
use crate::core::planner::{CommentBatchPlanner, PlanOptions, SubmissionPlan};
use crate::core::request::{CommentRequest, ReviewSpec};
use crate::core::submitter::{ReviewSubmitter, SubmissionReport};
use anyhow::Result;
use tracing::{debug, warn};

/// Shape checks, then diff validation when a client is available.
///
/// A failed diff fetch does not abort: validation is skipped and the plan is
/// built as if `validate` were off. Nothing is posted here.
pub async fn prepare_plan(
    api: Option<&dyn GitHubApi>,
    repo: &RepoRef,
    pr: u64,
    options: PlanOptions,
    requests: &[CommentRequest],
    review: &ReviewSpec,
) -> Result<SubmissionPlan, PlanError> {
    let planner = CommentBatchPlanner::new(options);
    let checked = planner.check_shapes(requests, review)?;

    let index = match api {
        Some(api) if planner.needs_diff(&checked) => match api.fetch_pr_diff(repo, pr).await {
            Ok(diff) => Some(DiffIndex::from_pr_diff(&diff)),
            Err(err) => {
                warn!(
                    "Could not fetch PR diff for validation: {:#}; skipping line validation",
                    err
                );
                None
            }
        },
        _ => None,
    };

    planner.plan(checked, review, index.as_ref())
}

/// Plans and submits. Planning errors leave the PR untouched.
pub async fn submit_requests(
    api: &dyn GitHubApi,
    repo: &RepoRef,
    pr: u64,
    options: PlanOptions,
    requests: &[CommentRequest],
    review: &ReviewSpec,
) -> Result<SubmissionReport> {
    let plan = prepare_plan(Some(api), repo, pr, options, requests, review).await?;

    match api.get_pr_details(repo, pr).await {
        Ok(details) if details.state != "open" => {
            warn!("PR #{} ({}) is {}; posting anyway", pr, details.title, details.state)
        }
        Ok(details) => debug!("Submitting to PR #{}: {} ({})", pr, details.title, details.head_sha),
        Err(err) => debug!("Could not fetch PR #{} details: {:#}", pr, err),
    }

    let report = ReviewSubmitter::new(api, repo, pr).submit(&plan).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::github::{DiffFile, PullRequestDiff};
    use crate::adapters::mock::{Call, MockGitHub};
    use crate::core::error::DiffMismatch;
    use crate::core::request::ReviewEvent;

    fn repo() -> RepoRef {
        RepoRef::new("octo", "widgets")
    }

    fn diff_with(path: &str, lines: &[u32]) -> PullRequestDiff {
        PullRequestDiff {
            files: vec![DiffFile {
                filename: path.to_string(),
                lines: lines.iter().copied().collect(),
            }],
        }
    }

    fn options() -> PlanOptions {
        PlanOptions {
            pr: Some(7),
            ..PlanOptions::default()
        }
    }

    #[tokio::test]
    async fn failed_diff_fetch_still_submits() {
        let api = MockGitHub::new().failing("fetch_pr_diff", "GitHub API error (500) GET /diff: boom");
        let requests = vec![CommentRequest::review("a.go", 99, "x")];

        let report = submit_requests(&api, &repo(), 7, options(), &requests, &ReviewSpec::default())
            .await
            .unwrap();

        assert_eq!(report.review_comments, 1);
        let calls = api.calls();
        assert_eq!(calls[0], Call::FetchPrDiff);
        assert!(matches!(calls.last(), Some(Call::CreateReview(review)) if review.comments[0].line == 99));
    }

    #[tokio::test]
    async fn line_outside_diff_posts_nothing() {
        let api = MockGitHub {
            diff: diff_with("test.go", &[42, 43]),
            ..MockGitHub::new()
        };
        let requests = vec![
            CommentRequest::issue("general"),
            CommentRequest::review("test.go", 44, "x"),
        ];

        let err = submit_requests(&api, &repo(), 7, options(), &requests, &ReviewSpec::default())
            .await
            .unwrap_err();

        match err.downcast_ref::<PlanError>() {
            Some(PlanError::DiffMismatch {
                item_index,
                source: DiffMismatch::LineNotInDiff { .. },
            }) => assert_eq!(*item_index, 2),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("42-43"));
        assert_eq!(api.calls(), vec![Call::FetchPrDiff]);
    }

    #[tokio::test]
    async fn validation_off_skips_diff_fetch() {
        let api = MockGitHub::new();
        let requests = vec![CommentRequest::review("a.go", 5, "x")];
        let review = ReviewSpec {
            body: None,
            event: Some(ReviewEvent::Approve),
        };
        let options = PlanOptions {
            validate: false,
            ..options()
        };

        let plan = prepare_plan(Some(&api), &repo(), 7, options, &requests, &review)
            .await
            .unwrap();

        assert_eq!(plan.review.map(|r| r.event), Some(ReviewEvent::Approve));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn dry_run_without_client_plans_unvalidated() {
        let requests = vec![CommentRequest::review_range("src/x.go", "10-15", "fix")];
        let plan = prepare_plan(None, &repo(), 7, options(), &requests, &ReviewSpec::default())
            .await
            .unwrap();

        let review = plan.review.unwrap();
        assert_eq!(review.comments[0].start_line, Some(10));
        assert_eq!(review.comments[0].line, 15);
    }
}
