use crate::core::diff_index::DiffIndex;
use crate::core::error::DiffMismatch;
use crate::core::planner::Anchor;
use tracing::debug;

/// Checks anchors against the commentable lines of one pull request.
pub struct LineValidator<'a> {
    index: &'a DiffIndex,
    pr: Option<u64>,
}

impl<'a> LineValidator<'a> {
    pub fn new(index: &'a DiffIndex, pr: Option<u64>) -> Self {
        Self { index, pr }
    }

    /// Only the boundary lines of a range are checked, which is the same
    /// granularity GitHub enforces when it accepts a multi-line comment.
    /// A file present in the diff without any line data is accepted.
    pub fn validate(&self, path: &str, anchor: Anchor) -> Result<(), DiffMismatch> {
        let Some(lines) = self.index.lookup(path) else {
            return Err(DiffMismatch::FileNotFound {
                path: path.to_string(),
                available: self.index.files().map(str::to_string).collect(),
                pr: self.pr,
            });
        };

        if lines.is_empty() {
            debug!(
                "No line metadata for {}; skipping line validation for this file",
                path
            );
            return Ok(());
        }

        let boundaries: Vec<u32> = match anchor {
            Anchor::Line(line) => vec![line],
            Anchor::Range { start, end } if start == end => vec![start],
            Anchor::Range { start, end } => vec![start, end],
        };

        let missing: Vec<u32> = boundaries
            .into_iter()
            .filter(|line| !lines.contains(line))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DiffMismatch::LineNotInDiff {
                path: path.to_string(),
                lines: missing,
                available: self.index.ranges_for(path),
                pr: self.pr,
            })
        }
    }
}
