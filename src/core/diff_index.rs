use crate::adapters::github::PullRequestDiff;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Commentable lines per file for one pull request.
///
/// A file that appears in the diff with no line metadata (binary files, pure
/// renames, some newly added files) is kept with an empty set so callers can
/// tell "present but unknown" apart from "not in this PR".
#[derive(Debug, Clone, Default)]
pub struct DiffIndex {
    files: HashMap<String, BTreeSet<u32>>,
    order: Vec<String>,
}

impl DiffIndex {
    pub fn from_pr_diff(diff: &PullRequestDiff) -> Self {
        let mut index = Self::default();
        for file in &diff.files {
            index.insert(&file.filename, file.lines.iter().copied());
        }
        index
    }

    pub fn insert(&mut self, path: &str, lines: impl IntoIterator<Item = u32>) {
        if !self.files.contains_key(path) {
            self.order.push(path.to_string());
        }
        self.files.entry(path.to_string()).or_default().extend(lines);
    }

    pub fn lookup(&self, path: &str) -> Option<&BTreeSet<u32>> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str, line: u32) -> bool {
        self.files
            .get(path)
            .map_or(false, |lines| lines.contains(&line))
    }

    /// File paths in diff order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ranges_for(&self, path: &str) -> Vec<LineRange> {
        self.lookup(path)
            .map(|lines| group_consecutive_lines(lines.iter().copied()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Collapses ascending line numbers into contiguous runs. Display only.
pub fn group_consecutive_lines(lines: impl IntoIterator<Item = u32>) -> Vec<LineRange> {
    let mut ranges: Vec<LineRange> = Vec::new();
    for line in lines {
        match ranges.last_mut() {
            Some(last) if line == last.end + 1 => last.end = line,
            _ => ranges.push(LineRange {
                start: line,
                end: line,
            }),
        }
    }
    ranges
}

pub fn format_ranges(ranges: &[LineRange]) -> String {
    ranges
        .iter()
        .map(LineRange::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
