use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    pub hunks: Vec<DiffHunk>,
    pub is_binary: bool,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub changes: Vec<DiffLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffLine {
    pub old_line_no: Option<u32>,
    pub new_line_no: Option<u32>,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Removed,
    Context,
}

impl FileDiff {
    /// Lines on the RIGHT side of the diff that accept a review comment:
    /// every added line plus every context line, numbered in the new file.
    pub fn commentable_lines(&self) -> BTreeSet<u32> {
        self.hunks
            .iter()
            .flat_map(|hunk| hunk.changes.iter())
            .filter(|line| line.change_type != ChangeType::Removed)
            .filter_map(|line| line.new_line_no)
            .collect()
    }
}

pub struct DiffParser;

impl DiffParser {
    pub fn parse_unified_diff(diff_content: &str) -> Result<Vec<FileDiff>> {
        let mut diffs = Vec::new();
        let lines: Vec<&str> = diff_content.lines().collect();
        let mut i = 0;

        while i < lines.len() {
            if lines[i].starts_with("diff --git") {
                diffs.push(Self::parse_file_section(&lines, &mut i)?);
            } else if lines[i].starts_with("--- ")
                && i + 1 < lines.len()
                && lines[i + 1].starts_with("+++ ")
            {
                diffs.push(Self::parse_file_section(&lines, &mut i)?);
            } else {
                i += 1;
            }
        }

        Ok(diffs)
    }

    fn parse_file_section(lines: &[&str], i: &mut usize) -> Result<FileDiff> {
        let mut path = if lines[*i].starts_with("diff --git") {
            let path = Self::path_from_git_header(lines[*i])?;
            *i += 1;
            Some(path)
        } else {
            None
        };

        let mut is_binary = false;
        let mut is_deleted = false;
        let mut old_path: Option<String> = None;

        while *i < lines.len()
            && !lines[*i].starts_with("@@")
            && !lines[*i].starts_with("diff --git")
        {
            let line = lines[*i];
            if line.starts_with("Binary files") || line.starts_with("GIT binary patch") {
                is_binary = true;
            } else if line.starts_with("deleted file mode") {
                is_deleted = true;
            } else if let Some(rest) = line.strip_prefix("rename to ") {
                path = Some(rest.trim().to_string());
            } else if line.starts_with("--- ") {
                old_path = Self::path_from_marker(line, "--- ");
            } else if line.starts_with("+++ ") {
                match Self::path_from_marker(line, "+++ ") {
                    Some(new_path) => path = Some(new_path),
                    None => is_deleted = true,
                }
            }
            *i += 1;
        }

        let path = path
            .or(old_path)
            .ok_or_else(|| anyhow::anyhow!("Diff section without a file path near line {}", *i))?;

        let mut hunks = Vec::new();
        while *i < lines.len() && lines[*i].starts_with("@@") {
            hunks.push(Self::parse_hunk(lines, i)?);
        }

        Ok(FileDiff {
            path,
            hunks,
            is_binary,
            is_deleted,
        })
    }

    fn path_from_git_header(line: &str) -> Result<String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 {
            Ok(parts[3].strip_prefix("b/").unwrap_or(parts[3]).to_string())
        } else {
            anyhow::bail!("Invalid diff header: {}", line)
        }
    }

    /// `None` when the marker points at `/dev/null`.
    fn path_from_marker(line: &str, prefix: &str) -> Option<String> {
        let raw = line.strip_prefix(prefix)?.trim();
        let raw = raw.split('\t').next().unwrap_or(raw);
        if raw == "/dev/null" {
            return None;
        }
        let side = if prefix.starts_with('-') { "a/" } else { "b/" };
        Some(raw.strip_prefix(side).unwrap_or(raw).to_string())
    }

    fn parse_hunk(lines: &[&str], i: &mut usize) -> Result<DiffHunk> {
        let header = lines[*i];
        let (old_start, old_lines, new_start, new_lines) = Self::parse_hunk_header(header)?;
        *i += 1;

        let mut changes = Vec::new();
        let mut old_line = old_start;
        let mut new_line = new_start;
        let mut old_remaining = old_lines;
        let mut new_remaining = new_lines;

        while *i < lines.len() && (old_remaining > 0 || new_remaining > 0) {
            let line = lines[*i];
            if line.starts_with("@@") || line.starts_with("diff --git") {
                break;
            }

            let change_type = match line.chars().next() {
                Some('+') => ChangeType::Added,
                Some('-') => ChangeType::Removed,
                Some('\\') => {
                    // "\ No newline at end of file"
                    *i += 1;
                    continue;
                }
                _ => ChangeType::Context,
            };

            let diff_line = match change_type {
                ChangeType::Added => {
                    let line_no = new_line;
                    new_line += 1;
                    new_remaining = new_remaining.saturating_sub(1);
                    DiffLine {
                        old_line_no: None,
                        new_line_no: Some(line_no),
                        change_type,
                    }
                }
                ChangeType::Removed => {
                    let line_no = old_line;
                    old_line += 1;
                    old_remaining = old_remaining.saturating_sub(1);
                    DiffLine {
                        old_line_no: Some(line_no),
                        new_line_no: None,
                        change_type,
                    }
                }
                ChangeType::Context => {
                    let old_no = old_line;
                    let new_no = new_line;
                    old_line += 1;
                    new_line += 1;
                    old_remaining = old_remaining.saturating_sub(1);
                    new_remaining = new_remaining.saturating_sub(1);
                    DiffLine {
                        old_line_no: Some(old_no),
                        new_line_no: Some(new_no),
                        change_type,
                    }
                }
            };

            changes.push(diff_line);
            *i += 1;
        }

        // A trailing "\ No newline" marker belongs to this hunk.
        while *i < lines.len() && lines[*i].starts_with('\\') {
            *i += 1;
        }

        Ok(DiffHunk {
            old_start,
            old_lines,
            new_start,
            new_lines,
            changes,
        })
    }

    fn parse_hunk_header(header: &str) -> Result<(u32, u32, u32, u32)> {
        let caps = HUNK_HEADER
            .captures(header)
            .ok_or_else(|| anyhow::anyhow!("Invalid hunk header: {}", header))?;

        let count = |idx: usize| -> Result<u32> {
            match caps.get(idx) {
                Some(m) => Ok(m.as_str().parse()?),
                None => Ok(1),
            }
        };

        let old_start = caps[1].parse()?;
        let old_lines = count(2)?;
        let new_start = caps[3].parse()?;
        let new_lines = count(4)?;

        Ok((old_start, old_lines, new_start, new_lines))
    }
}
