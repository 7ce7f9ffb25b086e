use crate::adapters::github::RepoRef;
use crate::core::filter::ListedComment;
use crate::core::request::CommentKind;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            other => bail!("invalid format: {} (must be json, csv, or markdown)", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportField {
    Id,
    Type,
    Author,
    Body,
    File,
    Line,
    CreatedAt,
    Url,
    CommitId,
    Resolved,
}

impl ExportField {
    pub const DEFAULT: [ExportField; 9] = [
        ExportField::Id,
        ExportField::Type,
        ExportField::Author,
        ExportField::Body,
        ExportField::File,
        ExportField::Line,
        ExportField::CreatedAt,
        ExportField::Url,
        ExportField::Resolved,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExportField::Id => "id",
            ExportField::Type => "type",
            ExportField::Author => "author",
            ExportField::Body => "body",
            ExportField::File => "file",
            ExportField::Line => "line",
            ExportField::CreatedAt => "created_at",
            ExportField::Url => "url",
            ExportField::CommitId => "commit_id",
            ExportField::Resolved => "resolved",
        }
    }
}

impl FromStr for ExportField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let field = match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "id" => ExportField::Id,
            "type" => ExportField::Type,
            "author" => ExportField::Author,
            "body" => ExportField::Body,
            "file" | "path" => ExportField::File,
            "line" => ExportField::Line,
            "created_at" => ExportField::CreatedAt,
            "url" => ExportField::Url,
            "commit_id" => ExportField::CommitId,
            "resolved" => ExportField::Resolved,
            other => bail!(
                "unknown export field '{}' (use id, type, author, body, file, line, created_at, url, commit_id, resolved)",
                other
            ),
        };
        Ok(field)
    }
}

/// `--include` values, or every default field when none are given.
pub fn parse_fields(include: &[String]) -> Result<Vec<ExportField>> {
    if include.is_empty() {
        return Ok(ExportField::DEFAULT.to_vec());
    }
    include.iter().map(|field| field.parse()).collect()
}

/// Where a comment lives on github.com; the API's `html_url` wins when present.
pub fn comment_url(comment: &ListedComment, repo: &RepoRef, pr: u64) -> String {
    if let Some(url) = &comment.html_url {
        return url.clone();
    }
    match comment.kind {
        CommentKind::Issue => format!(
            "https://github.com/{}/issues/{}#issuecomment-{}",
            repo, pr, comment.id
        ),
        CommentKind::Review => format!(
            "https://github.com/{}/pull/{}#discussion_r{}",
            repo, pr, comment.id
        ),
    }
}

pub fn render(
    format: ExportFormat,
    comments: &[ListedComment],
    fields: &[ExportField],
    repo: &RepoRef,
    pr: u64,
    now: DateTime<Utc>,
) -> Result<String> {
    match format {
        ExportFormat::Json => export_json(comments, fields, repo, pr),
        ExportFormat::Csv => export_csv(comments, fields, repo, pr),
        ExportFormat::Markdown => Ok(export_markdown(comments, repo, pr, now)),
    }
}

fn json_value(comment: &ListedComment, field: ExportField, repo: &RepoRef, pr: u64) -> Option<Value> {
    let value = match field {
        ExportField::Id => Value::from(comment.id),
        ExportField::Type => Value::from(comment.kind.to_string()),
        ExportField::Author => Value::from(comment.author.as_ref()),
        ExportField::Body => Value::from(comment.body.as_str()),
        ExportField::File => Value::from(comment.path.as_deref()?),
        ExportField::Line => Value::from(comment.line?),
        ExportField::CreatedAt => Value::from(comment.created_at.to_rfc3339()),
        ExportField::Url => Value::from(comment_url(comment, repo, pr)),
        ExportField::CommitId => Value::from(comment.commit_id.as_deref()?),
        ExportField::Resolved => Value::from(comment.resolved),
    };
    Some(value)
}

/// Fields a comment does not have (a file on an issue comment) are omitted.
pub fn export_json(
    comments: &[ListedComment],
    fields: &[ExportField],
    repo: &RepoRef,
    pr: u64,
) -> Result<String> {
    let items: Vec<Value> = comments
        .iter()
        .map(|comment| {
            let mut item = Map::new();
            for &field in fields {
                if let Some(value) = json_value(comment, field, repo, pr) {
                    item.insert(field.name().to_string(), value);
                }
            }
            Value::Object(item)
        })
        .collect();
    serde_json::to_string_pretty(&items).context("failed to serialize comments")
}

fn csv_value(comment: &ListedComment, field: ExportField, repo: &RepoRef, pr: u64) -> String {
    match field {
        ExportField::Body => comment.body.replace('\n', "\\n"),
        ExportField::Type => comment.kind.to_string(),
        ExportField::Resolved => comment.resolved.to_string(),
        _ => json_value(comment, field, repo, pr)
            .map(|value| match value {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .unwrap_or_default(),
    }
}

/// One header row of field names, one row per comment. Body newlines are
/// written as a literal `\n` so every comment stays on one line.
pub fn export_csv(
    comments: &[ListedComment],
    fields: &[ExportField],
    repo: &RepoRef,
    pr: u64,
) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(fields.iter().map(ExportField::name))?;
    for comment in comments {
        writer.write_record(fields.iter().map(|&field| csv_value(comment, field, repo, pr)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush CSV output: {}", err.error()))?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

pub fn export_markdown(
    comments: &[ListedComment],
    repo: &RepoRef,
    pr: u64,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::from("# PR Comments Export\n\n");
    out.push_str(&format!("**Repository:** {}  \n", repo));
    out.push_str(&format!("**PR:** #{}  \n", pr));
    out.push_str(&format!("**Total Comments:** {}  \n", comments.len()));
    out.push_str(&format!("**Exported:** {}  \n\n", now.format("%Y-%m-%d %H:%M:%S")));

    let (issue, review): (Vec<&ListedComment>, Vec<&ListedComment>) = comments
        .iter()
        .partition(|comment| comment.kind == CommentKind::Issue);

    if !issue.is_empty() {
        out.push_str(&format!("## General PR Comments ({})\n\n", issue.len()));
        for comment in issue {
            push_markdown_comment(&mut out, comment, None);
        }
    }

    if !review.is_empty() {
        out.push_str(&format!("## Review Comments ({})\n\n", review.len()));
        for comment in review {
            let location = match (comment.path.as_deref(), comment.line) {
                (Some(path), Some(line)) => Some(format!("{}:{}", path, line)),
                (Some(path), None) => Some(path.to_string()),
                _ => None,
            };
            push_markdown_comment(&mut out, comment, location);
        }
    }

    out
}

fn push_markdown_comment(out: &mut String, comment: &ListedComment, location: Option<String>) {
    out.push_str(&format!("### Comment #{}\n", comment.id));
    out.push_str(&format!("**Author:** @{}  \n", comment.author));
    if let Some(location) = location {
        out.push_str(&format!("**File:** `{}`  \n", location));
    }
    out.push_str(&format!(
        "**Created:** {}  \n",
        comment.created_at.format("%Y-%m-%d %H:%M")
    ));
    if comment.resolved {
        out.push_str("**Status:** ✅ Resolved\n");
    }
    out.push_str(&format!("\n{}\n\n---\n", comment.body));
}
