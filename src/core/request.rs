use crate::core::error::{ValidationError, ValidationKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_COMMENT_LENGTH: usize = 65_536;
pub const MAX_FILE_PATH_LENGTH: usize = 4_096;
pub const MAX_OWNER_LENGTH: usize = 39;
pub const MAX_REPO_NAME_LENGTH: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    #[default]
    Review,
    Issue,
}

impl FromStr for CommentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "review" => Ok(CommentKind::Review),
            "issue" => Ok(CommentKind::Issue),
            other => Err(ValidationError::new(
                ValidationKind::InvalidType,
                format!("type must be 'review' or 'issue', got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for CommentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentKind::Review => f.write_str("review"),
            CommentKind::Issue => f.write_str("issue"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewEvent {
    Approve,
    RequestChanges,
    Comment,
}

impl ReviewEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewEvent::Approve => "APPROVE",
            ReviewEvent::RequestChanges => "REQUEST_CHANGES",
            ReviewEvent::Comment => "COMMENT",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            ReviewEvent::Approve => "approved",
            ReviewEvent::RequestChanges => "requested changes on",
            ReviewEvent::Comment => "commented on",
        }
    }
}

impl FromStr for ReviewEvent {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(ReviewEvent::Approve),
            "REQUEST_CHANGES" => Ok(ReviewEvent::RequestChanges),
            "COMMENT" => Ok(ReviewEvent::Comment),
            _ => Err(ValidationError::new(
                ValidationKind::InvalidEvent,
                format!(
                    "invalid review event '{}' (must be APPROVE, REQUEST_CHANGES, or COMMENT)",
                    s
                ),
            )),
        }
    }
}

impl fmt::Display for ReviewEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review-level settings supplied alongside the comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSpec {
    pub body: Option<String>,
    pub event: Option<ReviewEvent>,
}

/// One requested comment, as written by the user and not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentRequest {
    pub file: Option<String>,
    pub line: Option<i64>,
    pub range: Option<String>,
    pub message: String,
    pub kind: CommentKind,
}

impl CommentRequest {
    pub fn review(file: &str, line: i64, message: &str) -> Self {
        Self {
            file: Some(file.to_string()),
            line: Some(line),
            message: message.to_string(),
            ..Self::default()
        }
    }

    pub fn review_range(file: &str, range: &str, message: &str) -> Self {
        Self {
            file: Some(file.to_string()),
            range: Some(range.to_string()),
            message: message.to_string(),
            ..Self::default()
        }
    }

    pub fn issue(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: CommentKind::Issue,
            ..Self::default()
        }
    }

    /// Short location label used in dry-run and progress output.
    pub fn location_label(&self) -> String {
        let file = self.file.as_deref().unwrap_or("(general)");
        match (&self.range, self.line) {
            (Some(range), _) => format!("{}:{}", file, range),
            (None, Some(line)) => format!("{}:{}", file, line),
            (None, None) => file.to_string(),
        }
    }
}

/// Parses `"start-end"` into a closed, positive interval.
pub fn parse_range(range: &str) -> Result<(u32, u32), ValidationError> {
    let invalid = |detail: String| ValidationError::new(ValidationKind::InvalidRange, detail);

    let parts: Vec<&str> = range.split('-').collect();
    if parts.len() != 2 {
        return Err(invalid(format!(
            "range '{}' must be in format 'start-end'",
            range
        )));
    }

    let start: i64 = parts[0]
        .trim()
        .parse()
        .map_err(|_| invalid(format!("invalid start line '{}'", parts[0].trim())))?;
    let end: i64 = parts[1]
        .trim()
        .parse()
        .map_err(|_| invalid(format!("invalid end line '{}'", parts[1].trim())))?;

    if start <= 0 || end <= 0 {
        return Err(invalid("line numbers must be positive".to_string()));
    }
    if start > end {
        return Err(invalid(format!(
            "start line ({}) cannot be greater than end line ({})",
            start, end
        )));
    }

    let start = u32::try_from(start).map_err(|_| invalid(format!("start line {} is too large", start)))?;
    let end = u32::try_from(end).map_err(|_| invalid(format!("end line {} is too large", end)))?;
    Ok((start, end))
}

pub fn parse_line(line: i64) -> Result<u32, ValidationError> {
    if line <= 0 {
        return Err(ValidationError::new(
            ValidationKind::InvalidLine,
            format!("line number must be positive, got {}", line),
        ));
    }
    u32::try_from(line).map_err(|_| {
        ValidationError::new(
            ValidationKind::InvalidLine,
            format!("line number {} is too large", line),
        )
    })
}

pub fn validate_file_path(path: &str) -> Result<(), ValidationError> {
    let invalid = |detail: String| ValidationError::new(ValidationKind::InvalidPath, detail);

    if path.len() > MAX_FILE_PATH_LENGTH {
        return Err(invalid(format!(
            "file path too long: {} characters (maximum {} allowed)",
            path.len(),
            MAX_FILE_PATH_LENGTH
        )));
    }
    if path.contains("..") {
        return Err(invalid(
            "invalid file path: directory traversal not allowed".to_string(),
        ));
    }
    if path.starts_with('/') {
        return Err(invalid(
            "invalid file path: absolute paths not allowed, use relative paths from repository root"
                .to_string(),
        ));
    }
    Ok(())
}

pub fn validate_comment_body(body: &str) -> Result<(), ValidationError> {
    if body.len() > MAX_COMMENT_LENGTH {
        return Err(ValidationError::new(
            ValidationKind::BodyTooLong,
            format!(
                "comment too long: {} characters (maximum {} allowed)",
                body.len(),
                MAX_COMMENT_LENGTH
            ),
        ));
    }
    Ok(())
}

/// Splits `owner/repo`, enforcing GitHub's length limits.
pub fn parse_repository(repo: &str) -> Result<(String, String), ValidationError> {
    let invalid = |detail: String| ValidationError::new(ValidationKind::InvalidRepository, detail);

    if repo.len() > MAX_REPO_NAME_LENGTH {
        return Err(invalid(format!(
            "repository name too long: {} characters (maximum {} allowed)",
            repo.len(),
            MAX_REPO_NAME_LENGTH
        )));
    }
    let parts: Vec<&str> = repo.split('/').collect();
    if parts.len() != 2 {
        return Err(invalid(format!(
            "invalid repository format: {} (expected owner/repo)",
            repo
        )));
    }
    let (owner, name) = (parts[0].trim(), parts[1].trim());
    if owner.is_empty() || name.is_empty() {
        return Err(invalid(
            "invalid repository format: owner and repository name cannot be empty".to_string(),
        ));
    }
    if owner.len() > MAX_OWNER_LENGTH {
        return Err(invalid(format!(
            "repository owner too long: {} characters (maximum {} allowed)",
            owner.len(),
            MAX_OWNER_LENGTH
        )));
    }
    Ok((owner.to_string(), name.to_string()))
}

/// Parses a `--comment` value: `file:line:message`, `file:start-end:message`,
/// or the older `file:start:end:message`. Everything after the location is
/// the message, colons included.
pub fn parse_comment_spec(spec: &str) -> Result<CommentRequest, ValidationError> {
    let invalid = |detail: &str| ValidationError::new(ValidationKind::InvalidSpec, detail);
    let format_hint = "format must be file:line:message or file:start-end:message";

    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() < 3 {
        return Err(invalid(format_hint));
    }

    let file = parts[0].trim();
    let is_number = |s: &str| !s.trim().is_empty() && s.trim().parse::<i64>().is_ok();

    let (line, range, message) = if parts.len() >= 4 && is_number(parts[1]) && is_number(parts[2]) {
        let range = format!("{}-{}", parts[1].trim(), parts[2].trim());
        (None, Some(range), parts[3..].join(":"))
    } else if parts[1].contains('-') {
        (None, Some(parts[1].trim().to_string()), parts[2..].join(":"))
    } else {
        let line = parts[1]
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(&format!("invalid line number '{}'", parts[1].trim())))?;
        (Some(line), None, parts[2..].join(":"))
    };

    if file.is_empty() {
        return Err(invalid("file path cannot be empty"));
    }
    let message = strip_matching_quotes(&message);
    if message.trim().is_empty() {
        return Err(invalid("message cannot be empty"));
    }

    Ok(CommentRequest {
        file: Some(file.to_string()),
        line,
        range,
        message,
        kind: CommentKind::Review,
    })
}

fn strip_matching_quotes(message: &str) -> String {
    for quote in ['"', '\''] {
        if message.len() >= 2 && message.starts_with(quote) && message.ends_with(quote) {
            return message[1..message.len() - 1].to_string();
        }
    }
    message.to_string()
}
