use crate::core::error::ValidationError;
use crate::core::request::{CommentKind, CommentRequest, ReviewEvent, ReviewSpec};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// A YAML batch file.
///
/// ```yaml
/// pr: 123
/// repo: owner/name
/// review:
///   body: "Overall looks good"
///   event: REQUEST_CHANGES
/// comments:
///   - file: src/main.go
///     line: 42
///     message: "Consider a constant here"
///   - file: src/api.go
///     range: "10-15"
///     message: "[SUGGEST: return err]"
///   - message: "Thanks for the cleanup!"
///     type: issue
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchFile {
    #[serde(default)]
    pub pr: Option<u64>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub review: Option<BatchReview>,
    #[serde(default)]
    pub comments: Vec<BatchComment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchReview {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchComment {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<i64>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl BatchFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read batch file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse batch file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let batch: BatchFile = serde_yaml::from_str(content)?;
        Ok(batch)
    }

    /// Converts the file into planner input. Unknown comment types and review
    /// events are reported with the offending comment's 1-based position.
    pub fn into_requests(self) -> Result<(Vec<CommentRequest>, ReviewSpec), ValidationError> {
        let review = match self.review {
            Some(review) => ReviewSpec {
                body: review.body,
                event: match review.event.as_deref().map(str::trim) {
                    None | Some("") => None,
                    Some(event) => Some(event.parse::<ReviewEvent>()?),
                },
            },
            None => ReviewSpec::default(),
        };

        let requests = self
            .comments
            .into_iter()
            .enumerate()
            .map(|(i, comment)| {
                let kind = comment
                    .kind
                    .as_deref()
                    .unwrap_or("")
                    .parse::<CommentKind>()
                    .map_err(|err| err.at(i + 1))?;
                Ok(CommentRequest {
                    file: comment.file,
                    line: comment.line,
                    range: comment.range,
                    message: comment.message,
                    kind,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok((requests, review))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ValidationKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
pr: 42
repo: octo/widgets
review:
  body: "Needs work"
  event: request_changes
comments:
  - file: src/main.go
    line: 10
    message: "first"
  - file: src/api.go
    range: "3-5"
    message: "second"
  - message: "general"
    type: issue
"#;

    #[test]
    fn loads_file_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let batch = BatchFile::load(file.path()).unwrap();
        assert_eq!(batch.pr, Some(42));
        assert_eq!(batch.repo.as_deref(), Some("octo/widgets"));
        assert_eq!(batch.comments.len(), 3);
    }

    #[test]
    fn converts_to_requests_and_review() {
        let (requests, review) = BatchFile::parse(SAMPLE).unwrap().into_requests().unwrap();
        assert_eq!(review.event, Some(ReviewEvent::RequestChanges));
        assert_eq!(review.body.as_deref(), Some("Needs work"));
        assert_eq!(requests[0].line, Some(10));
        assert_eq!(requests[1].range.as_deref(), Some("3-5"));
        assert_eq!(requests[2].kind, CommentKind::Issue);
        assert_eq!(requests[0].kind, CommentKind::Review);
    }

    #[test]
    fn empty_event_means_default() {
        let yaml = "review:\n  body: hi\n  event: \"\"\n";
        let (_, review) = BatchFile::parse(yaml).unwrap().into_requests().unwrap();
        assert_eq!(review.event, None);
    }

    #[test]
    fn bad_type_reports_position() {
        let yaml = "comments:\n  - file: a.go\n    line: 1\n    message: ok\n  - file: a.go\n    line: 2\n    message: x\n    type: thread\n";
        let err = BatchFile::parse(yaml).unwrap().into_requests().unwrap_err();
        assert_eq!(err.kind, ValidationKind::InvalidType);
        assert_eq!(err.item_index, Some(2));
    }

    #[test]
    fn bad_event_is_rejected() {
        let yaml = "review:\n  event: MERGE\n";
        let err = BatchFile::parse(yaml).unwrap().into_requests().unwrap_err();
        assert_eq!(err.kind, ValidationKind::InvalidEvent);
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"comments: [unclosed").unwrap();
        let err = BatchFile::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse batch file"));
    }
}
