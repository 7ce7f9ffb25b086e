use crate::core::request::CommentKind;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

static AUTHOR_FILTERS: Lazy<RwLock<HashMap<String, Arc<AuthorFilter>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static RELATIVE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*([hdw])(?:\s+ago)?$").unwrap());

/// Compiled `--author` pattern.
#[derive(Debug)]
pub enum AuthorFilter {
    /// Lower-cased needle, matched as a case-insensitive substring.
    Literal(String),
    Pattern(Regex),
}

impl AuthorFilter {
    pub fn matches(&self, author: &str) -> bool {
        match self {
            AuthorFilter::Literal(needle) => author.to_lowercase().contains(needle.as_str()),
            AuthorFilter::Pattern(regex) => regex.is_match(author),
        }
    }

    fn compile(pattern: &str) -> Self {
        if !pattern.contains('*') && !pattern.contains('?') {
            return AuthorFilter::Literal(pattern.to_lowercase());
        }

        let mut translated = String::from("(?i)^");
        for ch in pattern.chars() {
            match ch {
                '*' => translated.push_str(".*"),
                '?' => translated.push('.'),
                other => translated.push_str(&regex::escape(&other.to_string())),
            }
        }
        translated.push('$');

        match Regex::new(&translated) {
            Ok(regex) => AuthorFilter::Pattern(regex),
            Err(err) => {
                debug!("Author pattern '{}' did not compile ({}); using substring match", pattern, err);
                AuthorFilter::Literal(pattern.to_lowercase())
            }
        }
    }
}

/// Returns the compiled filter for `pattern`, compiling it at most once per
/// process.
pub fn compile_author_filter(pattern: &str) -> Arc<AuthorFilter> {
    {
        let cache = AUTHOR_FILTERS.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(filter) = cache.get(pattern) {
            return Arc::clone(filter);
        }
    }

    let mut cache = AUTHOR_FILTERS.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(filter) = cache.get(pattern) {
        return Arc::clone(filter);
    }
    let filter = Arc::new(AuthorFilter::compile(pattern));
    cache.insert(pattern.to_string(), Arc::clone(&filter));
    filter
}

/// Deduplicates repeated strings (authors, paths) across a comment list.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: RwLock<HashSet<Arc<str>>>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, value: &str) -> Arc<str> {
        {
            let strings = self.strings.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = strings.get(value) {
                return Arc::clone(existing);
            }
        }

        let mut strings = self.strings.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = strings.get(value) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(value);
        strings.insert(Arc::clone(&interned));
        interned
    }

    pub fn len(&self) -> usize {
        self.strings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A comment of either kind, normalised for display and filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedComment {
    pub id: u64,
    pub kind: CommentKind,
    pub author: Arc<str>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub path: Option<Arc<str>>,
    pub line: Option<u32>,
    pub commit_id: Option<Arc<str>>,
    pub html_url: Option<String>,
    /// GitHub's REST listing does not report thread resolution, so this is
    /// false unless a caller knows better.
    pub resolved: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Open,
    Resolved,
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "open" | "unresolved" => Ok(StatusFilter::Open),
            "resolved" => Ok(StatusFilter::Resolved),
            other => bail!("invalid status '{}'. Must be one of: all, open, resolved", other),
        }
    }
}

/// Listing filters, resolved from flags and config before the core sees them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub kind: Option<CommentKind>,
    pub author: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: StatusFilter,
}

impl FilterOptions {
    pub fn validate(&self) -> Result<()> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                bail!(
                    "since date ({}) cannot be after until date ({})",
                    since.to_rfc3339(),
                    until.to_rfc3339()
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Type,
    Author,
    Date,
    Status,
}

/// Cheapest and most selective stages first. Any order gives the same result.
pub const DEFAULT_ORDER: [Stage; 4] = [Stage::Type, Stage::Author, Stage::Date, Stage::Status];

pub struct CommentFilter {
    options: FilterOptions,
    author: Option<Arc<AuthorFilter>>,
}

impl CommentFilter {
    pub fn new(options: FilterOptions) -> Self {
        let author = options
            .author
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .map(compile_author_filter);
        Self { options, author }
    }

    pub fn apply(&self, comments: Vec<ListedComment>) -> Vec<ListedComment> {
        self.apply_in_order(comments, &DEFAULT_ORDER)
    }

    pub fn apply_in_order(&self, comments: Vec<ListedComment>, order: &[Stage]) -> Vec<ListedComment> {
        comments
            .into_iter()
            .filter(|comment| order.iter().all(|stage| self.passes(*stage, comment)))
            .collect()
    }

    fn passes(&self, stage: Stage, comment: &ListedComment) -> bool {
        match stage {
            Stage::Type => self.options.kind.map_or(true, |kind| comment.kind == kind),
            Stage::Author => self
                .author
                .as_ref()
                .map_or(true, |filter| filter.matches(&comment.author)),
            Stage::Date => {
                self.options.since.map_or(true, |since| comment.created_at >= since)
                    && self.options.until.map_or(true, |until| comment.created_at <= until)
            }
            Stage::Status => match self.options.status {
                StatusFilter::All => true,
                StatusFilter::Open => !comment.resolved,
                StatusFilter::Resolved => comment.resolved,
            },
        }
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM`, `today`, `yesterday`
/// and relative `Nh`/`Nd`/`Nw` (optionally followed by `ago`). Dates without
/// a zone are read as UTC.
pub fn parse_flexible_date(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let text = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M") {
        return Ok(Utc.from_utc_datetime(&parsed));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(start_of(date));
    }

    let lower = text.to_lowercase();
    match lower.as_str() {
        "today" => return Ok(start_of(now.date_naive())),
        "yesterday" => return Ok(start_of(now.date_naive()) - Duration::days(1)),
        _ => {}
    }

    if let Some(caps) = RELATIVE_DATE.captures(&lower) {
        let amount: i64 = caps[1]
            .parse()
            .with_context(|| format!("invalid amount in '{}'", text))?;
        let span = match &caps[2] {
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            _ => Duration::try_weeks(amount),
        };
        return span
            .and_then(|span| now.checked_sub_signed(span))
            .with_context(|| format!("relative date '{}' is out of range", text));
    }

    bail!(
        "could not parse date '{}' (use YYYY-MM-DD, YYYY-MM-DD HH:MM, RFC 3339, or relative like 3d)",
        text
    )
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(id: u64, kind: CommentKind, author: &str, day: u32, resolved: bool) -> ListedComment {
        ListedComment {
            id,
            kind,
            author: Arc::from(author),
            body: format!("comment {}", id),
            created_at: Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap(),
            path: None,
            line: None,
            commit_id: None,
            html_url: None,
            resolved,
        }
    }

    fn sample() -> Vec<ListedComment> {
        vec![
            listed(1, CommentKind::Issue, "alice", 1, false),
            listed(2, CommentKind::Review, "Alice-bot", 5, true),
            listed(3, CommentKind::Review, "bob", 10, false),
            listed(4, CommentKind::Issue, "carol@corp.com", 15, false),
            listed(5, CommentKind::Review, "alice", 20, false),
        ]
    }

    fn ids(comments: &[ListedComment]) -> Vec<u64> {
        comments.iter().map(|c| c.id).collect()
    }

    #[test]
    fn star_matches_every_author() {
        let filter = compile_author_filter("*");
        for author in ["a", "alice", "X-Y_z", "bot[bot]"] {
            assert!(filter.matches(author), "{}", author);
        }
    }

    #[test]
    fn literal_is_case_insensitive_substring() {
        let filter = compile_author_filter("ALI");
        assert!(filter.matches("alice"));
        assert!(filter.matches("Alice-bot"));
        assert!(!filter.matches("bob"));
    }

    #[test]
    fn wildcards_are_anchored() {
        let prefix = compile_author_filter("alice*");
        assert!(prefix.matches("alice-bot"));
        assert!(!prefix.matches("bob-alice"));

        let domain = compile_author_filter("*@corp.com");
        assert!(domain.matches("carol@CORP.com"));
        assert!(!domain.matches("carol@corpXcom"));

        let single = compile_author_filter("b?b");
        assert!(single.matches("bob"));
        assert!(!single.matches("boob"));
    }

    #[test]
    fn cache_returns_same_compiled_filter() {
        let first = compile_author_filter("cache-check*");
        let second = compile_author_filter("cache-check*");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn string_pool_deduplicates() {
        let pool = StringPool::new();
        let a = pool.intern("alice");
        let b = pool.intern("alice");
        let c = pool.intern("bob");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn combined_filters() {
        let filter = CommentFilter::new(FilterOptions {
            kind: Some(CommentKind::Review),
            author: Some("alice*".into()),
            since: Some(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()),
            until: None,
            status: StatusFilter::Open,
        });
        assert_eq!(ids(&filter.apply(sample())), vec![5]);
    }

    #[test]
    fn stage_order_does_not_change_result() {
        let filter = CommentFilter::new(FilterOptions {
            kind: None,
            author: Some("a".into()),
            since: Some(Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap()),
            until: Some(Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap()),
            status: StatusFilter::All,
        });
        let expected = ids(&filter.apply(sample()));
        assert_eq!(expected, vec![2, 4]);

        let orders = [
            [Stage::Status, Stage::Date, Stage::Author, Stage::Type],
            [Stage::Author, Stage::Type, Stage::Status, Stage::Date],
            [Stage::Date, Stage::Status, Stage::Type, Stage::Author],
        ];
        for order in orders {
            assert_eq!(ids(&filter.apply_in_order(sample(), &order)), expected);
        }
    }

    #[test]
    fn status_filter_uses_resolution_flag() {
        let resolved = CommentFilter::new(FilterOptions {
            status: StatusFilter::Resolved,
            ..FilterOptions::default()
        });
        assert_eq!(ids(&resolved.apply(sample())), vec![2]);
        assert!("closed".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn flexible_dates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 15, 30, 0).unwrap();
        assert_eq!(
            parse_flexible_date("2024-03-01", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_flexible_date("2024-03-01 08:15", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap()
        );
        assert_eq!(
            parse_flexible_date("2024-03-01T08:15:00+02:00", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 6, 15, 0).unwrap()
        );
        assert_eq!(parse_flexible_date("3d", now).unwrap(), now - Duration::days(3));
        assert_eq!(parse_flexible_date("2w ago", now).unwrap(), now - Duration::weeks(2));
        assert_eq!(
            parse_flexible_date("yesterday", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 19, 0, 0, 0).unwrap()
        );
        assert!(parse_flexible_date("next tuesday", now).is_err());
    }

    #[test]
    fn huge_relative_dates_are_errors() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 15, 30, 0).unwrap();
        for input in ["9999999999d", "99999999999999w", "9999999999999999h"] {
            let err = parse_flexible_date(input, now).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{}", input);
        }
        assert!(parse_flexible_date("99999999999999999999d", now).is_err());
    }

    #[test]
    fn reversed_date_window_is_rejected() {
        let options = FilterOptions {
            since: Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()),
            until: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            ..FilterOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
