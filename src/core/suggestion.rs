//! Expansion of suggestion shorthands into GitHub `suggestion` fences.
//!
//! Two grammars are supported and applied in order:
//!
//! 1. Block form, which may span lines and contain blank lines:
//!    `<<<SUGGEST` newline, code, newline, `SUGGEST>>>`
//! 2. Inline form: `[SUGGEST: code]`, optionally with a line offset as in
//!    `[SUGGEST:+2: code]`.
//!
//! Unterminated markers are left in place untouched.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const INLINE_OPEN: &str = "[SUGGEST:";
const MAX_OFFSET: i32 = 999;

static BLOCK_SUGGESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<<<SUGGEST[ \t\r]*\n(.*?)\nSUGGEST>>>").unwrap());

static OFFSET_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^([+-]?\d+):\s*(.*)$").unwrap());

pub type Transform = fn(&str) -> String;

/// Grammars in application order. New grammars are added here.
pub const PIPELINE: &[(&str, Transform)] = &[
    ("block", expand_block_suggestions),
    ("inline", expand_inline_suggestions),
];

pub fn expand_suggestions(message: &str) -> String {
    PIPELINE
        .iter()
        .fold(message.to_string(), |text, (_, transform)| transform(&text))
}

pub fn has_suggestion_markers(message: &str) -> bool {
    message.contains(INLINE_OPEN) || message.contains("<<<SUGGEST")
}

fn fence(code: &str, offset: i32) -> String {
    let header = match offset {
        0 => "suggestion".to_string(),
        n if n > 0 => format!("suggestion:+{}", n),
        n => format!("suggestion:{}", n),
    };
    format!("\n\n```{}\n{}\n```\n\n", header, code)
}

pub fn expand_block_suggestions(message: &str) -> String {
    BLOCK_SUGGESTION
        .replace_all(message, |caps: &Captures| fence(caps[1].trim(), 0))
        .into_owned()
}

/// Scans for `[SUGGEST:` and finds the closing bracket by depth so payloads
/// such as `items[0]` survive intact.
pub fn expand_inline_suggestions(message: &str) -> String {
    let mut result = String::with_capacity(message.len());
    let mut rest = message;

    while let Some(start) = rest.find(INLINE_OPEN) {
        let payload_start = start + INLINE_OPEN.len();
        let Some(len) = closing_bracket(&rest[payload_start..]) else {
            break;
        };

        let (offset, code) = split_offset(rest[payload_start..payload_start + len].trim());
        result.push_str(&rest[..start]);
        result.push_str(&fence(&code, offset));
        rest = &rest[payload_start + len + 1..];
    }

    result.push_str(rest);
    result
}

fn closing_bracket(payload: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, byte) in payload.bytes().enumerate() {
        match byte {
            b'[' => depth += 1,
            b']' if depth == 0 => return Some(idx),
            b']' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn split_offset(content: &str) -> (i32, String) {
    if let Some(caps) = OFFSET_PREFIX.captures(content) {
        if let Ok(offset) = caps[1].parse::<i32>() {
            if (-MAX_OFFSET..=MAX_OFFSET).contains(&offset) {
                return (offset, caps[2].trim().to_string());
            }
        }
    }
    (0, content.to_string())
}
