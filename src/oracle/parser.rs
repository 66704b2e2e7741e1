//! Recovery of structured JSON from free-form oracle text.
//!
//! Oracle output is rarely clean: it may be wrapped in a markdown fence,
//! surrounded by prose, truncated, or split into several top-level objects.
//! The parser tries, in order: fence stripping plus direct parse, merging
//! every parseable top-level object, then the first top-level array. Only
//! when all of those fail does it report a parse error; malformed fragments
//! that can be skipped never abort the parse.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Raised when no JSON value can be recovered from oracle output.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no JSON value could be recovered from oracle output")]
    NoJson,
}

/// Result type for response parsing.
pub type ParseResult<T> = Result<T, ParseError>;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("fence regex is valid")
    })
}

/// Tolerant JSON extractor for oracle responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Recover a JSON value (object or array) from raw oracle text.
    pub fn parse(&self, raw: &str) -> ParseResult<Value> {
        let text = strip_fence(raw.trim());

        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return Ok(value);
        }

        if let Some(merged) = merge_top_level_objects(text) {
            debug!("recovered oracle output by merging top-level objects");
            return Ok(Value::Object(merged));
        }

        if let Some(array) = first_top_level_array(text) {
            debug!("recovered oracle output from embedded array");
            return Ok(array);
        }

        Err(ParseError::NoJson)
    }
}

/// Strip a single markdown fence, if present, keeping its body.
fn strip_fence(text: &str) -> &str {
    match fence_regex().captures(text) {
        Some(captures) => captures.get(1).map_or(text, |m| m.as_str()),
        None => text,
    }
}

/// Scan for balanced top-level `{...}` spans and merge every one that parses
/// into a single object. Unparseable spans are skipped. Returns `None` when
/// nothing parseable was found.
fn merge_top_level_objects(text: &str) -> Option<Map<String, Value>> {
    let mut merged = Map::new();
    for span in top_level_spans(text, '{', '}') {
        match serde_json::from_str::<Value>(span) {
            Ok(Value::Object(object)) => merged.extend(object),
            Ok(_) | Err(_) => continue,
        }
    }
    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}

/// Find the first balanced top-level `[...]` span that parses as an array.
fn first_top_level_array(text: &str) -> Option<Value> {
    top_level_spans(text, '[', ']')
        .into_iter()
        .find_map(|span| match serde_json::from_str::<Value>(span) {
            Ok(value @ Value::Array(_)) => Some(value),
            _ => None,
        })
}

/// Collect balanced top-level bracket spans, respecting JSON string
/// literals and escapes so braces inside strings don't confuse the scan.
fn top_level_spans(text: &str, open: char, close: char) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            c if c == open => {
                if depth == 0 {
                    start = index;
                }
                depth += 1;
            }
            c if c == close => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&text[start..index + c.len_utf8()]);
                    }
                }
            }
            _ => {}
        }
    }
    spans
}
