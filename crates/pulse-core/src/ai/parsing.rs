//! Parsing and validation of generator replies
//!
//! Models rarely return bare JSON. Replies may be wrapped in a fenced code
//! block, surrounded by prose, or use a single string where a list was asked
//! for. These helpers normalize all of that into an [`InsightResult`], or
//! fail with [`Error::InvalidData`] so the caller can retry.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::InsightResult;

/// Accepted names for the summary field, in priority order
const SUMMARY_FIELDS: [&str; 2] = ["summary", "insight"];
const RECOMMENDATIONS_FIELD: &str = "recommendations";
const KEY_POINTS_FIELD: &str = "key_points";

/// Longest slice of a bad reply quoted in error messages
const MAX_ERROR_EXCERPT: usize = 200;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("valid regex")
    })
}

/// Return the body of the first fenced code block, or the whole text
pub fn strip_code_fence(response: &str) -> &str {
    match fence_regex().captures(response).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => response.trim(),
    }
}

fn excerpt(text: &str) -> String {
    if text.len() > MAX_ERROR_EXCERPT {
        let mut end = MAX_ERROR_EXCERPT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}

/// Extract the outermost JSON object from a reply
fn extract_json_object(response: &str) -> Result<Map<String, Value>> {
    let body = strip_code_fence(response);

    let start = body.find('{');
    let end = body.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &body[s..=e];
            match serde_json::from_str::<Value>(json_str) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(Error::InvalidData(format!(
                    "Insight reply is not a JSON object | Raw: {}",
                    excerpt(json_str)
                ))),
                Err(e) => Err(Error::InvalidData(format!(
                    "Invalid JSON from generator: {} | Raw: {}",
                    e,
                    excerpt(json_str)
                ))),
            }
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON found in generator reply | Raw: {}",
            excerpt(body)
        ))),
    }
}

/// Coerce a field into a list of strings
///
/// A scalar becomes a one-element list. `null` counts as missing.
fn coerce_string_list(field: &str, value: Option<&Value>) -> Result<Vec<String>> {
    let missing = || Error::InvalidData(format!("Insight reply is missing '{}'", field));

    match value {
        None | Some(Value::Null) => Err(missing()),
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| scalar_to_string(field, item))
            .collect(),
        Some(other) => Ok(vec![scalar_to_string(field, other)?]),
    }
}

fn scalar_to_string(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::InvalidData(format!(
            "Insight reply has a non-text entry in '{}'",
            field
        ))),
    }
}

/// Parse and validate an insight reply
///
/// Requires a summary (`summary` or `insight`), `recommendations`, and
/// `key_points`. List fields given as a single value are wrapped.
pub fn parse_insight(response: &str) -> Result<InsightResult> {
    let map = extract_json_object(response)?;

    let summary = SUMMARY_FIELDS
        .iter()
        .find_map(|name| map.get(*name).filter(|v| !v.is_null()))
        .ok_or_else(|| Error::InvalidData("Insight reply is missing 'summary'".into()))
        .and_then(|v| scalar_to_string("summary", v))?;

    let recommendations = coerce_string_list(RECOMMENDATIONS_FIELD, map.get(RECOMMENDATIONS_FIELD))?;
    let key_points = coerce_string_list(KEY_POINTS_FIELD, map.get(KEY_POINTS_FIELD))?;

    Ok(InsightResult {
        summary,
        recommendations,
        key_points,
    })
}
