//! Recovery parser for possibly-malformed model JSON.
//!
//! Generative models are asked for strict JSON but routinely return it wrapped
//! in code fences, preceded by commentary, with trailing commas, unquoted
//! keys, or raw newlines inside string values. Rather than failing a whole
//! notice on such output, this module runs two escalating repair passes before
//! giving up:
//!
//! 1. Strip fences, isolate the outermost `{…}` span, fix trailing commas and
//!    unquoted keys, parse.
//! 2. If that fails, escape raw control characters inside every quoted string,
//!    re-apply the trailing-comma fix, parse once more.
//!
//! Giving up is not an error: the caller receives `None` and treats the stage
//! as failed. The best-effort text (first 500 chars) is logged for diagnosis.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{error, warn};

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());
static RE_TRAILING_COMMA_BRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\}").unwrap());
static RE_TRAILING_COMMA_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\]").unwrap());
static RE_UNQUOTED_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap());
static RE_QUOTED_STRING: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]*)""#).unwrap());

/// Parse model output into a JSON object, repairing common syntax damage.
///
/// Returns `None` when no `{…}` span exists or when both repair passes still
/// leave the text unparseable. Never panics, never returns an error.
pub fn recover_object(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    // Models sometimes fence the JSON despite being told not to.
    let unfenced = RE_CODE_FENCE.replace_all(text, "$1");
    let unfenced = unfenced.trim();

    // Keep only the outermost object span; everything around it is prose.
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        warn!("JSON recovery: no valid '{{…}}' structure found");
        return None;
    }
    let span = &unfenced[start..=end];

    let fixed = fix_common_errors(span);
    match serde_json::from_str::<Value>(&fixed) {
        Ok(v) => Some(v),
        Err(first_err) => {
            warn!(
                "JSON parse failed after first fix ({first_err}) — attempting aggressive recovery"
            );
            let aggressive = aggressive_clean(&fixed);
            match serde_json::from_str::<Value>(&aggressive) {
                Ok(v) => Some(v),
                Err(second_err) => {
                    let preview: String = fixed.chars().take(500).collect();
                    error!("JSON parsing failed even after aggressive recovery: {second_err}");
                    error!("--- BAD JSON (first 500 chars) ---\n{preview}");
                    None
                }
            }
        }
    }
}

/// First pass: trailing commas before `}`/`]`, and unquoted object keys.
fn fix_common_errors(json: &str) -> String {
    let json = RE_TRAILING_COMMA_BRACE.replace_all(json, "}");
    let json = RE_TRAILING_COMMA_BRACKET.replace_all(&json, "]");
    RE_UNQUOTED_KEY
        .replace_all(&json, "$1\"$2\":")
        .into_owned()
}

/// Second pass: escape raw newline/tab/carriage-return characters inside
/// quoted strings, then re-apply the trailing-comma fix.
fn aggressive_clean(json: &str) -> String {
    let escaped = RE_QUOTED_STRING.replace_all(json, |caps: &regex::Captures<'_>| {
        let content = caps[1]
            .replace('\n', "\\n")
            .replace('\t', "\\t")
            .replace('\r', "\\r");
        format!("\"{content}\"")
    });
    let escaped = RE_TRAILING_COMMA_BRACE.replace_all(&escaped, "}");
    RE_TRAILING_COMMA_BRACKET
        .replace_all(&escaped, "]")
        .into_owned()
}
