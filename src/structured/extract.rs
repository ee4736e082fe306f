//! Pull a JSON document out of free-form model output.

use once_cell::sync::Lazy;
use regex::Regex;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("valid regex"));
static ANY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```\s*([\s\S]*?)\s*```").expect("valid regex"));
static OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));
static ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[\s\S]*\]").expect("valid regex"));

/// Parse JSON from text, with support for markdown code blocks.
///
/// Tried in order:
/// - the whole text
/// - a ```json ... ``` block
/// - any ``` ... ``` block
/// - the outermost `{...}` span, then the outermost `[...]` span
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let text = text.trim();
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(text) {
        return Some(parsed);
    }

    for pattern in [&*JSON_FENCE, &*ANY_FENCE, &*OBJECT, &*ARRAY] {
        if let Some(captures) = pattern.captures(text) {
            let candidate = match captures.get(1) {
                Some(inner) => inner.as_str(),
                None => captures.get(0).map(|c| c.as_str()).unwrap_or(text),
            };
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(candidate.trim()) {
                return Some(parsed);
            }
        }
    }

    None
}
