//! Best-effort JSON extraction from model turns.
//!
//! Persona turns are asked for fenced JSON but frequently wrap it in prose.
//! Extraction tries a fenced ```json block first, then the whole text, and
//! reports absence with `None` rather than an error — callers decide per
//! stage whether missing structure is recoverable.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Matches a fenced ```json block containing a single object, non-greedy
/// so trailing prose after the fence does not leak into the capture.
fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("valid regex"))
}

/// Extract the JSON part from a model turn.
///
/// Returns the parsed structure, or `None` when no structured data is
/// present. Never fails.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(caps) = fenced_json_re().captures(text) {
        if let Ok(value) = serde_json::from_str(&caps[1]) {
            return Some(value);
        }
    }

    serde_json::from_str(text.trim()).ok()
}
