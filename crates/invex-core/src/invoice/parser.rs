//! Two-stage JSON recovery: fenced code block first, brace span fallback.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::trace;

lazy_static! {
    // Fenced code block holding a JSON object, optionally tagged "json".
    static ref FENCED_JSON: Regex = Regex::new(
        r"```(?:json)?\s*(\{[\s\S]*?\})\s*```"
    ).unwrap();

    // Greedy first-`{`-to-last-`}` span over the whole text. Lossy by
    // design: it can misfire on unrelated brace-delimited content, which
    // the strict decode below then rejects. Known limitation.
    static ref BRACE_SPAN: Regex = Regex::new(
        r"(?s)(\{.*\})"
    ).unwrap();
}

/// Recover a JSON object from raw model text.
///
/// The model is not guaranteed to wrap its answer in a code fence, so a
/// fenced block is preferred and the brace span is the fallback. The
/// selected candidate is decoded strictly; any decode failure yields
/// `None` with no repair attempts and no partial recovery. Never panics,
/// never errors.
pub fn parse_model_response(text: &str) -> Option<Map<String, Value>> {
    let candidate = FENCED_JSON
        .captures(text)
        .or_else(|| BRACE_SPAN.captures(text))
        .and_then(|caps| caps.get(1))?
        .as_str();

    match serde_json::from_str::<Map<String, Value>>(candidate) {
        Ok(map) => Some(map),
        Err(e) => {
            trace!("candidate rejected by strict decode: {}", e);
            None
        }
    }
}
