use std::sync::OnceLock;

use regex::Regex;

use crate::analysis::types::AnalysisResult;
use crate::errors::{CalibError, CalibResult};

fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Greedy: first `{` through last `}`.
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

/// Parse the model's free-form text reply into an [`AnalysisResult`].
///
/// Models wrap JSON in code fences or prose; the outermost `{...}` span is
/// used when present, otherwise the whole text is tried as-is.
pub fn parse_model_text(text: &str) -> CalibResult<AnalysisResult> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CalibError::Analysis("model returned no text content".into()));
    }

    let target = json_object_pattern()
        .find(text)
        .map_or(text, |m| m.as_str());

    serde_json::from_str(target).map_err(|e| {
        tracing::error!(error = %e, raw = %text, "failed to parse analysis JSON");
        CalibError::Analysis(format!("model did not produce a valid JSON result: {e}"))
    })
}
