//! Verdict interpretation.
//!
//! Turns raw model output into a [`VerdictEntry`]. Anything that is not
//! exactly `{outcome, risk, reason}` with known values becomes
//! `AnalysisFailed`; nothing here ever invents an approval or rejection.

use blastguard_llm::InferenceError;
use serde::Deserialize;

use crate::domain::verdict::{Outcome, Risk, Verdict, VerdictEntry};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireVerdict {
    outcome: Outcome,
    risk: Risk,
    reason: String,
}

/// Decode `raw` as the verdict for `file`.
pub fn interpret(file: &str, raw: &str) -> VerdictEntry {
    let body = strip_code_fence(raw);
    match serde_json::from_str::<WireVerdict>(body) {
        Ok(wire) => VerdictEntry::Assessed(Verdict {
            file: file.to_string(),
            outcome: wire.outcome,
            risk: wire.risk,
            reason: wire.reason.trim().to_string(),
        }),
        Err(e) => VerdictEntry::AnalysisFailed {
            file: file.to_string(),
            cause: format!("malformed verdict: {e}"),
        },
    }
}

/// Interpret the outcome of an inference call. Transport failures and
/// timeouts are recorded the same way as unparsable replies.
pub fn interpret_response(
    file: &str,
    response: std::result::Result<String, InferenceError>,
) -> VerdictEntry {
    match response {
        Ok(raw) => interpret(file, &raw),
        Err(e) => VerdictEntry::AnalysisFailed {
            file: file.to_string(),
            cause: e.to_string(),
        },
    }
}

// Some models wrap JSON in a ```json fence despite the response format.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) up to the first newline.
    match rest.find('\n') {
        Some(idx) => rest[idx + 1..].trim(),
        None => rest.trim(),
    }
}
