//! Intent inference from free-form chat text.
//!
//! Keyword sniffing is part of the observable contract with the backend
//! (`operation_type` on chat sends), so it lives behind pure functions that
//! the session controller calls and tests exercise directly.

use serde::{Deserialize, Serialize};

/// Operation hint sent alongside a chat message. The backend uses it to
/// pick a transformation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Summarize,
    Simplify,
    Extract,
    Format,
    Legal,
    Translate,
    General,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Summarize => "summarize",
            OperationType::Simplify => "simplify",
            OperationType::Extract => "extract",
            OperationType::Format => "format",
            OperationType::Legal => "legal",
            OperationType::Translate => "translate",
            OperationType::General => "general",
        }
    }
}

/// Infer the backend operation type from message text.
///
/// Case-insensitive containment, first match wins in the order below.
pub fn infer_operation_type(text: &str) -> OperationType {
    let lower = text.to_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if contains_any(&["summarize", "summary", "overview", "brief"]) {
        OperationType::Summarize
    } else if contains_any(&["simplify", "simpler", "plain language"]) {
        OperationType::Simplify
    } else if contains_any(&["extract", "action item", "pull out"]) {
        OperationType::Extract
    } else if contains_any(&["format", "structure", "reorganize"]) {
        OperationType::Format
    } else if contains_any(&["legal", "contract", "clause"]) {
        OperationType::Legal
    } else if contains_any(&["translate", "translation"]) {
        OperationType::Translate
    } else {
        OperationType::General
    }
}

/// True when the message asks to re-run the document analysis rather than
/// being a normal chat turn.
pub fn wants_analysis_retry(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("retry analysis") || lower.contains("analyze again")
}
