//! Pure snapshot-to-text rendering. No IO here, so every view is testable.

use crate::domain::{
    AnalysisStatus, ChatMessage, Document, DocumentAnalysis, DocumentPreview, DocumentStatus,
    Sender,
};
use crate::usecases::SessionSnapshot;
use chrono::{DateTime, Utc};

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

pub fn status_label(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Processing => "processing",
        DocumentStatus::Ready => "ready",
        DocumentStatus::Failed => "failed",
    }
}

pub fn analysis_status_label(status: AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Pending => "pending",
        AnalysisStatus::Processing => "processing",
        AnalysisStatus::Completed => "completed",
        AnalysisStatus::Failed => "failed",
        AnalysisStatus::Limited => "limited",
    }
}

/// One-line entry for the document picker.
pub fn document_line(document: &Document) -> String {
    format!(
        "{} [{}] {} ({})",
        document.name,
        status_label(document.status),
        format_time(document.created_at),
        document.file_type
    )
}

/// Header line shown above the chat prompt.
pub fn session_header(snapshot: &SessionSnapshot) -> String {
    match &snapshot.current_document {
        Some(document) => {
            let analysis = snapshot
                .document_analysis
                .as_ref()
                .map(|a| analysis_status_label(a.status))
                .unwrap_or("none");
            format!(
                "{} [{}] — analysis: {}",
                document.name,
                status_label(document.status),
                analysis
            )
        }
        None => "no document selected".to_string(),
    }
}

pub fn message_line(message: &ChatMessage) -> String {
    let speaker = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "assistant",
        Sender::System => "system",
    };
    let marker = if message.id.is_pending() { " (sending)" } else { "" };
    format!(
        "[{}] {}{}: {}",
        format_time(message.timestamp),
        speaker,
        marker,
        message.content
    )
}

pub fn render_transcript(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return "(no messages yet)".to_string();
    }
    messages
        .iter()
        .map(message_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_analysis(analysis: &DocumentAnalysis) -> String {
    let mut lines = vec![
        format!("Status: {}", analysis_status_label(analysis.status)),
        format!("Summary: {}", analysis.summary),
    ];
    if let Some(error) = &analysis.error_message {
        lines.push(format!("Error: {error}"));
    }
    if !analysis.keywords.is_empty() {
        lines.push(format!("Keywords: {}", analysis.keywords.join(", ")));
    }
    if !analysis.topics.is_empty() {
        lines.push(format!("Topics: {}", analysis.topics.join(", ")));
    }
    lines.push(format!("Sentiment: {}", analysis.sentiment));
    for (kind, values) in &analysis.entities {
        lines.push(format!("{}: {}", kind, values.join(", ")));
    }
    lines.join("\n")
}

/// Plain-text rendering of a preview: strips tags from HTML content, passes
/// anything else through unchanged.
pub fn render_preview(preview: &DocumentPreview) -> String {
    let body = if preview.mime_type.contains("html") {
        strip_tags(&preview.content)
    } else {
        preview.content.clone()
    };
    format!(
        "version {} · updated {}\n\n{}",
        preview.version,
        format_time(preview.last_updated),
        body.trim()
    )
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                // Block-level boundaries become line breaks.
                if !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}
