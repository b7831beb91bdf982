//! Message composition for upload reports.
//!
//! Everything here is pure string building so the report shapes stay
//! testable without a live bot.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::traits::FileHost;
use crate::types::{UploadFailure, UploadOutcome};

/// Trailing paragraph shown on a report that carries the album buttons.
/// The cancel handler strips exactly this paragraph again.
pub(crate) const ALBUM_PROMPT: &str = "Create a shared album from the uploaded files?";

pub(crate) const CANCEL_NOTICE: &str = "Album creation cancelled.";

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Sanitize a filename: remove path separators, null bytes, and limit length.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .collect();
    // Strip path traversal sequences
    let sanitized = sanitized.replace("..", "");
    if sanitized.len() <= 200 {
        return sanitized;
    }
    // Keep the extension when truncating, staying on char boundaries.
    let (stem, ext) = match sanitized.rfind('.') {
        Some(pos) if sanitized.len() - pos < 20 => sanitized.split_at(pos),
        _ => (sanitized.as_str(), ""),
    };
    let budget = 200 - ext.len();
    let mut cut = budget.min(stem.len());
    while cut > 0 && !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &stem[..cut], ext)
}

/// One-line failure description, keyed back to the originating message.
fn failure_line(failure: &UploadFailure) -> String {
    match &failure.file_name {
        Some(name) => format!(
            "📄 message {} ({}): {}",
            failure.message_id.0,
            html_escape(name),
            html_escape(&failure.error.to_string())
        ),
        None => format!(
            "📄 message {}: {}",
            failure.message_id.0,
            html_escape(&failure.error.to_string())
        ),
    }
}

/// Final text for a single-attachment batch.
pub(crate) fn single_report(outcome: &UploadOutcome, host: &dyn FileHost) -> String {
    match outcome {
        Ok(file) => format!(
            "✅ <b>Upload complete!</b>\n\n🔗 Link: {}",
            host.file_link(&file.file_id)
        ),
        Err(failure) => format!("❌ <b>Upload failed.</b>\n\n{}", failure_line(failure)),
    }
}

/// Combined text for a multi-attachment batch: counts, then link lines in
/// submission order, then failure lines in submission order.
pub(crate) fn batch_report(outcomes: &[UploadOutcome], host: &dyn FileHost) -> String {
    let total = outcomes.len();
    let successes: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
    let failures: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().err()).collect();

    let mut text = format!("✅ <b>Uploaded {}/{} files.</b>\n\n", successes.len(), total);
    if !successes.is_empty() {
        text.push_str("<b>Links:</b>\n");
        for file in &successes {
            text.push_str(&format!("🔗 {}\n", host.file_link(&file.file_id)));
        }
        text.push('\n');
    }
    if !failures.is_empty() {
        text.push_str("❌ <b>Failed:</b>\n");
        for failure in &failures {
            text.push_str(&failure_line(failure));
            text.push('\n');
        }
    }
    text.trim_end().to_string()
}

/// Ids of the successful uploads, in submission order.
pub(crate) fn successful_ids(outcomes: &[UploadOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .filter_map(|o| o.as_ref().ok().map(|f| f.file_id.clone()))
        .collect()
}

/// Drop the trailing paragraph (the album prompt) from a report text.
pub(crate) fn strip_choices_paragraph(text: &str) -> String {
    let trimmed = text.trim_end();
    match trimmed.rfind("\n\n") {
        Some(pos) => trimmed[..pos].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Create/cancel buttons tagged with the batch token.
pub(crate) fn album_keyboard(token: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("Create album ✅", format!("album:create:{}", token)),
        InlineKeyboardButton::callback("Cancel ❌", format!("album:cancel:{}", token)),
    ]])
}

/// /start and /help reply.
pub(crate) fn build_help_text() -> String {
    "Hi! Send me a file and I will upload it to Pixeldrain and hand back a shareable link.\n\n\
     Files sent in one burst are uploaded together, and afterwards you can bundle the links \
     into a shared album.\n\n\
     Commands:\n\
     /help — Show this message"
        .to_string()
}
