//! System prompt for OCR of pages that carry no text layer.
//!
//! The prompt asks for plain text, not Markdown: the service returns text and
//! downstream consumers do their own structuring. Callers can replace it via
//! [`crate::config::OcrSettings::system_prompt`]; language hints from the
//! request are appended either way.

/// Default OCR system prompt.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are a precise OCR engine. Transcribe ALL text visible in the page image.

Rules:
1. Preserve the reading order a human would follow, column by column.
2. Keep paragraph breaks as blank lines. Keep list items on their own lines.
3. Render tables row by row, separating cells with " | ".
4. Do not translate, summarise, or correct the text.
5. Ignore decorative borders, page numbers, and repeated running headers.
6. Output ONLY the transcribed text. No commentary, no code fences, no Markdown headings."#;

/// Build the system prompt for one document.
///
/// `base` is the configured override or [`DEFAULT_OCR_PROMPT`]. When
/// `languages` is non-empty a hint line is appended so the model does not
/// guess the script.
pub fn ocr_system_prompt(base: Option<&str>, languages: &[String]) -> String {
    let base = base.unwrap_or(DEFAULT_OCR_PROMPT);
    if languages.is_empty() {
        return base.to_string();
    }
    format!(
        "{}\n\nThe document is written in: {}.",
        base,
        languages.join(", ")
    )
}
