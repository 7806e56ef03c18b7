//! Vision-model OCR for one rendered page.
//!
//! A single provider call per page, no retry. A failed call surfaces as
//! [`EngineError::OcrFailed`] and fails the document.

use crate::config::OcrSettings;
use crate::error::EngineError;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Transcribe the page image `image_data` (1-indexed `page_num`).
pub async fn ocr_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image_data: ImageData,
    system_prompt: &str,
    settings: &OcrSettings,
) -> Result<String, EngineError> {
    let start = Instant::now();
    // The image carries the content; the user turn text stays empty.
    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images("", vec![image_data]),
    ];
    let options = build_options(settings);

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| EngineError::OcrFailed {
            page: page_num,
            detail: e.to_string(),
        })?;

    debug!(
        "Page {}: OCR {} input tokens, {} output tokens, {:?}",
        page_num,
        response.prompt_tokens,
        response.completion_tokens,
        start.elapsed()
    );
    Ok(response.content)
}

fn build_options(settings: &OcrSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        ..Default::default()
    }
}
