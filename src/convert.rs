//! Conversion invoker: one engine call, normalised into a [`ConversionResult`].
//!
//! [`convert_file`] is the thin wrapper around [`ConversionEngine::convert`]:
//! options pass through untouched, a missing text field becomes an empty
//! string, and engine errors propagate unmodified. Nothing here retries.
//!
//! [`convert_bytes`] adds the transient-file discipline around it for callers
//! holding document bytes rather than a path.

use crate::config::ConversionOptions;
use crate::engine::ConversionEngine;
use crate::error::{EngineError, Pdf2TextError};
use crate::output::ConversionResult;
use crate::transient::TransientStore;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Convert the document at `path` with `engine`.
///
/// # Errors
/// Returns the engine's error exactly as raised.
pub async fn convert_file(
    engine: &dyn ConversionEngine,
    path: &Path,
    options: &ConversionOptions,
) -> Result<ConversionResult, EngineError> {
    let start = Instant::now();
    debug!("Converting {} with {:?}", path.display(), options);

    let raw = engine.convert(path, options).await?;
    let result = ConversionResult::from(raw);

    info!(
        "Converted {} → {} chars, {} images in {}ms",
        path.display(),
        result.full_text.chars().count(),
        result.images.len(),
        start.elapsed().as_millis()
    );
    Ok(result)
}

/// Convert in-memory document bytes.
///
/// The bytes are written to a transient file from `store`, converted, and the
/// file is released before returning, whatever the outcome. `index` only
/// labels an engine failure with the instance it belongs to.
pub async fn convert_bytes(
    engine: &dyn ConversionEngine,
    store: &TransientStore,
    bytes: Vec<u8>,
    options: &ConversionOptions,
    index: usize,
) -> Result<ConversionResult, Pdf2TextError> {
    let file = store.acquire(bytes).await?;
    let result = convert_file(engine, file.path(), options).await;
    // Released before the error is propagated; `Drop` covers cancellation.
    file.release();
    result.map_err(|source| Pdf2TextError::ConversionFailed { index, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RawConversion;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records what it was called with; fails when the file starts with "ERR".
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<(std::path::PathBuf, ConversionOptions, bool)>>,
        omit_text: bool,
    }

    #[async_trait]
    impl ConversionEngine for RecordingEngine {
        async fn convert(
            &self,
            path: &Path,
            options: &ConversionOptions,
        ) -> Result<RawConversion, EngineError> {
            let bytes = std::fs::read(path).map_err(|e| EngineError::Internal(e.to_string()))?;
            self.calls
                .lock()
                .unwrap()
                .push((path.to_path_buf(), options.clone(), path.exists()));
            if bytes.starts_with(b"ERR") {
                return Err(EngineError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: "bad xref".into(),
                });
            }
            let mut raw = RawConversion::default();
            if !self.omit_text {
                raw.text = Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            raw.metadata.insert("pages".into(), serde_json::json!(1));
            Ok(raw)
        }
    }

    #[tokio::test]
    async fn options_pass_through_unchanged() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = TransientStore::new(tmp.path());
        let engine = RecordingEngine::default();
        let options = ConversionOptions {
            languages: vec!["es".into(), "en".into()],
            start_page: 2,
            max_pages: 5,
            batch_multiplier: 4,
        };

        let result = convert_bytes(&engine, &store, b"hola".to_vec(), &options, 0)
            .await
            .unwrap();
        assert_eq!(result.full_text, "hola");
        assert_eq!(result.out_meta["pages"], 1);

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, options);
        assert!(calls[0].2, "file must exist during the engine call");
        assert!(!calls[0].0.exists(), "file must be gone afterwards");
    }

    #[tokio::test]
    async fn missing_text_defaults_to_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = TransientStore::new(tmp.path());
        let engine = RecordingEngine {
            omit_text: true,
            ..Default::default()
        };

        let result = convert_bytes(&engine, &store, b"x".to_vec(), &ConversionOptions::default(), 0)
            .await
            .unwrap();
        assert_eq!(result.full_text, "");
    }

    #[tokio::test]
    async fn multibyte_text_is_kept_intact() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = TransientStore::new(tmp.path());
        let engine = RecordingEngine::default();
        let text = "Größe: 5 µm, 東京";

        let result = convert_bytes(&engine, &store, text.as_bytes().to_vec(), &ConversionOptions::default(), 0)
            .await
            .unwrap();
        assert_eq!(result.full_text, text);
        assert_eq!(result.full_text.chars().count(), 15);
        assert!(result.full_text.len() > 15);
    }

    #[tokio::test]
    async fn engine_failure_propagates_and_cleans_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = TransientStore::new(tmp.path());
        let engine = RecordingEngine::default();

        let err = convert_bytes(&engine, &store, b"ERR".to_vec(), &ConversionOptions::default(), 3)
            .await
            .unwrap_err();
        match err {
            Pdf2TextError::ConversionFailed { index, source } => {
                assert_eq!(index, 3);
                assert!(matches!(source, EngineError::CorruptPdf { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let path = engine.calls.lock().unwrap()[0].0.clone();
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
