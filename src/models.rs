//! The loaded model set and the concrete conversion engine built on it.
//!
//! [`load_all_models`] runs once at startup. It binds pdfium and resolves the
//! OCR vision model; the resulting [`ModelSet`] is shared read-only by every
//! request for the life of the process.
//!
//! ## Conversion flow
//!
//! ```text
//! extract (blocking) ──▶ OCR blank pages (concurrent, ordered) ──▶ clean + join
//! ```
//!
//! The text layer is authoritative whenever it exists. Only pages with no
//! extractable text are sent to the vision model, so born-digital PDFs never
//! touch the network.

use crate::config::{ConversionOptions, ModelConfig, OcrSettings};
use crate::engine::ConversionEngine;
use crate::error::{EngineError, Pdf2TextError};
use crate::output::RawConversion;
use crate::pipeline::extract::{
    self, DocumentInfo, ExtractSettings, ExtractedDocument, ExtractedPage,
};
use crate::pipeline::{encode, ocr, postprocess};
use crate::prompts::ocr_system_prompt;
use async_trait::async_trait;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt, TryStreamExt};
use pdfium_render::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_OCR_MODEL: &str = "gpt-4.1-nano";

/// A resolved vision model plus the settings it is called with.
#[derive(Clone)]
pub struct OcrModel {
    pub provider: Arc<dyn LLMProvider>,
    pub settings: OcrSettings,
}

/// Everything a conversion needs, loaded once.
#[derive(Clone)]
pub struct ModelSet {
    pdfium: Arc<Pdfium>,
    ocr: Option<OcrModel>,
    extract_images: bool,
    render_pixels: u32,
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSet")
            .field("ocr", &self.ocr.is_some())
            .field("extract_images", &self.extract_images)
            .field("render_pixels", &self.render_pixels)
            .finish()
    }
}

/// Load pdfium and the OCR model.
///
/// # Errors
/// * [`Pdf2TextError::PdfiumBindingFailed`] when no pdfium library can be bound.
/// * [`Pdf2TextError::ProviderNotConfigured`] when an explicitly named OCR
///   provider cannot be created. Auto-detection finding nothing is not an
///   error; the service then runs text-layer only.
pub async fn load_all_models(config: &ModelConfig) -> Result<ModelSet, Pdf2TextError> {
    let pdfium = bind_pdfium(config)?;

    let ocr = if config.ocr.enabled {
        resolve_provider(&config.ocr)?.map(|provider| OcrModel {
            provider,
            settings: config.ocr.clone(),
        })
    } else {
        info!("OCR disabled by configuration");
        None
    };

    info!(
        "Models loaded (ocr: {}, extract_images: {})",
        if ocr.is_some() { "on" } else { "off" },
        config.extract_images
    );

    Ok(ModelSet {
        pdfium,
        ocr,
        extract_images: config.extract_images,
        render_pixels: config.render_pixels,
    })
}

/// Bind pdfium: explicit path (config, then `PDFIUM_LIB_PATH`), else system library.
fn bind_pdfium(config: &ModelConfig) -> Result<Arc<Pdfium>, Pdf2TextError> {
    let explicit = config
        .pdfium_lib_path
        .clone()
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(Into::into));

    let bindings = match explicit {
        Some(path) => {
            debug!("Binding pdfium from {}", path.display());
            let lib = if path.is_dir() {
                PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                path.clone()
            };
            Pdfium::bind_to_library(lib).or_else(|e| {
                warn!(
                    "pdfium not loadable from {} ({:?}), trying system library",
                    path.display(),
                    e
                );
                Pdfium::bind_to_system_library()
            })
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Pdf2TextError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Arc::new(Pdfium::new(bindings)))
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2TextError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2TextError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the OCR provider, from most-specific to least-specific.
///
/// 1. **Named provider + model** (`settings.provider_name`). Failure is fatal.
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
///    Also fatal on failure.
/// 3. **`OPENAI_API_KEY`** present → OpenAI with the configured model.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`). Finding nothing
///    returns `Ok(None)`.
fn resolve_provider(settings: &OcrSettings) -> Result<Option<Arc<dyn LLMProvider>>, Pdf2TextError> {
    let model = settings.model.as_deref().unwrap_or(DEFAULT_OCR_MODEL);

    if let Some(ref name) = settings.provider_name {
        info!("OCR provider: {} ({})", name, model);
        return create_vision_provider(name, model).map(Some);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            info!("OCR provider from environment: {} ({})", prov, env_model);
            return create_vision_provider(&prov, &env_model).map(Some);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            info!("OCR provider: openai ({})", model);
            return create_vision_provider("openai", model).map(Some);
        }
    }

    match ProviderFactory::from_env() {
        Ok((llm_provider, _embedding)) => {
            info!("OCR provider auto-detected from environment");
            Ok(Some(llm_provider))
        }
        Err(e) => {
            warn!(
                "No OCR provider could be auto-detected ({}); pages without a text layer will convert to empty text",
                e
            );
            Ok(None)
        }
    }
}

#[async_trait]
impl ConversionEngine for ModelSet {
    async fn convert(
        &self,
        path: &Path,
        options: &ConversionOptions,
    ) -> Result<RawConversion, EngineError> {
        let settings = ExtractSettings {
            render_blank_pages: self.ocr.is_some(),
            extract_images: self.extract_images,
            render_pixels: self.render_pixels,
        };
        let mut doc =
            extract::extract_document(Arc::clone(&self.pdfium), path, options, settings).await?;

        let ocr_texts = match self.ocr {
            Some(ref model) => run_ocr(model, &mut doc, options).await?,
            None => HashMap::new(),
        };

        let text = assemble_text(&doc.pages, &ocr_texts);

        let metadata = build_metadata(
            options,
            doc.total_pages,
            doc.pages.len(),
            ocr_texts.len(),
            &doc.info,
        );

        Ok(RawConversion {
            text: Some(text),
            images: std::mem::take(&mut doc.images),
            metadata,
        })
    }
}

/// OCR every rendered page; returns text keyed by 0-indexed page.
///
/// Page order is kept by `buffered`; the first failure aborts the document.
async fn run_ocr(
    model: &OcrModel,
    doc: &mut ExtractedDocument,
    options: &ConversionOptions,
) -> Result<HashMap<usize, String>, EngineError> {
    let mut jobs = Vec::new();
    for page in doc.pages.iter_mut() {
        if let Some(img) = page.render.take() {
            let page_num = page.index + 1;
            let data = encode::encode_page(&img).map_err(|e| EngineError::RasterisationFailed {
                page: page_num,
                detail: e.to_string(),
            })?;
            jobs.push((page.index, data));
        }
    }
    if jobs.is_empty() {
        return Ok(HashMap::new());
    }

    let prompt = ocr_system_prompt(model.settings.system_prompt.as_deref(), &options.languages);
    let in_flight = ocr_in_flight(&model.settings, options);
    info!("OCR: {} page(s), {} in flight", jobs.len(), in_flight);

    let results: Vec<(usize, String)> = stream::iter(jobs.into_iter().map(|(idx, data)| {
        let provider = Arc::clone(&model.provider);
        let prompt = prompt.as_str();
        let settings = &model.settings;
        async move {
            let text = ocr::ocr_page(&provider, idx + 1, data, prompt, settings).await?;
            Ok::<_, EngineError>((idx, text))
        }
    }))
    .buffered(in_flight)
    .try_collect()
    .await?;

    Ok(results.into_iter().collect())
}

/// Clean and join the selected pages, preferring OCR text where a page has it.
///
/// A blank page with no OCR result contributes nothing.
fn assemble_text(pages: &[ExtractedPage], ocr_texts: &HashMap<usize, String>) -> String {
    let texts = pages.iter().map(|page| {
        let raw = ocr_texts
            .get(&page.index)
            .map(String::as_str)
            .unwrap_or(&page.text);
        postprocess::clean_page_text(raw)
    });
    postprocess::join_pages(texts)
}

/// Concurrent OCR calls for one document: base concurrency scaled by the
/// request's batch multiplier.
fn ocr_in_flight(settings: &OcrSettings, options: &ConversionOptions) -> usize {
    settings
        .concurrency
        .max(1)
        .saturating_mul(options.batch_multiplier.max(1))
}

fn build_metadata(
    options: &ConversionOptions,
    total_pages: usize,
    converted: usize,
    ocr_pages: usize,
    info: &DocumentInfo,
) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("filetype".into(), json!("pdf"));
    meta.insert("languages".into(), json!(options.languages));
    meta.insert("total_pages".into(), json!(total_pages));
    meta.insert("start_page".into(), json!(options.start_page));
    meta.insert("pages".into(), json!(converted));

    let fields = [
        ("title", &info.title),
        ("author", &info.author),
        ("subject", &info.subject),
        ("creator", &info.creator),
        ("producer", &info.producer),
    ];
    for (key, value) in fields {
        if let Some(v) = value {
            meta.insert(key.into(), json!(v));
        }
    }

    meta.insert("ocr_stats".into(), json!({ "ocr_pages": ocr_pages }));
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::{ChatMessage, CompletionOptions, LLMResponse, LlmError, MockProvider};
    use image::DynamicImage;
    use std::collections::BTreeMap;

    /// Rejects every call, as an unreachable endpoint would.
    struct DownProvider;

    #[async_trait]
    impl LLMProvider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        fn model(&self) -> &str {
            "down-model"
        }

        fn max_context_length(&self) -> usize {
            4096
        }

        async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            Err(LlmError::NetworkError("connection refused".into()))
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete(prompt).await
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete("").await
        }
    }

    fn blank_page(index: usize) -> ExtractedPage {
        ExtractedPage {
            index,
            text: String::new(),
            render: Some(DynamicImage::new_rgb8(8, 8)),
        }
    }

    fn text_page(index: usize, text: &str) -> ExtractedPage {
        ExtractedPage {
            index,
            text: text.into(),
            render: None,
        }
    }

    fn document(pages: Vec<ExtractedPage>) -> ExtractedDocument {
        ExtractedDocument {
            total_pages: pages.len(),
            pages,
            images: BTreeMap::new(),
            info: DocumentInfo::default(),
        }
    }

    fn serial_model(provider: Arc<dyn LLMProvider>) -> OcrModel {
        OcrModel {
            provider,
            settings: OcrSettings {
                concurrency: 1,
                ..Default::default()
            },
        }
    }

    fn serial_options() -> ConversionOptions {
        ConversionOptions {
            batch_multiplier: 1,
            ..Default::default()
        }
    }

    #[test]
    fn model_set_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelSet>();
        assert_send_sync::<Arc<dyn ConversionEngine>>();
    }

    #[tokio::test]
    async fn ocr_results_are_keyed_by_blank_page() {
        let mock = MockProvider::new();
        mock.add_response("page one ocr").await;
        mock.add_response("page three ocr").await;
        let model = serial_model(Arc::new(mock));
        let mut doc = document(vec![blank_page(0), text_page(1, "born digital"), blank_page(2)]);

        let ocr = run_ocr(&model, &mut doc, &serial_options()).await.unwrap();

        assert_eq!(ocr.len(), 2);
        assert_eq!(ocr[&0], "page one ocr");
        assert_eq!(ocr[&2], "page three ocr");
        assert!(!ocr.contains_key(&1));
        assert!(doc.pages.iter().all(|p| p.render.is_none()));

        let text = assemble_text(&doc.pages, &ocr);
        let one = text.find("page one ocr").unwrap();
        let two = text.find("born digital").unwrap();
        let three = text.find("page three ocr").unwrap();
        assert!(one < two && two < three, "pages out of order: {text:?}");
    }

    #[tokio::test]
    async fn ocr_skips_provider_without_rendered_pages() {
        let model = serial_model(Arc::new(DownProvider));
        let mut doc = document(vec![text_page(0, "only text")]);

        let ocr = run_ocr(&model, &mut doc, &serial_options()).await.unwrap();
        assert!(ocr.is_empty());
    }

    #[tokio::test]
    async fn provider_error_names_the_failing_page() {
        let model = serial_model(Arc::new(DownProvider));
        let mut doc = document(vec![text_page(0, "cover"), blank_page(1), blank_page(2)]);

        let err = run_ocr(&model, &mut doc, &serial_options())
            .await
            .unwrap_err();
        match err {
            EngineError::OcrFailed { page, detail } => {
                assert_eq!(page, 2);
                assert!(detail.contains("connection refused"), "detail: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_pages_without_ocr_give_empty_text() {
        let pages = vec![
            ExtractedPage {
                index: 0,
                text: "  \n".into(),
                render: None,
            },
            text_page(1, ""),
        ];
        assert_eq!(assemble_text(&pages, &HashMap::new()), "");
    }

    #[test]
    fn text_layer_used_when_no_ocr_result() {
        let pages = vec![text_page(0, "first"), text_page(1, ""), text_page(2, "third")];
        let text = assemble_text(&pages, &HashMap::new());
        assert!(text.starts_with("first"));
        assert!(text.contains("third"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn in_flight_scales_with_multiplier() {
        let settings = OcrSettings {
            concurrency: 3,
            ..Default::default()
        };
        let options = ConversionOptions {
            batch_multiplier: 4,
            ..Default::default()
        };
        assert_eq!(ocr_in_flight(&settings, &options), 12);

        let defaults = ConversionOptions::default();
        assert_eq!(ocr_in_flight(&OcrSettings::default(), &defaults), 4);
    }

    #[test]
    fn metadata_has_core_keys_and_skips_missing_info() {
        let options = ConversionOptions {
            languages: vec!["en".into()],
            start_page: 1,
            ..Default::default()
        };
        let info = DocumentInfo {
            title: Some("Annual Report".into()),
            ..Default::default()
        };
        let meta = build_metadata(&options, 12, 10, 2, &info);

        assert_eq!(meta["filetype"], "pdf");
        assert_eq!(meta["languages"], json!(["en"]));
        assert_eq!(meta["total_pages"], 12);
        assert_eq!(meta["start_page"], 1);
        assert_eq!(meta["pages"], 10);
        assert_eq!(meta["title"], "Annual Report");
        assert!(!meta.contains_key("author"));
        assert_eq!(meta["ocr_stats"]["ocr_pages"], 2);
    }
}
