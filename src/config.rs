//! Configuration types for the conversion service.
//!
//! Process-wide knobs live in [`ServiceConfig`], built via its
//! [`ServiceConfigBuilder`]. Per-document knobs live in [`ConversionOptions`],
//! resolved once per instance from server defaults, request `parameters`, and
//! instance fields (see [`OptionOverrides`]).

use crate::error::Pdf2TextError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Options handed to the conversion engine for one document.
///
/// Immutable once resolved; every instance gets its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Language hints (e.g. `"en"`, `"de"`), in priority order. May be empty.
    pub languages: Vec<String>,
    /// First page to convert, 0-indexed. Default: 0.
    pub start_page: usize,
    /// Maximum number of pages to convert. Default: 10.
    pub max_pages: usize,
    /// Throughput multiplier for the engine's internal parallelism. Default: 2.
    pub batch_multiplier: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            start_page: 0,
            max_pages: 10,
            batch_multiplier: 2,
        }
    }
}

impl ConversionOptions {
    /// Reject values the engine cannot honour.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_pages == 0 {
            return Err("max_pages must be ≥ 1".into());
        }
        if self.batch_multiplier == 0 {
            return Err("batch_multiplier must be ≥ 1".into());
        }
        Ok(())
    }

    /// Indices of the pages to convert in a document of `total_pages` pages.
    ///
    /// A start page past the end yields an empty range.
    pub fn page_range(&self, total_pages: usize) -> std::ops::Range<usize> {
        let start = self.start_page.min(total_pages);
        let end = self.start_page.saturating_add(self.max_pages).min(total_pages);
        start..end
    }
}

/// Optional per-request or per-instance overrides of [`ConversionOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionOverrides {
    #[serde(default, alias = "langs", skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_multiplier: Option<usize>,
}

impl OptionOverrides {
    /// Layer these overrides on top of `base`.
    pub fn apply(&self, mut base: ConversionOptions) -> ConversionOptions {
        if let Some(ref langs) = self.languages {
            base.languages = langs.clone();
        }
        if let Some(p) = self.start_page {
            base.start_page = p;
        }
        if let Some(n) = self.max_pages {
            base.max_pages = n;
        }
        if let Some(m) = self.batch_multiplier {
            base.batch_multiplier = m;
        }
        base
    }
}

/// What a failing instance does to the rest of its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// The first failing instance fails the whole request. (default)
    #[default]
    FailFast,
    /// A failing instance yields an empty prediction carrying its error.
    PerInstance,
}

/// Settings for the vision model that reads pages without a text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSettings {
    /// Run OCR on blank pages at all. Default: true.
    pub enabled: bool,
    /// Provider name (e.g. "openai", "anthropic", "ollama"). None = auto-detect.
    pub provider_name: Option<String>,
    /// Model identifier. None = provider default.
    pub model: Option<String>,
    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,
    /// Maximum output tokens per page. Default: 4096.
    pub max_tokens: usize,
    /// Base number of concurrent OCR calls, multiplied by `batch_multiplier`. Default: 2.
    pub concurrency: usize,
    /// Custom system prompt. None = built-in default.
    pub system_prompt: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_name: None,
            model: None,
            temperature: 0.1,
            max_tokens: 4096,
            concurrency: 2,
            system_prompt: None,
        }
    }
}

/// Everything [`crate::models::load_all_models`] needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Explicit libpdfium path. None = `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,
    /// Vision-model OCR for pages without a text layer.
    pub ocr: OcrSettings,
    /// Export embedded raster images as PNG artifacts. Default: false.
    pub extract_images: bool,
    /// Longest rendered edge, in pixels, of a page sent to OCR. Default: 2000.
    pub render_pixels: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            pdfium_lib_path: None,
            ocr: OcrSettings::default(),
            extract_images: false,
            render_pixels: 2000,
        }
    }
}

/// Process-wide configuration of the conversion service.
///
/// Built via [`ServiceConfig::builder()`] or [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2text::{FailureMode, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .port(9000)
///     .failure_mode(FailureMode::PerInstance)
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 9000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Listen address. Default: 0.0.0.0.
    pub host: IpAddr,
    /// Listen port. Default: 8000.
    pub port: u16,
    /// Directory holding in-flight transient files. Default: `<temp>/pdf2text`.
    pub temp_dir: PathBuf,
    /// Maximum `/predict` body size in bytes. Default: 64 MiB.
    pub max_body_bytes: usize,
    /// Options used when neither the request nor the instance overrides them.
    pub defaults: ConversionOptions,
    /// Batch failure semantics. Default: [`FailureMode::FailFast`].
    pub failure_mode: FailureMode,
    /// Model loading configuration.
    pub models: ModelConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            temp_dir: std::env::temp_dir().join("pdf2text"),
            max_body_bytes: 64 * 1024 * 1024,
            defaults: ConversionOptions::default(),
            failure_mode: FailureMode::default(),
            models: ModelConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Socket address the server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = dir.into();
        self
    }

    pub fn max_body_bytes(mut self, n: usize) -> Self {
        self.config.max_body_bytes = n;
        self
    }

    pub fn languages(mut self, langs: Vec<String>) -> Self {
        self.config.defaults.languages = langs;
        self
    }

    pub fn start_page(mut self, page: usize) -> Self {
        self.config.defaults.start_page = page;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.defaults.max_pages = n;
        self
    }

    pub fn batch_multiplier(mut self, n: usize) -> Self {
        self.config.defaults.batch_multiplier = n;
        self
    }

    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.config.failure_mode = mode;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.models.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.models.ocr.enabled = v;
        self
    }

    pub fn ocr_provider(mut self, name: impl Into<String>) -> Self {
        self.config.models.ocr.provider_name = Some(name.into());
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.models.ocr.model = Some(model.into());
        self
    }

    pub fn ocr_temperature(mut self, t: f32) -> Self {
        self.config.models.ocr.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn ocr_max_tokens(mut self, n: usize) -> Self {
        self.config.models.ocr.max_tokens = n;
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.models.ocr.concurrency = n.max(1);
        self
    }

    pub fn ocr_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.models.ocr.system_prompt = Some(prompt.into());
        self
    }

    pub fn extract_images(mut self, v: bool) -> Self {
        self.config.models.extract_images = v;
        self
    }

    /// Clamped to 100–10000 px.
    pub fn render_pixels(mut self, px: u32) -> Self {
        self.config.models.render_pixels = px.clamp(100, 10_000);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, Pdf2TextError> {
        let c = &self.config;
        c.defaults
            .validate()
            .map_err(Pdf2TextError::InvalidConfig)?;
        if c.max_body_bytes == 0 {
            return Err(Pdf2TextError::InvalidConfig(
                "max_body_bytes must be ≥ 1".into(),
            ));
        }
        if c.temp_dir.as_os_str().is_empty() {
            return Err(Pdf2TextError::InvalidConfig(
                "temp_dir must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
