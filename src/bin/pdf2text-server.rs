//! HTTP server binary for edgequake-pdf2text.
//!
//! A thin shim: maps flags and `PDF2TEXT_*` environment variables onto
//! `ServiceConfig`, loads the models once, and serves until SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2text::{load_all_models, serve, FailureMode, ServiceConfig};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on 0.0.0.0:8000 with defaults
  pdf2text-server

  # Text layer only, no vision model
  pdf2text-server --no-ocr

  # Keep going when one document in a batch fails
  pdf2text-server --failure-mode per-instance

  # Convert a file
  curl -s localhost:8000/predict -H 'content-type: application/json' \
    -d "{\"instances\":[{\"content\":\"$(base64 -w0 doc.pdf)\"}]}"

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (OCR of scanned pages)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override OCR provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override OCR model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. edgequake_pdf2text=debug
"#;

/// Serve PDF-to-text conversion over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2text-server",
    version,
    about = "Serve PDF-to-text conversion over HTTP",
    long_about = "Accepts batches of base64-encoded PDFs on POST /predict and returns their text. \
Pages without a text layer are OCR'd with a vision LLM when one is configured.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "PDF2TEXT_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind.
    #[arg(short, long, env = "PDF2TEXT_PORT", default_value_t = 8000)]
    port: u16,

    /// Directory for transient PDF files (default: <system temp>/pdf2text).
    #[arg(long, env = "PDF2TEXT_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Maximum request body size in bytes.
    #[arg(long, env = "PDF2TEXT_MAX_BODY_BYTES", default_value_t = 64 * 1024 * 1024)]
    max_body_bytes: usize,

    /// Default language hints, comma separated.
    #[arg(long, env = "PDF2TEXT_LANGS", value_delimiter = ',')]
    langs: Vec<String>,

    /// Default first page to convert (0-based).
    #[arg(long, env = "PDF2TEXT_START_PAGE", default_value_t = 0)]
    start_page: usize,

    /// Default maximum number of pages per document.
    #[arg(long, env = "PDF2TEXT_MAX_PAGES", default_value_t = 10)]
    max_pages: usize,

    /// Default multiplier on OCR concurrency.
    #[arg(long, env = "PDF2TEXT_BATCH_MULTIPLIER", default_value_t = 2)]
    batch_multiplier: usize,

    /// What a failing instance does to its batch.
    #[arg(long, env = "PDF2TEXT_FAILURE_MODE", value_enum, default_value = "fail-fast")]
    failure_mode: FailureModeArg,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDF2TEXT_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Disable OCR of pages without a text layer.
    #[arg(long, env = "PDF2TEXT_NO_OCR")]
    no_ocr: bool,

    /// OCR provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PDF2TEXT_OCR_PROVIDER")]
    provider: Option<String>,

    /// OCR model ID (default: gpt-4.1-nano).
    #[arg(long, env = "PDF2TEXT_OCR_MODEL")]
    model: Option<String>,

    /// OCR temperature (0.0–2.0).
    #[arg(long, env = "PDF2TEXT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max OCR output tokens per page.
    #[arg(long, env = "PDF2TEXT_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Concurrent OCR calls per document, before the batch multiplier.
    #[arg(short, long, env = "PDF2TEXT_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Path to a text file containing a custom OCR system prompt.
    #[arg(long, env = "PDF2TEXT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Export embedded images as PNG artifacts.
    #[arg(long, env = "PDF2TEXT_EXTRACT_IMAGES")]
    extract_images: bool,

    /// Longest edge in pixels when rendering pages for OCR.
    #[arg(long, env = "PDF2TEXT_RENDER_PIXELS", default_value_t = 2000)]
    render_pixels: u32,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TEXT_VERBOSE")]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FailureModeArg {
    FailFast,
    PerInstance,
}

impl From<FailureModeArg> for FailureMode {
    fn from(v: FailureModeArg) -> Self {
        match v {
            FailureModeArg::FailFast => FailureMode::FailFast,
            FailureModeArg::PerInstance => FailureMode::PerInstance,
        }
    }
}

fn build_config(cli: Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .host(cli.host)
        .port(cli.port)
        .max_body_bytes(cli.max_body_bytes)
        .languages(cli.langs)
        .start_page(cli.start_page)
        .max_pages(cli.max_pages)
        .batch_multiplier(cli.batch_multiplier)
        .failure_mode(cli.failure_mode.into())
        .ocr_enabled(!cli.no_ocr)
        .ocr_temperature(cli.temperature)
        .ocr_max_tokens(cli.max_tokens)
        .ocr_concurrency(cli.concurrency)
        .extract_images(cli.extract_images)
        .render_pixels(cli.render_pixels);

    if let Some(dir) = cli.temp_dir {
        builder = builder.temp_dir(dir);
    }
    if let Some(path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(provider) = cli.provider {
        builder = builder.ocr_provider(provider);
    }
    if let Some(model) = cli.model {
        builder = builder.ocr_model(model);
    }
    if let Some(path) = cli.system_prompt {
        let prompt = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read system prompt from {}", path.display()))?;
        builder = builder.ocr_system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(cli)?;

    let models = load_all_models(&config.models)
        .await
        .context("Failed to load models")?;

    serve(config, Arc::new(models)).await?;
    Ok(())
}
