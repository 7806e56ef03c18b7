//! # edgequake-pdf2text
//!
//! Batch PDF-to-text conversion as an HTTP service.
//!
//! A client posts one or more base64-encoded PDFs to `/predict`; each one is
//! written to a transient file, converted, and removed again, and the texts
//! come back in request order.
//!
//! ## Request Flow
//!
//! ```text
//! POST /predict
//!  │
//!  ├─ 1. Batch    resolve per-instance options, decode base64
//!  ├─ 2. Store    write bytes to a uniquely named transient file
//!  ├─ 3. Convert  ConversionEngine::convert(path, options)
//!  │              └─ ModelSet: pdfium text layer, vision-LLM OCR for blank pages
//!  ├─ 4. Release  delete the transient file (always)
//!  └─ 5. Respond  {"predictions": [{"text": ...}, ...]}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2text::{load_all_models, serve, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().port(8000).max_pages(20).build()?;
//!     let models = load_all_models(&config.models).await?;
//!     serve(config, Arc::new(models)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2text-server` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod transient;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{BatchHandler, Instance, PredictRequest, PredictResponse};
pub use config::{
    ConversionOptions, FailureMode, ModelConfig, OcrSettings, OptionOverrides, ServiceConfig,
    ServiceConfigBuilder,
};
pub use convert::{convert_bytes, convert_file};
pub use engine::ConversionEngine;
pub use error::{EngineError, Pdf2TextError};
pub use models::{load_all_models, ModelSet};
pub use output::{ConversionResult, ImageArtifact, Prediction, RawConversion};
pub use server::{router, serve, AppState};
pub use transient::{TransientFile, TransientStore};
