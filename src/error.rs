//! Error types for the edgequake-pdf2text service.
//!
//! Two error types mirror the two layers a request passes through:
//!
//! * [`EngineError`]: raised by a [`crate::engine::ConversionEngine`] while
//!   converting one file. The invoker never retries or rewrites it; it is
//!   wrapped into [`Pdf2TextError::ConversionFailed`] with the index of the
//!   instance that produced it.
//!
//! * [`Pdf2TextError`]: everything that can fail a request or the process:
//!   model loading at startup, base64 decoding, transient-file I/O, and
//!   engine failures. In the HTTP layer it becomes a `500` response with no
//!   predictions.
//!
//! Cleanup failures have no variant at all: releasing a transient file never
//! produces an error value, it only logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Request-level and startup errors.
#[derive(Debug, Error)]
pub enum Pdf2TextError {
    // ── Startup errors ────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDF2TEXT_PDFIUM_LIB (or PDFIUM_LIB_PATH) to the path of libpdfium, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    /// An explicitly requested OCR provider could not be created.
    #[error("OCR provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP listener could not be bound or the server stopped abnormally.
    #[error("Server error on {addr}: {source}")]
    Server {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    // ── Request errors ────────────────────────────────────────────────────
    /// An instance's `content` is not valid base64.
    #[error("Instance {index}: content is not valid base64: {source}")]
    InvalidContent {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },

    /// An instance resolved to options the engine cannot honour.
    #[error("Instance {index}: invalid options: {reason}")]
    InvalidOptions { index: usize, reason: String },

    /// Could not create the transient directory or write the transient file.
    #[error("Failed to write transient file in '{dir}': {source}")]
    TransientWriteFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The conversion engine failed on one instance.
    #[error("Instance {index}: {source}")]
    ConversionFailed {
        index: usize,
        #[source]
        source: EngineError,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2TextError {
    /// Short machine-readable kind used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Pdf2TextError::PdfiumBindingFailed(_) => "pdfium_binding_failed",
            Pdf2TextError::ProviderNotConfigured { .. } => "provider_not_configured",
            Pdf2TextError::InvalidConfig(_) => "invalid_config",
            Pdf2TextError::Server { .. } => "server",
            Pdf2TextError::InvalidContent { .. } => "invalid_content",
            Pdf2TextError::InvalidOptions { .. } => "invalid_options",
            Pdf2TextError::TransientWriteFailed { .. } => "transient_write_failed",
            Pdf2TextError::ConversionFailed { .. } => "conversion_failed",
            Pdf2TextError::Internal(_) => "internal",
        }
    }
}

/// Errors raised by a conversion engine for a single file.
#[derive(Debug, Error)]
pub enum EngineError {
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password; the service never supplies one.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// pdfium failed to load or read a page.
    #[error("Failed to read page {page}: {detail}")]
    PageFailed { page: usize, detail: String },

    /// pdfium failed to rasterise a page for OCR.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The vision model call for a page failed.
    #[error("OCR failed for page {page}: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// Unexpected engine-internal error.
    #[error("Engine error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for Pdf2TextError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);
        let body = ErrorResponse {
            error: self.kind(),
            message: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
