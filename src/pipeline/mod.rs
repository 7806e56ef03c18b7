//! Pipeline stages behind [`crate::models::ModelSet`].
//!
//! Each submodule implements exactly one step, so each is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ encode ──▶ ocr ──▶ postprocess
//! (pdfium)    (base64)   (VLM)   (cleanup + join)
//! ```
//!
//! 1. [`extract`]: open the PDF, read the text layer of selected pages,
//!    render blank pages, export embedded images; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 2. [`encode`]: PNG-encode and base64-wrap images
//! 3. [`ocr`]: one vision-model call per blank page; the only stage with
//!    network I/O
//! 4. [`postprocess`]: deterministic text cleanup and page joining

pub mod encode;
pub mod extract;
pub mod ocr;
pub mod postprocess;
