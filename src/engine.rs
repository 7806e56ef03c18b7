//! The conversion-engine seam.
//!
//! Everything that actually reads a PDF sits behind [`ConversionEngine`]. The
//! service holds exactly one engine for the whole process, as an
//! `Arc<dyn ConversionEngine>`, and calls it concurrently from every
//! in-flight request. Implementations must therefore be safe for concurrent
//! shared use without the caller taking any lock.
//!
//! The production implementation is [`crate::models::ModelSet`]; tests plug in
//! small fakes.

use crate::config::ConversionOptions;
use crate::error::EngineError;
use crate::output::RawConversion;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Convert the document at `path`.
    ///
    /// `options` arrive exactly as resolved by the caller. The file exists for
    /// the whole duration of the call and is deleted by the caller afterwards.
    async fn convert(
        &self,
        path: &Path,
        options: &ConversionOptions,
    ) -> Result<RawConversion, EngineError>;
}
