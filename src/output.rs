//! Result types produced by the engine, the invoker, and the batch handler.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An image exported from a document, PNG-encoded and base64-wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    /// 1-indexed page the image was found on.
    pub page: usize,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Base64 (standard alphabet) of the encoded image bytes.
    pub data: String,
}

/// The engine's raw `(text, images, metadata)` output for one file.
///
/// `text` is optional because an engine may legitimately produce none; the
/// invoker turns that into an empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConversion {
    pub text: Option<String>,
    pub images: BTreeMap<String, ImageArtifact>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Normalised conversion output for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub full_text: String,
    pub images: BTreeMap<String, ImageArtifact>,
    pub out_meta: serde_json::Map<String, serde_json::Value>,
}

impl From<RawConversion> for ConversionResult {
    fn from(raw: RawConversion) -> Self {
        Self {
            full_text: raw.text.unwrap_or_default(),
            images: raw.images,
            out_meta: raw.metadata,
        }
    }
}

/// One entry of the `/predict` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub text: String,
    /// Set only in per-instance failure mode, for an instance that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Prediction {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            error: Some(error.into()),
        }
    }
}
