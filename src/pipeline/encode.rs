//! Image encoding: `DynamicImage` → base64 PNG.
//!
//! Two consumers share the same encoding: the OCR stage wraps it in an
//! `ImageData` attachment for the vision model, and image extraction stores it
//! as an [`ImageArtifact`]. PNG keeps rendered text crisp; JPEG artefacts on
//! glyph edges measurably hurt OCR.

use crate::output::ImageArtifact;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

const PNG_MIME: &str = "image/png";

fn png_base64(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(STANDARD.encode(&buf))
}

/// Encode a rendered page as a vision-model attachment.
///
/// `detail: "high"` lets GPT-4-class models tile the full image; at the
/// default detail level small print is downsampled away.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let b64 = png_base64(img)?;
    debug!("Encoded page image → {} bytes base64", b64.len());
    Ok(ImageData::new(b64, PNG_MIME).with_detail("high"))
}

/// Encode an embedded image found on `page` (1-indexed).
pub fn encode_artifact(img: &DynamicImage, page: usize) -> Result<ImageArtifact, image::ImageError> {
    Ok(ImageArtifact {
        page,
        mime_type: PNG_MIME.to_string(),
        width: img.width(),
        height: img.height(),
        data: png_base64(img)?,
    })
}
