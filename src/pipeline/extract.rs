//! Page extraction: text layer, OCR renders, embedded images, document info.
//!
//! All pdfium calls happen inside `tokio::task::spawn_blocking`; only owned
//! data (strings, `DynamicImage`s) crosses back to the async side.
//!
//! Only pages whose text layer is blank (scans, image-only pages) are
//! rasterised, and only when the caller will OCR them.

use crate::config::ConversionOptions;
use crate::error::EngineError;
use crate::output::ImageArtifact;
use crate::pipeline::encode;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the blocking pass should produce besides the text layer.
#[derive(Debug, Clone, Copy)]
pub struct ExtractSettings {
    /// Rasterise blank pages so they can be OCR'd.
    pub render_blank_pages: bool,
    /// Export embedded raster images.
    pub extract_images: bool,
    /// Longest rendered edge in pixels.
    pub render_pixels: u32,
}

/// One selected page.
pub struct ExtractedPage {
    /// 0-indexed page number.
    pub index: usize,
    /// Text layer content; empty for image-only pages.
    pub text: String,
    /// Rendered page, present only for blank pages when rendering was requested.
    pub render: Option<DynamicImage>,
}

/// Document-level information fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

/// Everything pulled out of one PDF in a single blocking pass.
pub struct ExtractedDocument {
    pub total_pages: usize,
    pub pages: Vec<ExtractedPage>,
    pub images: BTreeMap<String, ImageArtifact>,
    pub info: DocumentInfo,
}

/// Open `pdf_path` and extract the pages selected by `options`.
pub async fn extract_document(
    pdfium: Arc<Pdfium>,
    pdf_path: &Path,
    options: &ConversionOptions,
    settings: ExtractSettings,
) -> Result<ExtractedDocument, EngineError> {
    let path = pdf_path.to_path_buf();
    let options = options.clone();

    tokio::task::spawn_blocking(move || extract_blocking(&pdfium, &path, &options, settings))
        .await
        .map_err(|e| EngineError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of page extraction.
fn extract_blocking(
    pdfium: &Pdfium,
    pdf_path: &Path,
    options: &ConversionOptions,
    settings: ExtractSettings,
) -> Result<ExtractedDocument, EngineError> {
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| load_error(pdf_path, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let range = options.page_range(total_pages);
    info!(
        "PDF loaded: {} pages, converting {}..{}",
        total_pages, range.start, range.end
    );

    let px = i32::try_from(settings.render_pixels).unwrap_or(i32::MAX);
    let render_config = PdfRenderConfig::new()
        .set_target_width(px)
        .set_maximum_height(px);

    let mut extracted = Vec::with_capacity(range.len());
    let mut images = BTreeMap::new();

    for idx in range {
        let page_num = idx + 1;
        let page = pages
            .get(idx as u16)
            .map_err(|e| EngineError::PageFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let text = page
            .text()
            .map_err(|e| EngineError::PageFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?
            .all();

        let render = if settings.render_blank_pages && text.trim().is_empty() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                EngineError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;
            let image = bitmap.as_image();
            debug!(
                "Page {} has no text layer, rendered {}x{} px for OCR",
                page_num,
                image.width(),
                image.height()
            );
            Some(image)
        } else {
            None
        };

        if settings.extract_images {
            collect_images(&page, page_num, &mut images);
        }

        extracted.push(ExtractedPage {
            index: idx,
            text,
            render,
        });
    }

    Ok(ExtractedDocument {
        total_pages,
        pages: extracted,
        images,
        info: document_info(&document),
    })
}

/// Export every embedded raster image on `page` as a PNG artifact.
///
/// An image that cannot be decoded is skipped; it never fails the page.
fn collect_images(page: &PdfPage, page_num: usize, out: &mut BTreeMap<String, ImageArtifact>) {
    let mut k = 0usize;
    for object in page.objects().iter() {
        let Some(image_object) = object.as_image_object() else {
            continue;
        };
        k += 1;
        let name = image_name(page_num, k);
        match image_object.get_raw_image() {
            Ok(img) => match encode::encode_artifact(&img, page_num) {
                Ok(artifact) => {
                    out.insert(name, artifact);
                }
                Err(e) => warn!("Skipping {}: PNG encoding failed: {}", name, e),
            },
            Err(e) => warn!("Skipping {}: {:?}", name, e),
        }
    }
}

/// Artifact key for the `k`-th image (1-indexed) on page `page_num` (1-indexed).
pub fn image_name(page_num: usize, k: usize) -> String {
    format!("page_{}_image_{}.png", page_num, k)
}

fn document_info(document: &PdfDocument) -> DocumentInfo {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentInfo {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
    }
}

fn load_error(pdf_path: &Path, e: PdfiumError) -> EngineError {
    let path: PathBuf = pdf_path.to_path_buf();
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        EngineError::PasswordRequired { path }
    } else {
        EngineError::CorruptPdf {
            path,
            detail: err_str,
        }
    }
}
