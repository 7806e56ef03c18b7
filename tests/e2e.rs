//! End-to-end tests against a real pdfium library.
//!
//! Gated behind the `E2E_ENABLED` environment variable because they need
//! libpdfium on the loader path (or `PDFIUM_LIB_PATH`). OCR is disabled so no
//! API key is required.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/lib cargo test --test e2e -- --nocapture

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_pdf2text::{
    load_all_models, router, server::build_handler, AppState, ConversionEngine,
    ConversionOptions, EngineError, ServiceConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    };
}

/// Build a minimal PDF with one Helvetica text line per page.
fn text_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    // Objects: 1 catalog, 2 pages, 3 font, then (page, content) pairs.
    let mut objects: Vec<String> = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".into());
    let kids = (0..n)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push(format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, n));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".into());
    for (i, text) in pages.iter().enumerate() {
        let content_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            content_id
        ));
        let stream = format!("BT /F1 24 Tf 72 700 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}

fn text_only_config(tmp: &tempfile::TempDir) -> ServiceConfig {
    ServiceConfig::builder()
        .temp_dir(tmp.path())
        .ocr_enabled(false)
        .build()
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_text_layer_pages_in_range() {
    e2e_skip_unless_enabled!();
    let tmp = tempfile::TempDir::new().unwrap();
    let config = text_only_config(&tmp);
    let models = load_all_models(&config.models).await.expect("pdfium must bind");

    let pdf_path = tmp.path().join("three.pdf");
    std::fs::write(&pdf_path, text_pdf(&["First page", "Second page", "Third page"])).unwrap();

    let options = ConversionOptions {
        start_page: 1,
        max_pages: 1,
        languages: vec!["en".into()],
        ..Default::default()
    };
    let raw = models.convert(&pdf_path, &options).await.unwrap();
    let text = raw.text.unwrap();

    assert!(text.contains("Second page"), "got: {text:?}");
    assert!(!text.contains("First page"));
    assert!(!text.contains("Third page"));
    assert!(text.ends_with('\n'));
    assert_eq!(raw.metadata["total_pages"], 3);
    assert_eq!(raw.metadata["pages"], 1);
    assert_eq!(raw.metadata["ocr_stats"]["ocr_pages"], 0);
}

#[tokio::test]
async fn test_start_page_past_end_is_empty() {
    e2e_skip_unless_enabled!();
    let tmp = tempfile::TempDir::new().unwrap();
    let models = load_all_models(&text_only_config(&tmp).models).await.unwrap();

    let pdf_path = tmp.path().join("one.pdf");
    std::fs::write(&pdf_path, text_pdf(&["Only page"])).unwrap();

    let options = ConversionOptions {
        start_page: 5,
        ..Default::default()
    };
    let raw = models.convert(&pdf_path, &options).await.unwrap();
    assert_eq!(raw.text.as_deref(), Some(""));
    assert_eq!(raw.metadata["pages"], 0);
}

#[tokio::test]
async fn test_garbage_bytes_are_corrupt() {
    e2e_skip_unless_enabled!();
    let tmp = tempfile::TempDir::new().unwrap();
    let models = load_all_models(&text_only_config(&tmp).models).await.unwrap();

    let path = tmp.path().join("junk.pdf");
    std::fs::write(&path, b"definitely not a pdf").unwrap();
    let err = models
        .convert(&path, &ConversionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CorruptPdf { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_predict_over_http() {
    e2e_skip_unless_enabled!();
    let tmp = tempfile::TempDir::new().unwrap();
    let config = text_only_config(&tmp);
    let models = load_all_models(&config.models).await.unwrap();
    let state = AppState {
        handler: Arc::new(build_handler(&config, Arc::new(models))),
    };
    let app = router(state, config.max_body_bytes);

    let body = json!({
        "instances": [
            {"content": STANDARD.encode(text_pdf(&["Hello pdf2text"]))},
            {"content": STANDARD.encode(text_pdf(&["Goodbye"]))}
        ]
    });
    let req = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    let preds = value["predictions"].as_array().unwrap();
    assert_eq!(preds.len(), 2);
    assert!(preds[0]["text"].as_str().unwrap().contains("Hello pdf2text"));
    assert!(preds[1]["text"].as_str().unwrap().contains("Goodbye"));

    let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("pdf2text-"))
        .collect();
    assert!(leftovers.is_empty());
}
