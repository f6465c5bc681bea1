//! End-to-end integration tests for edgequake-pdfocr.
//!
//! Input PDFs are generated on the fly with the crate's own writer, so no
//! fixtures are needed. Rendering needs a pdfium library and the OCR tests
//! need the `tesseract` binary; both are gated behind `E2E_ENABLED` so they
//! do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_tesseract_hello_world -- --nocapture

use async_trait::async_trait;
use edgequake_pdfocr::{
    extract_stream_from_upload, extract_upload, inspect, process_upload, rasterize,
    write_document, DocumentLayout, ExtractError, ExtractionConfig, ExtractionProgressCallback,
    FailurePolicy, NoopProgressCallback, PageImage, PageRecognizer, PageSelection,
    PipelineStage, ProgressCallback, RecognizeError, Recognition, RecognizerKind,
    UploadedDocument,
};
use futures::StreamExt;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_logging();
    }};
    (tesseract) => {{
        e2e_skip_unless_ready!();
        if std::process::Command::new("tesseract")
            .arg("--version")
            .output()
            .is_err()
        {
            println!("SKIP — tesseract binary not found on PATH");
            return;
        }
    }};
}

/// Honour RUST_LOG in e2e runs.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A PDF with one page per entry, built by the crate's own writer.
fn make_pdf(pages: &[&str]) -> UploadedDocument {
    let texts: Vec<String> = pages.iter().map(|s| s.to_string()).collect();
    let doc = write_document(&texts, &DocumentLayout::default()).expect("writer");
    UploadedDocument::new("generated.pdf", doc.bytes)
}

/// Write `upload` to a scratch dir for the path-based APIs.
fn save_pdf(upload: &UploadedDocument, dir: &Path) -> std::path::PathBuf {
    let path = dir.join(&upload.file_name);
    std::fs::write(&path, &upload.bytes).unwrap();
    path
}

fn page_text(path: &Path, page: u32) -> String {
    lopdf::Document::load(path)
        .expect("output PDF must parse")
        .extract_text(&[page])
        .expect("page text")
}

fn count_pdf_pages(path: &Path) -> usize {
    lopdf::Document::load(path)
        .expect("output PDF must parse")
        .get_pages()
        .len()
}

/// Reports the rendered bitmap size instead of reading it.
struct SizeRecognizer;

#[async_trait]
impl PageRecognizer for SizeRecognizer {
    fn name(&self) -> &str {
        "size"
    }

    async fn recognize(&self, page: &PageImage) -> Result<Recognition, RecognizeError> {
        Ok(Recognition::text(format!(
            "{}x{}",
            page.image.width(),
            page.image.height()
        )))
    }
}

fn size_config() -> ExtractionConfig {
    ExtractionConfig::builder()
        .recognizer(Arc::new(SizeRecognizer))
        .build()
        .unwrap()
}

#[derive(Default)]
struct StageRecorder {
    stages: Mutex<Vec<PipelineStage>>,
}

impl ExtractionProgressCallback for StageRecorder {
    fn on_stage(&self, stage: PipelineStage) {
        self.stages.lock().unwrap().push(stage);
    }
}

// ── Tests that need no native libraries ─────────────────────────────────────

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<ExtractionConfig>();
}

#[test]
fn test_page_selection_out_of_range_is_empty() {
    assert!(PageSelection::Single(9).to_indices(3).is_empty());
    assert!(PageSelection::Range(5, 8).to_indices(3).is_empty());
}

#[test]
fn test_generated_pdf_has_one_page_per_entry() {
    let upload = make_pdf(&["uno", "dos", "tres"]);
    let doc = lopdf::Document::load_mem(&upload.bytes).expect("parse");
    assert_eq!(doc.get_pages().len(), 3);
}

#[tokio::test]
async fn test_missing_tesseract_binary_is_fatal() {
    let config = ExtractionConfig::builder()
        .engine(RecognizerKind::Tesseract)
        .tesseract(edgequake_pdfocr::TesseractOptions {
            binary: "/nonexistent/bin/tesseract".into(),
            language: None,
        })
        .build()
        .unwrap();
    let upload = UploadedDocument::new("scan.pdf", b"%PDF-1.4\n".to_vec());
    let err = extract_upload(&upload, &config).await.unwrap_err();
    assert!(
        matches!(err, ExtractError::RecognizerUnavailable { .. }),
        "got {err:?}"
    );
}

// ── Rendering (pdfium) ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_generated_pdf() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let path = save_pdf(&make_pdf(&["a", "b"]), dir.path());

    let meta = inspect(path.to_string_lossy(), None).await.expect("inspect");
    assert_eq!(meta.page_count, 2);
}

#[tokio::test]
async fn test_rasterize_is_deterministic() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let path = save_pdf(&make_pdf(&["a", "b", "c"]), dir.path());
    let config = ExtractionConfig::default();

    let first = rasterize(&path, &config).await.expect("first run");
    let second = rasterize(&path, &config).await.expect("second run");

    let shape = |pages: &[PageImage]| -> Vec<(usize, u32, u32)> {
        pages
            .iter()
            .map(|p| (p.page_num, p.image.width(), p.image.height()))
            .collect()
    };
    assert_eq!(first.len(), 3);
    assert_eq!(
        first.iter().map(|p| p.page_num).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(shape(&first), shape(&second));
}

#[tokio::test]
async fn test_rasterize_honours_page_selection() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let path = save_pdf(&make_pdf(&["a", "b", "c", "d"]), dir.path());
    let config = ExtractionConfig::builder()
        .pages(PageSelection::Set(vec![4, 2]))
        .build()
        .unwrap();

    let pages = rasterize(&path, &config).await.expect("rasterize");
    assert_eq!(
        pages.iter().map(|p| p.page_num).collect::<Vec<_>>(),
        vec![2, 4]
    );
}

#[tokio::test]
async fn test_rasterize_corrupt_pdf_is_an_error() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let upload = UploadedDocument::new("broken.pdf", b"%PDF-1.7\nnot a pdf body".to_vec());
    let path = save_pdf(&upload, dir.path());

    assert!(rasterize(&path, &ExtractionConfig::default()).await.is_err());
}

#[tokio::test]
async fn test_pages_render_at_300_dpi() {
    e2e_skip_unless_ready!();
    let output = extract_upload(&make_pdf(&["x"]), &size_config())
        .await
        .expect("extract");

    // A4 at 300 DPI is 2480 x 3508 pixels, give or take rounding.
    let (w, h) = output.pages[0]
        .text
        .split_once('x')
        .map(|(w, h)| (w.parse::<u32>().unwrap(), h.parse::<u32>().unwrap()))
        .unwrap();
    assert!((2470..=2490).contains(&w), "width {w}");
    assert!((3498..=3518).contains(&h), "height {h}");
}

#[tokio::test]
async fn test_one_entry_per_page_in_order() {
    e2e_skip_unless_ready!();
    let upload = make_pdf(&["1", "2", "3", "4", "5"]);
    let config = ExtractionConfig {
        concurrency: 3,
        ..size_config()
    };

    let output = extract_upload(&upload, &config).await.expect("extract");
    assert_eq!(output.texts.len(), 5);
    for (i, block) in output.texts.iter().enumerate() {
        assert!(
            block.starts_with(&format!("Página {}:\n", i + 1)),
            "block {i}: {block:?}"
        );
        assert!(block.ends_with('\n'));
    }
}

#[tokio::test]
async fn test_process_upload_delivers_matching_pdf() {
    e2e_skip_unless_ready!();
    let out = tempfile::tempdir().unwrap();
    let recorder = Arc::new(StageRecorder::default());
    let config = ExtractionConfig {
        progress_callback: Some(recorder.clone() as ProgressCallback),
        ..size_config()
    };

    let delivery = process_upload(&make_pdf(&["a", "b", "c"]), &config, Some(out.path()))
        .await
        .expect("process");

    assert_eq!(delivery.download_name, "texto_extraido.pdf");
    assert_eq!(delivery.mime_type, "application/pdf");
    assert!(delivery.pdf_path.starts_with(out.path()));
    assert_eq!(count_pdf_pages(&delivery.pdf_path), 3);
    assert_eq!(delivery.output_pages, 3);
    for page in 1..=3u32 {
        let text = page_text(&delivery.pdf_path, page);
        assert!(text.contains(&format!("Página {page}:")), "page {page}: {text:?}");
    }

    let stages = recorder.stages.lock().unwrap().clone();
    assert_eq!(stages.first(), Some(&PipelineStage::FileReceived));
    assert_eq!(stages.last(), Some(&PipelineStage::Delivered));
    assert!(!stages.contains(&PipelineStage::Failed));
}

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_files() {
    e2e_skip_unless_ready!();
    let out = tempfile::tempdir().unwrap();
    let config = size_config();
    let a = make_pdf(&["a"]);
    let b = make_pdf(&["b", "c"]);

    let (da, db) = tokio::join!(
        process_upload(&a, &config, Some(out.path())),
        process_upload(&b, &config, Some(out.path())),
    );
    let (da, db) = (da.expect("a"), db.expect("b"));
    assert_ne!(da.pdf_path, db.pdf_path);
    assert_eq!(count_pdf_pages(&da.pdf_path), 1);
    assert_eq!(count_pdf_pages(&db.pdf_path), 2);
}

#[tokio::test]
async fn test_corrupt_pdf_fails_without_output() {
    e2e_skip_unless_ready!();
    let out = tempfile::tempdir().unwrap();
    let recorder = Arc::new(StageRecorder::default());
    let config = ExtractionConfig {
        progress_callback: Some(recorder.clone() as ProgressCallback),
        ..size_config()
    };
    let upload = UploadedDocument::new("broken.pdf", b"%PDF-1.7\nthis is not a pdf body".to_vec());

    let r = process_upload(&upload, &config, Some(out.path())).await;
    assert!(r.is_err(), "corrupt PDF must fail");
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    assert_eq!(
        recorder.stages.lock().unwrap().last(),
        Some(&PipelineStage::Failed)
    );
}

#[tokio::test]
async fn test_stream_yields_pages_in_order() {
    e2e_skip_unless_ready!();
    let config = ExtractionConfig {
        concurrency: 2,
        failure_policy: FailurePolicy::FailFast,
        ..size_config()
    };
    let mut stream = extract_stream_from_upload(&make_pdf(&["a", "b", "c"]), &config)
        .await
        .expect("stream");

    let mut seen = Vec::new();
    while let Some(page) = stream.next().await {
        seen.push(page.expect("page").page_num);
    }
    assert_eq!(seen, vec![1, 2, 3]);
}

// ── OCR (pdfium + tesseract) ────────────────────────────────────────────────

#[tokio::test]
async fn test_tesseract_hello_world() {
    e2e_skip_unless_ready!(tesseract);
    let config = ExtractionConfig::builder()
        .engine(RecognizerKind::Tesseract)
        .build()
        .unwrap();

    let output = extract_upload(&make_pdf(&["HELLO WORLD"]), &config)
        .await
        .expect("extract");

    assert_eq!(output.texts.len(), 1);
    let block = &output.texts[0];
    println!("{block}");
    assert!(block.starts_with("Página 1:\n"));
    assert!(block.to_uppercase().contains("HELLO"), "got {block:?}");
}

#[tokio::test]
async fn test_tesseract_blank_page_keeps_its_block() {
    e2e_skip_unless_ready!(tesseract);
    let config = ExtractionConfig::builder()
        .engine(RecognizerKind::Tesseract)
        .build()
        .unwrap();

    let output = extract_upload(&make_pdf(&["SCANNED TEXT", ""]), &config)
        .await
        .expect("extract");

    assert_eq!(output.texts.len(), 2);
    assert_eq!(output.texts[1], "Página 2:\n\n");
}
