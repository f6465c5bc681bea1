//! # edgequake-pdfocr
//!
//! Extract the text of scanned PDFs page by page and re-assemble it into a
//! new, text-only PDF.
//!
//! Scanned documents carry no text layer, so every page is rasterised and
//! read by a recognizer: classical OCR (`tesseract`), the pure-Rust `ocrs`
//! engine, or a vision LLM. The result is one `Página N:` block per page
//! and a PDF with one page per block.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      persist the upload / resolve path or URL, check %PDF
//!  ├─ 2. Render     rasterise pages at 300 DPI via pdfium (spawn_blocking)
//!  ├─ 3. Recognize  tesseract | ocrs | vision LLM, one call per page
//!  ├─ 4. Clean      normalise recognizer output
//!  ├─ 5. Aggregate  "Página N:\n<text>\n" per page, in page order
//!  └─ 6. Write      printpdf, one page per block → texto_extraido.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfocr::{process_upload, ExtractionConfig, UploadedDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let upload = UploadedDocument::new("scan.pdf", std::fs::read("scan.pdf")?);
//!     let config = ExtractionConfig::builder().language("spa").build()?;
//!     let delivery = process_upload(&upload, &config, None).await?;
//!     for block in &delivery.texts {
//!         println!("{block}");
//!     }
//!     eprintln!("PDF: {} ({})", delivery.pdf_path.display(), delivery.download_name);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `ocr`   | on      | Enables the pure-Rust `ocrs` recognizer (ocrs + rten) |
//!
//! Disable both when using only the library with tesseract or a vision model:
//! ```toml
//! edgequake-pdfocr = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing an Engine
//!
//! | Engine | Needs | Notes |
//! |--------|-------|-------|
//! | `tesseract` | `tesseract` binary + language packs | Default; use `--lang spa` for Spanish |
//! | `ocrs` | `.rten` models in `~/.cache/ocrs` | No system deps; build with `--release` |
//! | `vision` | an LLM API key | Best on poor scans and handwriting; costs tokens |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DocumentLayout, ExtractionConfig, ExtractionConfigBuilder, FailurePolicy, OcrModelPaths,
    PageSelection, RecognizerKind, TesseractOptions, VisionOptions, DEFAULT_PAGE_LABEL,
    DOWNLOAD_FILE_NAME, MAX_VISION_RETRIES, OUTPUT_MIME_TYPE,
};
pub use error::{ExtractError, PageError};
pub use extract::{
    extract, extract_sync, extract_to_dir, extract_to_pdf, extract_upload, inspect,
    process_upload,
};
pub use output::{
    Delivery, DocumentMetadata, ExtractionOutput, ExtractionStats, PageImage, PageText,
    UploadedDocument, WrittenDocument,
};
pub use pipeline::aggregate::{aggregate, format_page};
pub use pipeline::recognize::{PageRecognizer, RecognizeError, Recognition};
pub use pipeline::render::rasterize;
pub use pipeline::writer::{persist_document, write_document};
pub use progress::{
    ExtractionProgressCallback, NoopProgressCallback, PipelineStage, ProgressCallback,
};
pub use stream::{extract_stream, extract_stream_from_upload, PageStream};
