//! Pipeline stages for PDF text extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ recognize ──▶ postprocess ──▶ aggregate ──▶ writer
//! (upload)  (pdfium)   (OCR / VLM)   (cleanup)       ("Página N:")  (printpdf)
//! ```
//!
//! 1. [`input`] : persist an upload, or resolve a path or URL, to a local
//!    file and check it is a PDF
//! 2. [`render`]: rasterise selected pages on the blocking pool and stream
//!    them through a bounded channel
//! 3. [`encode`]: PNG / base64 encoding for recognizers that need files
//!    or API payloads
//! 4. [`recognize`]: the [`recognize::PageRecognizer`] trait and its
//!    tesseract, ocrs and vision implementations
//! 5. [`postprocess`]: deterministic clean-up of recognizer output
//! 6. [`aggregate`]: one labelled block per page, in page order
//! 7. [`writer`]: lay the blocks out in a new PDF and store it

pub mod aggregate;
pub mod encode;
pub mod input;
pub mod postprocess;
pub mod recognize;
pub mod render;
pub mod writer;
