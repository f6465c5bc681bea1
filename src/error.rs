//! Error types for the edgequake-pdfocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`]: **Fatal**: the extraction cannot proceed or was
//!   aborted (bad upload, corrupt PDF, recognizer not available, output
//!   PDF could not be written). Returned as `Err(ExtractError)` from the
//!   top-level `extract*` functions.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed to render or to be
//!   recognised. Stored inside [`crate::output::PageText`] when the
//!   [`crate::config::FailurePolicy`] is `SkipPage`; promoted to
//!   [`ExtractError::PageFailed`] when it is `FailFast`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfocr library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The upload contained no bytes at all.
    #[error("Uploaded file '{name}' is empty")]
    EmptyInput { name: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The PDF opened fine but has no pages, or there is no text to write.
    #[error("Document has no pages to process")]
    EmptyDocument,

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error outside of a single page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Recognition errors ────────────────────────────────────────────────
    /// The configured recognizer cannot run (missing models, missing
    /// `tesseract` binary, LLM provider not configured).
    #[error("Recognizer '{engine}' is not available.\n{hint}")]
    RecognizerUnavailable { engine: String, hint: String },

    /// A page failed and the failure policy is `FailFast`.
    #[error("Aborted on page {page}: {source}")]
    PageFailed {
        page: usize,
        #[source]
        source: PageError,
    },

    /// Every selected page failed; there is nothing to deliver.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// printpdf could not lay out or serialise the output document.
    #[error("Failed to assemble output PDF: {0}")]
    DocumentAssemblyFailed(String),

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or set PDFIUM_LIB_PATH to the\n\
directory (or file) holding it. Pre-built binaries are available from\n\
https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The recognizer returned an error (after retries, where it retries).
    #[error("Page {page}: {engine} recognition failed after {retries} retries: {detail}")]
    RecognitionFailed {
        page: usize,
        engine: String,
        retries: u8,
        detail: String,
    },

    /// Recognition did not finish within `page_timeout_secs`.
    #[error("Page {page}: recognition timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// The 1-indexed page number this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::RecognitionFailed { page, .. }
            | PageError::Timeout { page, .. } => *page,
        }
    }
}
