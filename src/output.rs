//! Result types produced by the extraction pipeline.

use crate::config::{DOWNLOAD_FILE_NAME, OUTPUT_MIME_TYPE};
use crate::error::PageError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A PDF received from the outside world, before it touches the disk.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Name the client gave the file (used in errors and logs only).
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// One rasterised page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed page number in the source document.
    pub page_num: usize,
    pub image: DynamicImage,
}

/// Recognised text of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number in the source document.
    pub page_num: usize,

    /// Cleaned recognizer output. Empty when `error` is set.
    pub text: String,

    /// Name of the recognizer that produced the text.
    pub engine: String,

    /// LLM input tokens (vision recognizer only).
    pub input_tokens: usize,

    /// LLM output tokens (vision recognizer only).
    pub output_tokens: usize,

    /// Wall-clock time spent recognising this page.
    pub duration_ms: u64,

    /// Retries needed before the recognizer answered.
    pub retries: u8,

    /// Set when the page failed under [`crate::config::FailurePolicy::SkipPage`].
    pub error: Option<PageError>,
}

impl PageText {
    /// A failed page placeholder keeping its slot in page order.
    pub fn failed(page_num: usize, engine: impl Into<String>, error: PageError) -> Self {
        Self {
            page_num,
            text: String::new(),
            engine: engine.into(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// PDF metadata, read without rendering any page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Selected pages that never produced a result.
    pub skipped_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    /// Time from the first render request to the last recognised page.
    pub recognition_duration_ms: u64,
}

/// Everything produced by [`crate::extract::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// One formatted block per successful page, in page order
    /// (`"Página N:\n<text>\n"`).
    pub texts: Vec<String>,

    /// Every selected page, failed ones included, in page order.
    pub pages: Vec<PageText>,

    pub metadata: DocumentMetadata,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Pages that failed under `SkipPage`.
    pub fn failures(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }

    /// All formatted blocks joined for display.
    pub fn joined_text(&self) -> String {
        self.texts.join("\n")
    }
}

/// An assembled output PDF held in memory.
#[derive(Debug, Clone)]
pub struct WrittenDocument {
    pub bytes: Vec<u8>,
    /// Physical PDF pages, at least one per text entry.
    pub page_count: usize,
}

/// What the delivery layer needs: the text to show and the file to offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub texts: Vec<String>,
    /// Uniquely named file holding the generated PDF.
    pub pdf_path: PathBuf,
    /// Suggested name for the download (`texto_extraido.pdf`).
    pub download_name: String,
    pub mime_type: String,
    pub output_pages: usize,
    pub stats: ExtractionStats,
    pub failures: Vec<PageError>,
}

impl Delivery {
    pub(crate) fn new(output: ExtractionOutput, pdf_path: PathBuf, output_pages: usize) -> Self {
        let failures = output.failures().cloned().collect();
        Self {
            texts: output.texts,
            pdf_path,
            download_name: DOWNLOAD_FILE_NAME.to_string(),
            mime_type: OUTPUT_MIME_TYPE.to_string(),
            output_pages,
            stats: output.stats,
            failures,
        }
    }
}
