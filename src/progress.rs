//! Pipeline stages and the progress-callback trait.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! stage transitions and per-page events as the pipeline runs.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfocr::{ExtractionConfig, ExtractionProgressCallback, PipelineStage};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl ExtractionProgressCallback for StageLogger {
//!     fn on_stage(&self, stage: PipelineStage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(StageLogger))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a single extraction run currently is.
///
/// The pipeline is linear: each successful step moves to the next variant.
/// Any fatal error moves to [`PipelineStage::Failed`], which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Idle,
    FileReceived,
    Rasterized,
    Recognized,
    Aggregated,
    DocumentWritten,
    Delivered,
    Failed,
}

impl PipelineStage {
    /// The stage that follows this one on the happy path.
    ///
    /// `Delivered` and `Failed` are terminal and return `None`.
    pub fn next(self) -> Option<PipelineStage> {
        use PipelineStage::*;
        match self {
            Idle => Some(FileReceived),
            FileReceived => Some(Rasterized),
            Rasterized => Some(Recognized),
            Recognized => Some(Aggregated),
            Aggregated => Some(DocumentWritten),
            DocumentWritten => Some(Delivered),
            Delivered | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::FileReceived => "file received",
            PipelineStage::Rasterized => "rasterized",
            PipelineStage::Recognized => "recognized",
            PipelineStage::Aggregated => "aggregated",
            PipelineStage::DocumentWritten => "document written",
            PipelineStage::Delivered => "delivered",
            PipelineStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Called by the extraction pipeline as it moves through stages and pages.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the page
/// callbacks can fire from several tasks at once. All methods have no-op
/// defaults so callers only override what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called on every stage transition, including `Failed`.
    fn on_stage(&self, stage: PipelineStage) {
        let _ = stage;
    }

    /// Called once before the first page is rendered.
    ///
    /// # Arguments
    /// * `total_pages`: number of pages that will be processed
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is handed to the recognizer.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page is recognised.
    ///
    /// `text_len` is the byte length of the cleaned text.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page fails to render or be recognised.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn happy_path_visits_every_stage_once() {
        let mut stage = PipelineStage::Idle;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![
                PipelineStage::Idle,
                PipelineStage::FileReceived,
                PipelineStage::Rasterized,
                PipelineStage::Recognized,
                PipelineStage::Aggregated,
                PipelineStage::DocumentWritten,
                PipelineStage::Delivered,
            ]
        );
        assert!(PipelineStage::Delivered.is_terminal());
        assert!(PipelineStage::Failed.is_terminal());
        assert!(!PipelineStage::Idle.is_terminal());
    }

    #[test]
    fn stage_display() {
        assert_eq!(PipelineStage::DocumentWritten.to_string(), "document written");
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(PipelineStage::FileReceived);
        cb.on_extraction_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 42);
        cb.on_page_error(2, 5, "some error");
        cb.on_extraction_complete(5, 4);
    }

    struct Recording {
        stages: Mutex<Vec<PipelineStage>>,
        errors: AtomicUsize,
    }

    impl ExtractionProgressCallback for Recording {
        fn on_stage(&self, stage: PipelineStage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn arc_dyn_callback_records_events() {
        let rec = Arc::new(Recording {
            stages: Mutex::new(Vec::new()),
            errors: AtomicUsize::new(0),
        });
        let cb: ProgressCallback = rec.clone();
        cb.on_stage(PipelineStage::FileReceived);
        cb.on_page_error(1, 2, "timeout");
        cb.on_stage(PipelineStage::Failed);

        assert_eq!(
            *rec.stages.lock().unwrap(),
            vec![PipelineStage::FileReceived, PipelineStage::Failed]
        );
        assert_eq!(rec.errors.load(Ordering::SeqCst), 1);
    }
}
