//! Page recognition: turn one rasterised page into text.
//!
//! Every engine implements [`PageRecognizer`]. The extraction pipeline only
//! ever talks to the trait, so classical OCR, the pure-Rust `ocrs` engine
//! and vision LLMs are interchangeable, and tests can plug in a fake.
//!
//! ```text
//! PageImage ──▶ PageRecognizer::recognize ──▶ Recognition { text, tokens, retries }
//!                 ├─ tesseract (CLI, temp PNG)
//!                 ├─ ocrs      (rten models, blocking pool)
//!                 └─ vision    (edgequake-llm, retry/backoff)
//! ```
//!
//! [`resolve_recognizer`] picks the engine for a config and checks that it
//! can run before any page is rendered.

pub mod tesseract;
pub mod vision;

#[cfg(feature = "ocr")]
pub mod ocrs_engine;

use crate::config::{ExtractionConfig, RecognizerKind};
use crate::error::ExtractError;
use crate::output::PageImage;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Raw recognizer output for one page, before clean-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recognition {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Retries spent before this answer arrived.
    pub retries: u8,
}

impl Recognition {
    /// Plain text with no token accounting.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A recognizer failed on one page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{detail}")]
pub struct RecognizeError {
    pub detail: String,
    /// Retries spent before giving up.
    pub retries: u8,
}

impl RecognizeError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            retries: 0,
        }
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }
}

/// Page-to-text capability.
///
/// Implementations must be cheap to share: one instance serves every page
/// of a run, possibly several pages at once.
#[async_trait]
pub trait PageRecognizer: Send + Sync {
    /// Short engine name used in logs, errors and [`crate::PageText::engine`].
    fn name(&self) -> &str;

    /// Recognise the text on one page image.
    async fn recognize(&self, page: &PageImage) -> Result<Recognition, RecognizeError>;

    /// Non-fatal environment warnings to show before a run.
    fn preflight(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Build the recognizer for `config`.
///
/// A recognizer set on the config wins; otherwise `config.engine` selects a
/// built-in one. Fails with [`ExtractError::RecognizerUnavailable`] when the
/// engine cannot run on this machine.
pub async fn resolve_recognizer(
    config: &ExtractionConfig,
) -> Result<Arc<dyn PageRecognizer>, ExtractError> {
    if let Some(ref recognizer) = config.recognizer {
        debug!("Using caller-supplied recognizer '{}'", recognizer.name());
        return Ok(Arc::clone(recognizer));
    }

    let recognizer: Arc<dyn PageRecognizer> = match config.engine {
        RecognizerKind::Tesseract => Arc::new(
            tesseract::TesseractRecognizer::probe(config.tesseract.clone(), config.dpi).await?,
        ),
        RecognizerKind::Ocrs => resolve_ocrs(config).await?,
        RecognizerKind::Vision => Arc::new(vision::VisionRecognizer::from_config(config)?),
    };

    info!("Recognizer: {}", recognizer.name());
    Ok(recognizer)
}

/// Report a recognizer's preflight warnings once.
///
/// Warnings of a recognizer built here are logged at WARN. A caller that
/// supplied its own recognizer has already seen them, so they only go to
/// DEBUG.
pub(crate) fn report_preflight(config: &ExtractionConfig, recognizer: &dyn PageRecognizer) {
    let warnings = recognizer.preflight();
    if preflight_reported_by_caller(config) {
        for warning in warnings {
            debug!("{}", warning);
        }
    } else {
        for warning in warnings {
            warn!("{}", warning);
        }
    }
}

fn preflight_reported_by_caller(config: &ExtractionConfig) -> bool {
    config.recognizer.is_some()
}

#[cfg(feature = "ocr")]
async fn resolve_ocrs(config: &ExtractionConfig) -> Result<Arc<dyn PageRecognizer>, ExtractError> {
    Ok(Arc::new(
        ocrs_engine::OcrsRecognizer::load(&config.ocr_models).await?,
    ))
}

#[cfg(not(feature = "ocr"))]
async fn resolve_ocrs(_config: &ExtractionConfig) -> Result<Arc<dyn PageRecognizer>, ExtractError> {
    Err(ExtractError::RecognizerUnavailable {
        engine: RecognizerKind::Ocrs.as_str().to_string(),
        hint: "This build was compiled without the `ocr` feature.\n\
               Rebuild with `--features ocr` or pick another engine."
            .to_string(),
    })
}
