//! Pure-Rust OCR with `ocrs` neural models executed by `rten`.
//!
//! Needs two model files, `text-detection.rten` and
//! `text-recognition.rten`. Running `ocrs-cli` once downloads them to
//! `~/.cache/ocrs`, which is where [`crate::OcrModelPaths::default`] looks.
//!
//! Loading the models is the expensive step, so engines are cached for the
//! life of the process, keyed by model paths. After loading an engine is
//! only read, and every page shares it.

use super::{PageRecognizer, RecognizeError, Recognition};
use crate::config::OcrModelPaths;
use crate::error::ExtractError;
use crate::output::PageImage;
use ::ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rten::Model;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

const ENGINE: &str = "ocrs";

static ENGINES: Lazy<Mutex<HashMap<OcrModelPaths, Arc<OcrsEngine>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Recognizer backed by a shared `ocrs` engine.
pub struct OcrsRecognizer {
    engine: Arc<OcrsEngine>,
}

impl OcrsRecognizer {
    /// Get the cached engine for `paths`, loading the models on first use.
    ///
    /// Model files are read on the blocking pool.
    #[instrument(skip_all, fields(
        detection = %paths.detection.display(),
        recognition = %paths.recognition.display(),
    ))]
    pub async fn load(paths: &OcrModelPaths) -> Result<Self, ExtractError> {
        let paths = paths.clone();
        tokio::task::spawn_blocking(move || Self::load_blocking(&paths))
            .await
            .map_err(|e| ExtractError::Internal(format!("ocrs model load task panicked: {e}")))?
    }

    fn load_blocking(paths: &OcrModelPaths) -> Result<Self, ExtractError> {
        let mut engines = ENGINES
            .lock()
            .map_err(|_| ExtractError::Internal("ocrs engine cache poisoned".into()))?;

        if let Some(engine) = engines.get(paths) {
            debug!("Reusing loaded ocrs engine");
            return Ok(Self {
                engine: Arc::clone(engine),
            });
        }

        let engine = Arc::new(build_engine(paths)?);
        engines.insert(paths.clone(), Arc::clone(&engine));
        Ok(Self { engine })
    }
}

fn build_engine(paths: &OcrModelPaths) -> Result<OcrsEngine, ExtractError> {
    info!("Loading OCR detection model");
    let detection_model = load_model(&paths.detection, "detection")?;
    info!("Loading OCR recognition model");
    let recognition_model = load_model(&paths.recognition, "recognition")?;

    OcrsEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })
    .map_err(|e| ExtractError::RecognizerUnavailable {
        engine: ENGINE.to_string(),
        hint: format!("failed to initialise OCR engine: {e}"),
    })
}

fn load_model(path: &Path, kind: &str) -> Result<Model, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::RecognizerUnavailable {
            engine: ENGINE.to_string(),
            hint: format!(
                "{kind} model not found at {}.\n\
                 Run `ocrs-cli` once to download the models, or pass --models <DIR>.",
                path.display()
            ),
        });
    }
    Model::load_file(path).map_err(|e| ExtractError::RecognizerUnavailable {
        engine: ENGINE.to_string(),
        hint: format!("failed to load {kind} model from {}: {e}", path.display()),
    })
}

#[async_trait]
impl PageRecognizer for OcrsRecognizer {
    fn name(&self) -> &str {
        ENGINE
    }

    #[instrument(level = "debug", skip_all, fields(page = page.page_num))]
    async fn recognize(&self, page: &PageImage) -> Result<Recognition, RecognizeError> {
        let rgb = page.image.to_rgb8();
        let engine = Arc::clone(&self.engine);

        let text = tokio::task::spawn_blocking(move || {
            let (width, height) = rgb.dimensions();
            let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|e| {
                RecognizeError::new(format!(
                    "failed to create image source ({width}x{height}): {e}"
                ))
            })?;
            let input = engine
                .prepare_input(source)
                .map_err(|e| RecognizeError::new(format!("OCR preprocessing failed: {e}")))?;
            engine
                .get_text(&input)
                .map_err(|e| RecognizeError::new(format!("OCR text recognition failed: {e}")))
        })
        .await
        .map_err(|e| RecognizeError::new(format!("OCR task panicked: {e}")))??;

        debug!(
            line_count = text.lines().count(),
            char_count = text.len(),
            "OCR recognition complete"
        );
        Ok(Recognition::text(text))
    }

    fn preflight(&self) -> Vec<String> {
        if cfg!(debug_assertions) {
            vec![
                "ocrs is running in a debug build and will be very slow; \
                 build with --release."
                    .to_string(),
            ]
        } else {
            Vec::new()
        }
    }
}
