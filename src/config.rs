//! Configuration types for PDF text extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Rendering, recognition, aggregation
//! and output layout each get their own knobs here so that every stage of
//! the pipeline reads from a single value.

use crate::error::ExtractError;
use crate::pipeline::recognize::PageRecognizer;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default header label placed before each page's text ("Página 3:").
pub const DEFAULT_PAGE_LABEL: &str = "Página";

/// Suggested file name when offering the generated PDF for download.
pub const DOWNLOAD_FILE_NAME: &str = "texto_extraido.pdf";

/// Upper bound for [`VisionOptions::max_retries`].
pub const MAX_VISION_RETRIES: u32 = 10;

/// MIME type of the generated document.
pub const OUTPUT_MIME_TYPE: &str = "application/pdf";

/// Configuration for a PDF text extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfocr::{ExtractionConfig, FailurePolicy, RecognizerKind};
///
/// let config = ExtractionConfig::builder()
///     .dpi(300)
///     .engine(RecognizerKind::Tesseract)
///     .failure_policy(FailurePolicy::FailFast)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 6000.
    ///
    /// Applied on top of `dpi`: a poster-sized page is scaled down until its
    /// longest edge fits.
    pub max_rendered_pixels: u32,

    /// Which built-in recognizer to use. Default: [`RecognizerKind::Tesseract`].
    pub engine: RecognizerKind,

    /// Pre-constructed recognizer. Takes precedence over `engine`.
    pub recognizer: Option<Arc<dyn PageRecognizer>>,

    /// Options for the `tesseract` CLI recognizer.
    pub tesseract: TesseractOptions,

    /// Model files for the pure-Rust `ocrs` recognizer.
    pub ocr_models: OcrModelPaths,

    /// Options for the vision-LLM recognizer.
    pub vision: VisionOptions,

    /// What to do when a single page fails. Default: [`FailurePolicy::SkipPage`].
    pub failure_policy: FailurePolicy,

    /// Number of pages recognised at once. Default: 1.
    ///
    /// Results are always delivered in page order regardless of this value.
    pub concurrency: usize,

    /// Per-page recognition timeout in seconds; 0 disables it. Default: 300.
    pub page_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Label written before each page number in the aggregated text.
    pub page_label: String,

    /// Page geometry and typography of the generated PDF.
    pub layout: DocumentLayout,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives stage and per-page events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 6000,
            engine: RecognizerKind::default(),
            recognizer: None,
            tesseract: TesseractOptions::default(),
            ocr_models: OcrModelPaths::default(),
            vision: VisionOptions::default(),
            failure_policy: FailurePolicy::default(),
            concurrency: 1,
            page_timeout_secs: 300,
            password: None,
            pages: PageSelection::default(),
            page_label: DEFAULT_PAGE_LABEL.to_string(),
            layout: DocumentLayout::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("engine", &self.engine)
            .field(
                "recognizer",
                &self.recognizer.as_ref().map(|r| r.name().to_string()),
            )
            .field("tesseract", &self.tesseract)
            .field("ocr_models", &self.ocr_models)
            .field("vision", &self.vision)
            .field("failure_policy", &self.failure_policy)
            .field("concurrency", &self.concurrency)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("pages", &self.pages)
            .field("page_label", &self.page_label)
            .field("layout", &self.layout)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn engine(mut self, engine: RecognizerKind) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn PageRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn tesseract(mut self, opts: TesseractOptions) -> Self {
        self.config.tesseract = opts;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.tesseract.language = Some(lang.into());
        self
    }

    pub fn ocr_models(mut self, paths: OcrModelPaths) -> Self {
        self.config.ocr_models = paths;
        self
    }

    pub fn vision(mut self, opts: VisionOptions) -> Self {
        self.config.vision = opts;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.vision.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.vision.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.vision.provider = Some(provider);
        self
    }

    /// Retries per page on vision API failure, capped at [`MAX_VISION_RETRIES`].
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.vision.max_retries = n.min(MAX_VISION_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.vision.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.vision.system_prompt = Some(prompt.into());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_label(mut self, label: impl Into<String>) -> Self {
        self.config.page_label = label.into();
        self
    }

    pub fn layout(mut self, layout: DocumentLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.page_label.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Page label must not be empty".into(),
            ));
        }
        if c.vision.max_retries > MAX_VISION_RETRIES {
            return Err(ExtractError::InvalidConfig(format!(
                "max_retries must be ≤ {}, got {}",
                MAX_VISION_RETRIES, c.vision.max_retries
            )));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The built-in page-to-text strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecognizerKind {
    /// Classical OCR through the `tesseract` command-line tool. (default)
    #[default]
    Tesseract,
    /// Pure-Rust OCR (`ocrs`), models loaded once per process.
    /// Requires the `ocr` feature.
    Ocrs,
    /// A pretrained vision-to-text model behind an LLM provider.
    Vision,
}

impl RecognizerKind {
    /// Short engine name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognizerKind::Tesseract => "tesseract",
            RecognizerKind::Ocrs => "ocrs",
            RecognizerKind::Vision => "vision",
        }
    }
}

/// What happens to the run when a single page fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the page error, leave the page out of the text and the
    /// output PDF, keep going. Fails only if every page fails. (default)
    #[default]
    SkipPage,
    /// Abort the whole extraction on the first failed page.
    FailFast,
}

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Process all pages (default).
    #[default]
    All,
    /// Process a single page (1-indexed).
    Single(usize),
    /// Process a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Process specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

// ── Engine options ───────────────────────────────────────────────────────

/// Options for the `tesseract` CLI recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TesseractOptions {
    /// Binary to execute. Default: `tesseract` (looked up on `PATH`).
    pub binary: PathBuf,
    /// Language pack(s), e.g. `spa` or `eng+spa`. Default: tesseract's own.
    pub language: Option<String>,
}

impl Default for TesseractOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: None,
        }
    }
}

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Locations of the `ocrs` detection and recognition models.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OcrModelPaths {
    pub detection: PathBuf,
    pub recognition: PathBuf,
}

impl Default for OcrModelPaths {
    /// `$XDG_CACHE_HOME/ocrs`, else `~/.cache/ocrs` (where `ocrs-cli` puts them).
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrModelPaths {
    /// Expect `text-detection.rten` and `text-recognition.rten` inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection: dir.join(DETECTION_MODEL_FILENAME),
            recognition: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Both files exist on disk.
    pub fn available(&self) -> bool {
        self.detection.exists() && self.recognition.exists()
    }
}

fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Options for the vision-LLM recognizer.
#[derive(Clone)]
pub struct VisionOptions {
    /// LLM model identifier. If None, `gpt-4.1-nano`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed call. Default: 3, at most
    /// [`MAX_VISION_RETRIES`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for VisionOptions {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for VisionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionOptions")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

// ── Output layout ────────────────────────────────────────────────────────

/// Geometry and typography of the generated PDF.
///
/// Defaults: A4 portrait, 10 mm left/top/right margins, a 15 mm bottom
/// margin at which text breaks onto a new page, Helvetica 12 pt with
/// 10 mm line pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
    pub bottom_margin_mm: f32,
    pub font_size_pt: f32,
    pub line_height_mm: f32,
    /// Title stored in the PDF /Info dictionary.
    pub title: String,
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 10.0,
            bottom_margin_mm: 15.0,
            font_size_pt: 12.0,
            line_height_mm: 10.0,
            title: "Texto extraído".to_string(),
        }
    }
}

impl DocumentLayout {
    /// Reject layouts that leave no room for a single line of text.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.font_size_pt <= 0.0 || self.line_height_mm <= 0.0 {
            return Err(ExtractError::InvalidConfig(
                "Font size and line height must be positive".into(),
            ));
        }
        if self.usable_width_mm() <= 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "Margins of {} mm leave no width on a {} mm page",
                self.margin_mm, self.page_width_mm
            )));
        }
        if self.usable_height_mm() < self.line_height_mm {
            return Err(ExtractError::InvalidConfig(format!(
                "Margins leave less than one {} mm line on a {} mm page",
                self.line_height_mm, self.page_height_mm
            )));
        }
        Ok(())
    }

    pub fn usable_width_mm(&self) -> f32 {
        self.page_width_mm - 2.0 * self.margin_mm
    }

    pub fn usable_height_mm(&self) -> f32 {
        self.page_height_mm - self.margin_mm - self.bottom_margin_mm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_pipeline() {
        let c = ExtractionConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.engine, RecognizerKind::Tesseract);
        assert_eq!(c.failure_policy, FailurePolicy::SkipPage);
        assert_eq!(c.page_label, "Página");
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = ExtractionConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
        let c = ExtractionConfig::builder().dpi(5000).build().unwrap();
        assert_eq!(c.dpi, 600);
    }

    #[test]
    fn builder_rejects_empty_label() {
        let err = ExtractionConfig::builder().page_label("  ").build();
        assert!(matches!(err, Err(ExtractError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_impossible_layout() {
        let layout = DocumentLayout {
            margin_mm: 120.0,
            ..DocumentLayout::default()
        };
        let err = ExtractionConfig::builder().layout(layout).build();
        assert!(matches!(err, Err(ExtractError::InvalidConfig(_))));
    }

    #[test]
    fn max_retries_is_capped() {
        let c = ExtractionConfig::builder().max_retries(70).build().unwrap();
        assert_eq!(c.vision.max_retries, MAX_VISION_RETRIES);

        let mut vision = VisionOptions::default();
        vision.max_retries = 70;
        let err = ExtractionConfig::builder().vision(vision).build();
        assert!(matches!(err, Err(ExtractError::InvalidConfig(_))));
    }

    #[test]
    fn language_sets_tesseract_option() {
        let c = ExtractionConfig::builder().language("spa").build().unwrap();
        assert_eq!(c.tesseract.language.as_deref(), Some("spa"));
    }

    #[test]
    fn model_paths_from_dir() {
        let p = OcrModelPaths::from_dir("/tmp/my-models");
        assert_eq!(p.detection, PathBuf::from("/tmp/my-models/text-detection.rten"));
        assert_eq!(
            p.recognition,
            PathBuf::from("/tmp/my-models/text-recognition.rten")
        );
        assert!(!OcrModelPaths::from_dir("/nonexistent/ocr-models").available());
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(PageSelection::Range(3, 10).to_indices(4), vec![2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2]
        );
        assert!(PageSelection::All.to_indices(0).is_empty());
    }

    #[test]
    fn debug_hides_provider_handles() {
        let s = format!("{:?}", ExtractionConfig::default());
        assert!(s.contains("ExtractionConfig"));
        assert!(s.contains("dpi: 300"));
    }
}
