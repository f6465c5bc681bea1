//! Eager (full-document) extraction entry points.
//!
//! These functions wait for every page, then return. Use
//! [`crate::stream::extract_stream`] to receive pages as they are
//! recognised instead.
//!
//! Rendering and recognition overlap: a blocking render task feeds page
//! images through a bounded channel and the recognizer consumes them in
//! page order, so only a handful of bitmaps are alive at once.

use crate::config::{ExtractionConfig, FailurePolicy, PageSelection};
use crate::error::{ExtractError, PageError};
use crate::output::{
    Delivery, DocumentMetadata, ExtractionOutput, ExtractionStats, PageImage, PageText,
    UploadedDocument,
};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::recognize::{self, PageRecognizer, RecognizeError};
use crate::pipeline::{aggregate, postprocess, render, writer};
use crate::progress::{PipelineStage, ProgressCallback};
use futures::stream::{Stream, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Extract the text of every page of a PDF file or URL.
///
/// # Returns
/// `Ok(ExtractionOutput)` on success, even if some pages failed under
/// [`FailurePolicy::SkipPage`] (check `output.stats.failed_pages`).
///
/// # Errors
/// Fatal errors only: unreadable or non-PDF input, a document without
/// pages, an unavailable recognizer, a page failure under
/// [`FailurePolicy::FailFast`], or every page failing.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let result: Result<_, ExtractError> = async {
        let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
        extract_resolved(&resolved, config).await
    }
    .await;
    report_failure(config, result)
}

/// Extract the text of an uploaded PDF.
///
/// The bytes are written to a temp file that is removed before this
/// function returns.
pub async fn extract_upload(
    upload: &UploadedDocument,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    info!(
        "Starting extraction of upload '{}' ({} bytes)",
        upload.file_name,
        upload.bytes.len()
    );

    let result: Result<_, ExtractError> = async {
        let resolved = input::persist_upload(upload)?;
        extract_resolved(&resolved, config).await
    }
    .await;
    report_failure(config, result)
}

/// Run the whole upload-to-download flow.
///
/// Extracts the text, assembles the output PDF and stores it under a unique
/// `texto_extraido-XXXXXX.pdf` name in `out_dir` (system temp dir when
/// `None`). The returned [`Delivery`] offers it as `texto_extraido.pdf`.
pub async fn process_upload(
    upload: &UploadedDocument,
    config: &ExtractionConfig,
    out_dir: Option<&Path>,
) -> Result<Delivery, ExtractError> {
    let output = extract_upload(upload, config).await?;
    deliver(output, config, out_dir)
}

/// [`process_upload`] for a PDF file path or URL.
pub async fn extract_to_dir(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
    out_dir: Option<&Path>,
) -> Result<Delivery, ExtractError> {
    let output = extract(input_str, config).await?;
    deliver(output, config, out_dir)
}

fn deliver(
    output: ExtractionOutput,
    config: &ExtractionConfig,
    out_dir: Option<&Path>,
) -> Result<Delivery, ExtractError> {
    let result = writer::write_document(&output.texts, &config.layout).and_then(|doc| {
        stage(config, PipelineStage::DocumentWritten);
        let path = writer::persist_document(&doc, out_dir)?;
        Ok(Delivery::new(output, path, doc.page_count))
    });
    let delivery = report_failure(config, result)?;

    stage(config, PipelineStage::Delivered);
    Ok(delivery)
}

/// Extract a PDF file or URL and write the assembled output PDF to `output_path`.
///
/// The write is atomic (temp file + rename).
pub async fn extract_to_pdf(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<Delivery, ExtractError> {
    let output = extract(input_str, config).await?;
    let path = output_path.as_ref();

    let result: Result<_, ExtractError> = async {
        let doc = writer::write_document(&output.texts, &config.layout)?;
        stage(config, PipelineStage::DocumentWritten);
        writer::write_to_file(&doc, path).await?;
        Ok(doc.page_count)
    }
    .await;
    let page_count = report_failure(config, result)?;

    stage(config, PipelineStage::Delivered);
    Ok(Delivery::new(output, path.to_path_buf(), page_count))
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Read PDF metadata without rendering or recognising anything.
pub async fn inspect(
    input_str: impl AsRef<str>,
    password: Option<&str>,
) -> Result<DocumentMetadata, ExtractError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), password).await
}

// ── Core ─────────────────────────────────────────────────────────────────

async fn extract_resolved(
    resolved: &ResolvedInput,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let pdf_path = resolved.path();
    stage(config, PipelineStage::FileReceived);

    // ── Recognizer first: fail before rendering anything ─────────────────
    let recognizer = recognize::resolve_recognizer(config).await?;
    recognize::report_preflight(config, recognizer.as_ref());

    // ── Page count and selection ─────────────────────────────────────────
    let metadata = render::extract_metadata(pdf_path, config.password.as_deref()).await?;
    let page_indices = select_pages(&config.pages, metadata.page_count)?;
    let selected = page_indices.len();
    debug!("Selected {} of {} pages", selected, metadata.page_count);

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(selected);
    }

    // ── Render → recognise, overlapped ───────────────────────────────────
    let recognition_start = Instant::now();
    let (rx, handle) = render::spawn_renderer(
        pdf_path,
        render::RenderOptions::from(config),
        &page_indices,
    );
    let recognized = recognize_pages(
        ReceiverStream::new(rx),
        recognizer,
        RecognitionOptions::from(config).with_total(selected),
        config.failure_policy,
    )
    .await;
    // Document-level render errors take precedence over page results.
    render::join_renderer(handle).await?;
    stage(config, PipelineStage::Rasterized);
    let pages = recognized?;
    stage(config, PipelineStage::Recognized);
    let recognition_duration_ms = recognition_start.elapsed().as_millis() as u64;

    // ── Aggregate ────────────────────────────────────────────────────────
    let output = finish_output(
        pages,
        metadata,
        selected,
        &config.page_label,
        Timings {
            total_ms: total_start.elapsed().as_millis() as u64,
            recognition_ms: recognition_duration_ms,
        },
    )?;
    stage(config, PipelineStage::Aggregated);

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(selected, output.stats.processed_pages);
    }

    info!(
        "Extraction complete: {}/{} pages, {}ms total",
        output.stats.processed_pages, selected, output.stats.total_duration_ms
    );
    Ok(output)
}

/// Expand the selection, rejecting one that matches no page.
pub(crate) fn select_pages(
    selection: &PageSelection,
    total_pages: usize,
) -> Result<Vec<usize>, ExtractError> {
    if total_pages == 0 {
        return Err(ExtractError::EmptyDocument);
    }
    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        let page = match selection {
            PageSelection::All => 0,
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.first().copied().unwrap_or(0),
        };
        return Err(ExtractError::PageOutOfRange {
            page,
            total: total_pages,
        });
    }
    Ok(indices)
}

struct Timings {
    total_ms: u64,
    recognition_ms: u64,
}

fn finish_output(
    pages: Vec<PageText>,
    metadata: DocumentMetadata,
    selected: usize,
    page_label: &str,
    timings: Timings,
) -> Result<ExtractionOutput, ExtractError> {
    let processed = pages.iter().filter(|p| p.is_ok()).count();
    let failed = pages.len() - processed;

    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "No page was recognised".to_string());
        return Err(ExtractError::AllPagesFailed {
            total: selected,
            first_error,
        });
    }

    let texts = aggregate::aggregate(page_label, &pages);
    let stats = ExtractionStats {
        total_pages: metadata.page_count,
        processed_pages: processed,
        failed_pages: failed,
        skipped_pages: selected.saturating_sub(pages.len()),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: timings.total_ms,
        recognition_duration_ms: timings.recognition_ms,
    };

    Ok(ExtractionOutput {
        texts,
        pages,
        metadata,
        stats,
    })
}

/// Per-page knobs, owned so recognition streams can be `'static`.
#[derive(Clone)]
pub(crate) struct RecognitionOptions {
    pub concurrency: usize,
    pub page_timeout_secs: u64,
    /// Number of selected pages, reported to the progress callback.
    pub total_pages: usize,
    pub progress: Option<ProgressCallback>,
}

impl From<&ExtractionConfig> for RecognitionOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            page_timeout_secs: config.page_timeout_secs,
            total_pages: 0,
            progress: config.progress_callback.clone(),
        }
    }
}

impl RecognitionOptions {
    pub(crate) fn with_total(mut self, total_pages: usize) -> Self {
        self.total_pages = total_pages;
        self
    }
}

/// Recognise a stream of rendered pages, `concurrency` at a time.
///
/// Yields exactly one [`PageText`] per input item, in input order. Render
/// failures pass through as failed pages.
pub(crate) fn page_results<S>(
    pages: S,
    recognizer: Arc<dyn PageRecognizer>,
    opts: RecognitionOptions,
) -> impl Stream<Item = PageText> + Send + 'static
where
    S: Stream<Item = Result<PageImage, PageError>> + Send + 'static,
{
    let concurrency = opts.concurrency;
    pages
        .map(move |item| {
            let recognizer = Arc::clone(&recognizer);
            let opts = opts.clone();
            async move { recognize_one(item, recognizer.as_ref(), &opts).await }
        })
        .buffered(concurrency)
}

/// Collect [`page_results`] under the failure policy.
pub(crate) async fn recognize_pages<S>(
    pages: S,
    recognizer: Arc<dyn PageRecognizer>,
    opts: RecognitionOptions,
    policy: FailurePolicy,
) -> Result<Vec<PageText>, ExtractError>
where
    S: Stream<Item = Result<PageImage, PageError>> + Send + 'static,
{
    let results = page_results(pages, recognizer, opts);
    futures::pin_mut!(results);

    let mut collected = Vec::new();
    while let Some(page) = results.next().await {
        if let (Some(err), FailurePolicy::FailFast) = (&page.error, policy) {
            return Err(ExtractError::PageFailed {
                page: page.page_num,
                source: err.clone(),
            });
        }
        collected.push(page);
    }
    Ok(collected)
}

async fn recognize_one(
    item: Result<PageImage, PageError>,
    recognizer: &dyn PageRecognizer,
    opts: &RecognitionOptions,
) -> PageText {
    let total = opts.total_pages;
    let page = match item {
        Ok(page) => page,
        Err(e) => {
            warn!("{}", e);
            if let Some(ref cb) = opts.progress {
                cb.on_page_error(e.page(), total, &e.to_string());
            }
            return PageText::failed(e.page(), recognizer.name(), e);
        }
    };
    let page_num = page.page_num;

    if let Some(ref cb) = opts.progress {
        cb.on_page_start(page_num, total);
    }

    let start = Instant::now();
    let outcome = with_timeout(opts.page_timeout_secs, recognizer.recognize(&page)).await;
    drop(page);
    let duration_ms = start.elapsed().as_millis() as u64;

    let result = match outcome {
        Some(Ok(recognition)) => {
            let text = postprocess::clean_text(&recognition.text);
            debug!("Page {}: {} chars in {}ms", page_num, text.len(), duration_ms);
            PageText {
                page_num,
                text,
                engine: recognizer.name().to_string(),
                input_tokens: recognition.input_tokens,
                output_tokens: recognition.output_tokens,
                duration_ms,
                retries: recognition.retries,
                error: None,
            }
        }
        Some(Err(e)) => failed_page(
            page_num,
            recognizer.name(),
            duration_ms,
            recognition_failed(page_num, recognizer.name(), e),
        ),
        None => failed_page(
            page_num,
            recognizer.name(),
            duration_ms,
            PageError::Timeout {
                page: page_num,
                secs: opts.page_timeout_secs,
            },
        ),
    };

    if let Some(ref cb) = opts.progress {
        match result.error {
            None => cb.on_page_complete(page_num, total, result.text.len()),
            Some(ref e) => cb.on_page_error(page_num, total, &e.to_string()),
        }
    }
    result
}

/// `None` when the timeout fired; 0 disables it.
async fn with_timeout<F: std::future::Future>(secs: u64, fut: F) -> Option<F::Output> {
    if secs == 0 {
        return Some(fut.await);
    }
    tokio::time::timeout(Duration::from_secs(secs), fut).await.ok()
}

fn recognition_failed(page: usize, engine: &str, e: RecognizeError) -> PageError {
    PageError::RecognitionFailed {
        page,
        engine: engine.to_string(),
        retries: e.retries,
        detail: e.detail,
    }
}

fn failed_page(page_num: usize, engine: &str, duration_ms: u64, error: PageError) -> PageText {
    warn!("{}", error);
    let mut page = PageText::failed(page_num, engine, error);
    page.duration_ms = duration_ms;
    page
}

fn stage(config: &ExtractionConfig, stage: PipelineStage) {
    debug!("Stage: {}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}

fn report_failure<T>(
    config: &ExtractionConfig,
    result: Result<T, ExtractError>,
) -> Result<T, ExtractError> {
    if result.is_err() {
        stage(config, PipelineStage::Failed);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::recognize::Recognition;
    use crate::progress::ExtractionProgressCallback;
    use async_trait::async_trait;
    use futures::stream;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers "texto N", failing on `fail_on` and sleeping on `slow_on`.
    struct FakeRecognizer {
        fail_on: Vec<usize>,
        slow_on: Vec<usize>,
        calls: AtomicUsize,
    }

    impl FakeRecognizer {
        fn new() -> Self {
            Self {
                fail_on: Vec::new(),
                slow_on: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageRecognizer for FakeRecognizer {
        fn name(&self) -> &str {
            "fake"
        }

        async fn recognize(&self, page: &PageImage) -> Result<Recognition, RecognizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.slow_on.contains(&page.page_num) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if self.fail_on.contains(&page.page_num) {
                return Err(RecognizeError::new("unreadable").with_retries(2));
            }
            // Later pages answer sooner, to shake out ordering bugs.
            tokio::time::sleep(Duration::from_millis(30 / page.page_num as u64)).await;
            Ok(Recognition::text(format!(
                "  texto {}  \r\n\r\n\r\n\r\nfin\u{000C}",
                page.page_num
            )))
        }
    }

    fn image_page(page_num: usize) -> Result<PageImage, PageError> {
        Ok(PageImage {
            page_num,
            image: DynamicImage::ImageRgb8(RgbImage::new(8, 8)),
        })
    }

    fn rendered(n: usize) -> impl Stream<Item = Result<PageImage, PageError>> + Send + 'static {
        stream::iter((1..=n).map(image_page).collect::<Vec<_>>())
    }

    fn opts(concurrency: usize, total: usize) -> RecognitionOptions {
        RecognitionOptions {
            concurrency,
            page_timeout_secs: 0,
            total_pages: total,
            progress: None,
        }
    }

    #[tokio::test]
    async fn one_result_per_page_in_page_order() {
        let pages = recognize_pages(
            rendered(5),
            Arc::new(FakeRecognizer::new()),
            opts(3, 5),
            FailurePolicy::SkipPage,
        )
        .await
        .unwrap();

        let nums: Vec<usize> = pages.iter().map(|p| p.page_num).collect();
        assert_eq!(nums, vec![1, 2, 3, 4, 5]);
        assert_eq!(pages[0].text, "texto 1\n\nfin");
        assert!(pages.iter().all(|p| p.engine == "fake"));
    }

    #[tokio::test]
    async fn skip_page_records_failure_and_continues() {
        let fake = FakeRecognizer {
            fail_on: vec![2],
            ..FakeRecognizer::new()
        };
        let pages = recognize_pages(rendered(3), Arc::new(fake), opts(1, 3), FailurePolicy::SkipPage)
            .await
            .unwrap();

        assert_eq!(pages.len(), 3);
        assert!(pages[0].is_ok() && pages[2].is_ok());
        match pages[1].error {
            Some(PageError::RecognitionFailed {
                page,
                ref engine,
                retries,
                ..
            }) => {
                assert_eq!(page, 2);
                assert_eq!(engine, "fake");
                assert_eq!(retries, 2);
            }
            ref other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fail_fast_aborts_on_first_failure() {
        let fake = Arc::new(FakeRecognizer {
            fail_on: vec![2],
            ..FakeRecognizer::new()
        });
        let err = recognize_pages(
            rendered(6),
            fake.clone(),
            opts(1, 6),
            FailurePolicy::FailFast,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExtractError::PageFailed { page: 2, .. }));
        assert!(fake.calls.load(Ordering::SeqCst) < 6);
    }

    #[tokio::test]
    async fn render_failures_pass_through() {
        let items = vec![
            image_page(1),
            Err(PageError::RenderFailed {
                page: 2,
                detail: "bitmap".into(),
            }),
            image_page(3),
        ];
        let pages = recognize_pages(
            stream::iter(items),
            Arc::new(FakeRecognizer::new()),
            opts(2, 3),
            FailurePolicy::SkipPage,
        )
        .await
        .unwrap();

        assert_eq!(pages.len(), 3);
        assert!(matches!(
            pages[1].error,
            Some(PageError::RenderFailed { page: 2, .. })
        ));
    }

    #[tokio::test]
    async fn slow_page_times_out() {
        let fake = FakeRecognizer {
            slow_on: vec![1],
            ..FakeRecognizer::new()
        };
        let mut o = opts(1, 2);
        o.page_timeout_secs = 1;
        let pages = recognize_pages(rendered(2), Arc::new(fake), o, FailurePolicy::SkipPage)
            .await
            .unwrap();

        assert_eq!(
            pages[0].error,
            Some(PageError::Timeout { page: 1, secs: 1 })
        );
        assert!(pages[1].is_ok());
    }

    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        completed: AtomicUsize,
        errors: Mutex<Vec<usize>>,
    }

    impl ExtractionProgressCallback for Counter {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _page_num: usize, total_pages: usize, _text_len: usize) {
            assert_eq!(total_pages, 4);
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.lock().unwrap().push(page_num);
        }
    }

    #[tokio::test]
    async fn progress_callback_sees_every_page() {
        let counter = Arc::new(Counter::default());
        let mut o = opts(2, 4);
        o.progress = Some(counter.clone() as ProgressCallback);
        let fake = FakeRecognizer {
            fail_on: vec![3],
            ..FakeRecognizer::new()
        };
        recognize_pages(rendered(4), Arc::new(fake), o, FailurePolicy::SkipPage)
            .await
            .unwrap();

        assert_eq!(counter.started.load(Ordering::SeqCst), 4);
        assert_eq!(counter.completed.load(Ordering::SeqCst), 3);
        assert_eq!(*counter.errors.lock().unwrap(), vec![3]);
    }

    fn ok_page(n: usize, text: &str) -> PageText {
        PageText {
            page_num: n,
            text: text.into(),
            engine: "fake".into(),
            input_tokens: 10,
            output_tokens: 5,
            duration_ms: 1,
            retries: 0,
            error: None,
        }
    }

    fn timings() -> Timings {
        Timings {
            total_ms: 10,
            recognition_ms: 5,
        }
    }

    #[test]
    fn finish_output_formats_blocks_and_stats() {
        let metadata = DocumentMetadata {
            page_count: 3,
            ..Default::default()
        };
        let pages = vec![
            ok_page(1, "uno"),
            PageText::failed(2, "fake", PageError::Timeout { page: 2, secs: 1 }),
            ok_page(3, "tres"),
        ];
        let out = finish_output(pages, metadata, 3, "Página", timings()).unwrap();

        assert_eq!(out.texts, vec!["Página 1:\nuno\n", "Página 3:\ntres\n"]);
        assert_eq!(out.stats.processed_pages, 2);
        assert_eq!(out.stats.failed_pages, 1);
        assert_eq!(out.stats.skipped_pages, 0);
        assert_eq!(out.stats.total_input_tokens, 20);
        assert_eq!(out.failures().count(), 1);
    }

    #[test]
    fn all_pages_failed_is_fatal() {
        let pages = vec![PageText::failed(
            1,
            "fake",
            PageError::Timeout { page: 1, secs: 1 },
        )];
        let err = finish_output(pages, DocumentMetadata::default(), 1, "Página", timings())
            .unwrap_err();
        match err {
            ExtractError::AllPagesFailed { total, first_error } => {
                assert_eq!(total, 1);
                assert!(first_error.contains("timed out"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn page_selection_errors() {
        assert!(matches!(
            select_pages(&PageSelection::All, 0),
            Err(ExtractError::EmptyDocument)
        ));
        assert!(matches!(
            select_pages(&PageSelection::Single(9), 3),
            Err(ExtractError::PageOutOfRange { page: 9, total: 3 })
        ));
        assert_eq!(select_pages(&PageSelection::All, 2).unwrap(), vec![0, 1]);
    }

    #[derive(Default)]
    struct Stages(Mutex<Vec<PipelineStage>>);

    impl ExtractionProgressCallback for Stages {
        fn on_stage(&self, stage: PipelineStage) {
            self.0.lock().unwrap().push(stage);
        }
    }

    #[tokio::test]
    async fn non_pdf_upload_fails_without_output() {
        let stages = Arc::new(Stages::default());
        let config = ExtractionConfig::builder()
            .recognizer(Arc::new(FakeRecognizer::new()))
            .progress_callback(stages.clone())
            .build()
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let upload = UploadedDocument::new("foto.png", b"\x89PNG\r\n\x1a\n".to_vec());

        let err = process_upload(&upload, &config, Some(dir.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::NotAPdf { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(*stages.0.lock().unwrap(), vec![PipelineStage::Failed]);
    }

    #[tokio::test]
    async fn empty_upload_is_reported() {
        let config = ExtractionConfig::builder()
            .recognizer(Arc::new(FakeRecognizer::new()))
            .build()
            .unwrap();
        let upload = UploadedDocument::new("vacío.pdf", Vec::new());
        assert!(matches!(
            extract_upload(&upload, &config).await,
            Err(ExtractError::EmptyInput { .. })
        ));
    }
}
