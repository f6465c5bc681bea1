//! Streaming extraction API: emit pages as they are recognised.
//!
//! Large scans take minutes. [`extract_stream`] yields each page as soon as
//! it is done, so callers can show partial text or drive a progress bar.
//! Pages always arrive in page order, whatever the configured concurrency.
//! Under [`FailurePolicy::FailFast`] the stream ends after the first error.
//! If the renderer stops partway through the document, the stream ends with
//! a final `Err(PageError::RenderFailed)` for the first page it never sent.
//!
//! The stream only covers recognition: aggregation and the output PDF are
//! left to the caller ([`crate::pipeline::aggregate`],
//! [`crate::pipeline::writer`]).

use crate::config::{ExtractionConfig, FailurePolicy};
use crate::error::{ExtractError, PageError};
use crate::extract::{page_results, select_pages, RecognitionOptions};
use crate::output::{PageText, UploadedDocument};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::{recognize, render};
use futures::stream::StreamExt;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageText, PageError>> + Send>>;

/// Extract a PDF file or URL, streaming pages in page order.
///
/// # Returns
/// - `Ok(PageStream)`: one `Result<PageText, PageError>` per selected page
/// - `Err(ExtractError)`: fatal error found before the first page
///   (file not found, not a PDF, recognizer unavailable, …)
pub async fn extract_stream(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PageStream, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming extraction: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    stream_resolved(resolved, config).await
}

/// Streaming equivalent of [`crate::extract::extract_upload`].
///
/// The upload's temp file lives as long as the returned stream.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdfocr::{extract_stream_from_upload, ExtractionConfig, UploadedDocument};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let upload = UploadedDocument::new("scan.pdf", std::fs::read("scan.pdf")?);
/// let config = ExtractionConfig::default();
/// let mut stream = extract_stream_from_upload(&upload, &config).await?;
/// while let Some(page) = stream.next().await {
///     match page {
///         Ok(p) => println!("Página {}:\n{}", p.page_num, p.text),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract_stream_from_upload(
    upload: &UploadedDocument,
    config: &ExtractionConfig,
) -> Result<PageStream, ExtractError> {
    let resolved = input::persist_upload(upload)?;
    stream_resolved(resolved, config).await
}

async fn stream_resolved(
    resolved: ResolvedInput,
    config: &ExtractionConfig,
) -> Result<PageStream, ExtractError> {
    let recognizer = recognize::resolve_recognizer(config).await?;
    recognize::report_preflight(config, recognizer.as_ref());

    let metadata = render::extract_metadata(resolved.path(), config.password.as_deref()).await?;
    let page_indices = select_pages(&config.pages, metadata.page_count)?;

    let (rx, handle) = render::spawn_renderer(
        resolved.path(),
        render::RenderOptions::from(config),
        &page_indices,
    );
    let opts = RecognitionOptions::from(config).with_total(page_indices.len());
    let fail_fast = config.failure_policy == FailurePolicy::FailFast;

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let render_outcome =
        futures::stream::once(render::join_renderer(handle)).filter_map(move |joined| {
            let item = joined.err().map(|e| {
                warn!("Renderer stopped early: {}", e);
                Err(render_failure(
                    &e,
                    &page_indices,
                    delivered.load(Ordering::SeqCst),
                ))
            });
            futures::future::ready(item)
        });

    let s = page_results(ReceiverStream::new(rx), recognizer, opts)
        .map(move |page| {
            // Keeps the temp input alive until the stream is dropped.
            let _input = &resolved;
            counter.fetch_add(1, Ordering::SeqCst);
            into_result(page)
        })
        .chain(render_outcome)
        .scan(false, move |failed, item| {
            if *failed {
                return futures::future::ready(None);
            }
            if item.is_err() && fail_fast {
                *failed = true;
            }
            futures::future::ready(Some(item))
        });

    Ok(Box::pin(s))
}

/// Turn a document-level render failure into the stream's last item.
fn render_failure(error: &ExtractError, page_indices: &[usize], delivered: usize) -> PageError {
    let page = match error {
        ExtractError::RasterisationFailed { page, .. } => *page,
        _ => page_indices
            .get(delivered)
            .or(page_indices.last())
            .map_or(1, |i| i + 1),
    };
    PageError::RenderFailed {
        page,
        detail: error.to_string(),
    }
}

fn into_result(mut page: PageText) -> Result<PageText, PageError> {
    match page.error.take() {
        None => Ok(page),
        Some(e) => Err(e),
    }
}
