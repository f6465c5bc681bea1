//! PDF rasterisation: render pages to `DynamicImage` via pdfium.
//!
//! pdfium is a blocking C++ library, so every call here runs on the tokio
//! blocking pool. Pages are rendered one by one on a single blocking task
//! and handed to the async side through a bounded channel; at most
//! [`RENDER_AHEAD`] full-resolution bitmaps wait for the recognizer at any
//! time.
//!
//! Resolution is `dpi / 72` device pixels per PDF point, then capped so the
//! longest edge never exceeds `max_rendered_pixels`.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, PageError};
use crate::output::{DocumentMetadata, PageImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Rendered pages allowed to queue up ahead of recognition.
pub const RENDER_AHEAD: usize = 2;

/// The subset of [`ExtractionConfig`] the rasterizer needs.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub password: Option<String>,
}

impl From<&ExtractionConfig> for RenderOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
        }
    }
}

impl RenderOptions {
    fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Receiving half of a running render task.
pub type RenderedPages = mpsc::Receiver<Result<PageImage, PageError>>;

/// Start rendering `page_indices` (0-based) in the background.
///
/// Items arrive in the order of `page_indices`. Page-level failures are sent
/// as `Err(PageError::RenderFailed)`; document-level failures end the task
/// and surface through the returned `JoinHandle`. Dropping the receiver
/// stops rendering after the current page.
pub fn spawn_renderer(
    pdf_path: &Path,
    opts: RenderOptions,
    page_indices: &[usize],
) -> (RenderedPages, JoinHandle<Result<(), ExtractError>>) {
    let (tx, rx) = mpsc::channel(RENDER_AHEAD);
    let path = pdf_path.to_path_buf();
    let indices = page_indices.to_vec();

    let handle =
        tokio::task::spawn_blocking(move || render_into_channel(&path, &opts, &indices, tx));

    (rx, handle)
}

/// Rasterise the selected pages and collect them in page order.
///
/// Unlike the streaming path used by extraction, any page failure here is
/// fatal and reported as [`ExtractError::RasterisationFailed`].
pub async fn rasterize(
    pdf_path: &Path,
    config: &ExtractionConfig,
) -> Result<Vec<PageImage>, ExtractError> {
    let metadata = extract_metadata(pdf_path, config.password.as_deref()).await?;
    let indices = config.pages.to_indices(metadata.page_count);

    let (mut rx, handle) = spawn_renderer(pdf_path, RenderOptions::from(config), &indices);

    let mut pages = Vec::with_capacity(indices.len());
    while let Some(item) = rx.recv().await {
        match item {
            Ok(page) => pages.push(page),
            Err(e) => {
                drop(rx);
                join_renderer(handle).await?;
                return Err(fatal_page_error(e));
            }
        }
    }
    join_renderer(handle).await?;

    info!("Rasterised {} pages at {} DPI", pages.len(), config.dpi);
    Ok(pages)
}

fn fatal_page_error(e: PageError) -> ExtractError {
    ExtractError::RasterisationFailed {
        page: e.page(),
        detail: e.to_string(),
    }
}

/// Wait for a render task and flatten its result.
pub async fn join_renderer(
    handle: JoinHandle<Result<(), ExtractError>>,
) -> Result<(), ExtractError> {
    handle
        .await
        .map_err(|e| ExtractError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_into_channel(
    pdf_path: &Path,
    opts: &RenderOptions,
    page_indices: &[usize],
    tx: mpsc::Sender<Result<PageImage, PageError>>,
) -> Result<(), ExtractError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, opts.password.as_deref())
        .map_err(|e| classify_open_error(pdf_path, opts.password.is_some(), &e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    debug!("Render task opened {} ({} pages)", pdf_path.display(), total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(opts.scale())
        .set_maximum_width(opts.max_rendered_pixels as i32)
        .set_maximum_height(opts.max_rendered_pixels as i32);

    for &idx in page_indices {
        let page_num = idx + 1;
        if idx >= total_pages {
            warn!("Skipping page {} (out of range, total={})", page_num, total_pages);
            continue;
        }

        let item = render_one(&pages, idx, &render_config);
        if tx.blocking_send(item).is_err() {
            debug!("Renderer receiver dropped; stopping at page {}", page_num);
            break;
        }
    }

    Ok(())
}

fn render_one(
    pages: &PdfPages<'_>,
    idx: usize,
    render_config: &PdfRenderConfig,
) -> Result<PageImage, PageError> {
    let page_num = idx + 1;
    let page = pages
        .get(idx as u16)
        .map_err(|e| PageError::RenderFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| PageError::RenderFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_num,
        image.width(),
        image.height()
    );

    Ok(PageImage { page_num, image })
}

/// Extract document metadata from a PDF without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, ExtractError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| ExtractError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, ExtractError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| classify_open_error(pdf_path, password.is_some(), &e))?;

    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: pages.len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

fn classify_open_error(path: &Path, had_password: bool, e: &PdfiumError) -> ExtractError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            ExtractError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        ExtractError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}

/// Bind to a pdfium shared library.
///
/// Lookup order: `PDFIUM_LIB_PATH` (a directory holding the platform
/// library, or the library file itself), then the current directory, then
/// the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let bindings = match pdfium_lib_override() {
        Some(lib) => Pdfium::bind_to_library(&lib),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn pdfium_lib_override() -> Option<PathBuf> {
    let raw = std::env::var_os("PDFIUM_LIB_PATH")?;
    if raw.is_empty() {
        return None;
    }
    let path = PathBuf::from(raw);
    if path.is_dir() {
        Some(Pdfium::pdfium_platform_library_name_at_path(&path))
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_scale_follows_dpi() {
        let opts = RenderOptions {
            dpi: 300,
            max_rendered_pixels: 6000,
            password: None,
        };
        assert!((opts.scale() - 300.0 / 72.0).abs() < f32::EPSILON);
    }

    #[test]
    fn page_render_failure_is_fatal_for_rasterize() {
        let err = fatal_page_error(PageError::RenderFailed {
            page: 3,
            detail: "bitmap allocation failed".into(),
        });
        match err {
            ExtractError::RasterisationFailed { page, detail } => {
                assert_eq!(page, 3);
                assert!(detail.contains("bitmap allocation failed"), "{detail}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn options_come_from_config() {
        let config = ExtractionConfig::builder()
            .dpi(150)
            .password("secret")
            .build()
            .unwrap();
        let opts = RenderOptions::from(&config);
        assert_eq!(opts.dpi, 150);
        assert_eq!(opts.password.as_deref(), Some("secret"));
    }
}
