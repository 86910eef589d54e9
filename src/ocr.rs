//! Hybrid text extraction: vision OCR for page 1, structural stripping for
//! the rest.
//!
//! Gazette front pages are the hardest to strip structurally (masthead,
//! multi-column headers, stamps) and carry the publication metadata, so page 1
//! goes through the vision model at high resolution. Remaining pages are
//! ordinary notice columns where pdfium's text extraction is accurate and
//! effectively free.
//!
//! Degradation is total but never fatal: if the vision call fails, returns
//! empty text, or anything in the render path errors, the whole document is
//! stripped structurally instead. Only a PDF that cannot be opened at all
//! aborts the job.
//!
//! pdfium work runs inside `spawn_blocking` — the underlying C++ library uses
//! thread-local state and must not run on Tokio worker threads.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::ProcessingConfig;
use crate::error::GazetteError;
use crate::gateway::{Gateway, ImagePart};
use crate::prompts::OCR_INSTRUCTION;

/// Produce the full-text rendering of a PDF.
///
/// Vision pass on page 1 plus structural stripping of pages 2+, falling back
/// to strip-only for the entire document on any vision/render failure.
pub async fn extract_full_text(
    pdf_path: &Path,
    config: &ProcessingConfig,
    gateway: &Gateway,
) -> Result<String, GazetteError> {
    if !pdf_path.exists() {
        return Err(GazetteError::FileNotFound {
            path: pdf_path.to_path_buf(),
        });
    }

    match vision_first_page(pdf_path, config, gateway).await {
        Ok(Some(first_page_text)) => {
            info!("Vision OCR succeeded for page 1; stripping remaining pages");
            let rest = strip_text_from(pdf_path, 1).await?;
            let mut full = first_page_text;
            full.push_str("\n\n");
            full.push_str(&rest);
            Ok(full)
        }
        Ok(None) => {
            warn!("Vision OCR failed or returned empty text — falling back to full structural stripping");
            strip_text_from(pdf_path, 0).await
        }
        Err(e) => {
            warn!("Render error during vision pass ({e}) — falling back to full structural stripping");
            strip_text_from(pdf_path, 0).await
        }
    }
}

/// Run the vision OCR pass over page 1. `Ok(None)` means the generative call
/// failed or came back empty; `Err` means rendering itself failed.
async fn vision_first_page(
    pdf_path: &Path,
    config: &ProcessingConfig,
    gateway: &Gateway,
) -> Result<Option<String>, GazetteError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;

    let jpeg = tokio::task::spawn_blocking(move || render_first_page_blocking(&path, dpi, max_pixels))
        .await
        .map_err(|e| GazetteError::Internal(format!("Render task panicked: {e}")))??;

    let Some(jpeg) = jpeg else {
        warn!("PDF has 0 pages — nothing to OCR");
        return Ok(None);
    };

    let image = ImagePart {
        base64_data: STANDARD.encode(&jpeg),
        mime_type: "image/jpeg".to_string(),
    };

    let text = gateway.generate_vision(OCR_INSTRUCTION, image).await;
    Ok(text.filter(|t| !t.trim().is_empty()))
}

/// Render page 1 to JPEG bytes. `Ok(None)` for an empty document.
fn render_first_page_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
) -> Result<Option<Vec<u8>>, GazetteError> {
    let pdfium = Pdfium::default();
    let document = load_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Ok(None);
    }

    let page = pages.get(0).map_err(|e| GazetteError::Internal(format!(
        "Failed to open page 1: {e:?}"
    )))?;

    // DPI-derived target width, capped so a broadsheet page cannot exhaust
    // memory. PDF points are 1/72 inch.
    let target_width = ((page.width().value * dpi as f32) / 72.0) as u32;
    let target_width = target_width.clamp(1, max_pixels) as i32;

    let render_config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .set_maximum_height(max_pixels as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| GazetteError::Internal(format!("Rasterisation failed for page 1: {e:?}")))?;
    let image: DynamicImage = bitmap.as_image();

    debug!(
        "Rendered page 1 → {}x{} px at {} DPI target",
        image.width(),
        image.height(),
        dpi
    );

    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .map_err(|e| GazetteError::Internal(format!("JPEG encoding failed: {e}")))?;
    Ok(Some(buf))
}

/// Structural text stripping from `from_page` (0-based) to the end.
pub async fn strip_text_from(pdf_path: &Path, from_page: usize) -> Result<String, GazetteError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || strip_text_blocking(&path, from_page))
        .await
        .map_err(|e| GazetteError::Internal(format!("Strip task panicked: {e}")))?
}

fn strip_text_blocking(pdf_path: &Path, from_page: usize) -> Result<String, GazetteError> {
    let pdfium = Pdfium::default();
    let document = load_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    let total = pages.len() as usize;
    let mut out = String::new();

    for idx in from_page..total {
        let page = match pages.get(idx as u16) {
            Ok(p) => p,
            Err(e) => {
                warn!("Skipping page {} — cannot open: {e:?}", idx + 1);
                continue;
            }
        };
        let text = match page.text() {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping page {} — text extraction failed: {e:?}", idx + 1);
                continue;
            }
        };
        out.push_str(&text.all());
        out.push('\n');
    }

    debug!(
        "Structural stripping: pages {}..{} → {} chars",
        from_page + 1,
        total,
        out.len()
    );
    Ok(out)
}

/// Page count without any generative calls (CLI `inspect`).
pub async fn page_count(pdf_path: &Path) -> Result<usize, GazetteError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = Pdfium::default();
        let document = load_document(&pdfium, &path)?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| GazetteError::Internal(format!("Inspect task panicked: {e}")))?
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
) -> Result<PdfDocument<'a>, GazetteError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| GazetteError::UnreadablePdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{e:?}"),
        })
}
