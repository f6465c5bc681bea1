//! Image encoding for recognizers that take files or API payloads.
//!
//! PNG is used everywhere: it is lossless, so rendered glyph edges reach the
//! recognizer unchanged.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a page image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a page as a base64 PNG attachment for a vision LLM.
///
/// `detail: "high"` asks GPT-4-class models for the full tile budget so
/// small print stays legible.
pub fn encode_for_vision(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let png = encode_png(img)?;
    let b64 = STANDARD.encode(&png);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
