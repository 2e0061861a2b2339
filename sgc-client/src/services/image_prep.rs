//! Capture resize and upload encoding
//!
//! Two steps, run at different times:
//! - [`prepare_capture`] when a photo is taken: resize to the slot width and
//!   store a JPEG in the captures directory.
//! - [`encode_for_upload`] just before the analyze call: re-encode the stored
//!   file and base64 it. The encoded form is never persisted.
//!
//! Both are blocking (decode/encode); callers run them on the blocking pool.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use sgc_common::events::CaptureSlot;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// JPEG quality for stored captures and uploads
pub const JPEG_QUALITY: u8 = 70;

/// Image preparation errors
#[derive(Debug, Error)]
pub enum ImagePrepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

/// Target width for a slot; skin close-ups are smaller
pub fn target_width(slot: CaptureSlot) -> u32 {
    match slot {
        CaptureSlot::Face | CaptureSlot::Body => 800,
        CaptureSlot::Skin => 600,
    }
}

fn load(path: &Path) -> Result<DynamicImage, ImagePrepError> {
    let bytes = std::fs::read(path)?;
    image::load_from_memory(&bytes).map_err(|e| ImagePrepError::Decode(e.to_string()))
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, ImagePrepError> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| ImagePrepError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Resize `source` to `width` (aspect ratio kept) and write a JPEG to `dest`
pub fn prepare_capture(source: &Path, dest: &Path, width: u32) -> Result<(), ImagePrepError> {
    let img = load(source)?;
    let resized = img.resize(width, width.saturating_mul(10), FilterType::Lanczos3);

    tracing::debug!(
        source = %source.display(),
        original_width = img.width(),
        width = resized.width(),
        height = resized.height(),
        "Resized capture"
    );

    let bytes = encode_jpeg(&resized)?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, bytes)?;
    Ok(())
}

/// Re-encode a stored capture and return it as standard base64
pub fn encode_for_upload(path: &Path) -> Result<String, ImagePrepError> {
    let img = load(path)?;
    let bytes = encode_jpeg(&img)?;
    Ok(BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 120, 80, 255]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_prepare_capture_resizes_to_width() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("face.png");
        let dest = dir.path().join("captures").join("face.jpg");
        write_png(&src, 1600, 1200);

        prepare_capture(&src, &dest, target_width(CaptureSlot::Face)).unwrap();

        let out = image::open(&dest).unwrap();
        assert_eq!(out.width(), 800);
        assert_eq!(out.height(), 600);
    }

    #[test]
    fn test_encode_for_upload_is_base64_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("skin.png");
        write_png(&src, 64, 64);

        let encoded = encode_for_upload(&src).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_unreadable_input() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.jpg");
        std::fs::write(&src, b"not an image").unwrap();

        assert!(matches!(encode_for_upload(&src), Err(ImagePrepError::Decode(_))));
        assert!(matches!(
            encode_for_upload(&dir.path().join("missing.jpg")),
            Err(ImagePrepError::Io(_))
        ));
    }
}
