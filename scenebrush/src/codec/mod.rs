//! Image codec adapter: PNG bytes and base64 payloads.
//!
//! The pipeline ships reference images as base64-encoded PNG and receives
//! generated images as base64 inline data of whatever format the provider
//! chose. This module covers both directions:
//!
//! - [`PixelSource`] is the seam through which images enter. Sources that
//!   are not directly byte-addressable (GPU-resident captures, swizzled
//!   buffers) produce a readable RGBA copy in [`PixelSource::to_rgba`];
//!   plain CPU buffers hand back their pixels as-is.
//! - [`encode_png`] / [`png_base64`] produce the outbound payload.
//! - [`decode_image`] / [`decode_base64_image`] decode inbound payloads,
//!   rejecting malformed input with a definite error rather than a
//!   partial image. Callers treat a part-level decode failure as "skip
//!   this part", not as fatal.

mod error;

pub use error::CodecError;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use std::io::Cursor;

/// An image the pipeline can read pixels from.
///
/// `to_rgba` must return a readable RGBA8 buffer of exactly
/// `width() × height()` pixels, copying out of non-addressable storage
/// when necessary.
pub trait PixelSource {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Produces a readable RGBA copy of the image.
    fn to_rgba(&self) -> Result<RgbaImage, CodecError>;
}

impl PixelSource for RgbaImage {
    fn width(&self) -> u32 {
        RgbaImage::width(self)
    }

    fn height(&self) -> u32 {
        RgbaImage::height(self)
    }

    fn to_rgba(&self) -> Result<RgbaImage, CodecError> {
        Ok(self.clone())
    }
}

impl PixelSource for DynamicImage {
    fn width(&self) -> u32 {
        GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        GenericImageView::height(self)
    }

    fn to_rgba(&self) -> Result<RgbaImage, CodecError> {
        Ok(self.to_rgba8())
    }
}

/// Encodes an RGBA buffer to a PNG byte stream.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CodecError> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
    Ok(out.into_inner())
}

/// Forces a readable copy of `source`, PNG-encodes it and returns the
/// base64 string used for inline request data.
pub fn png_base64(source: &dyn PixelSource) -> Result<String, CodecError> {
    let rgba = source.to_rgba()?;
    let png = encode_png(&rgba)?;
    Ok(BASE64.encode(png))
}

/// Decodes an image byte stream into an RGBA buffer.
///
/// The format is sniffed from the bytes (the provider may return PNG,
/// JPEG or WebP). Malformed input yields an error, never a partial image.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, CodecError> {
    image::load_from_memory(bytes)
        .map(|decoded| decoded.to_rgba8())
        .map_err(|e| CodecError::DecodeFailed(e.to_string()))
}

/// Decodes a base64-encoded image payload into an RGBA buffer.
pub fn decode_base64_image(data: &str) -> Result<RgbaImage, CodecError> {
    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
    decode_image(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 128])
            }
        })
    }

    #[test]
    fn test_png_round_trip_preserves_pixels() {
        let original = checker(16, 9);
        let png = encode_png(&original).unwrap();
        let decoded = decode_image(&png).unwrap();

        assert_eq!(decoded.dimensions(), (16, 9));
        assert_eq!(decoded.as_raw(), original.as_raw());
    }

    #[test]
    fn test_base64_round_trip() {
        let original = checker(8, 8);
        let payload = png_base64(&original).unwrap();
        let decoded = decode_base64_image(&payload).unwrap();

        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(decoded.as_raw(), original.as_raw());
    }

    #[test]
    fn test_decode_rejects_garbage_bytes() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(CodecError::DecodeFailed(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let mut png = encode_png(&checker(8, 8)).unwrap();
        png.truncate(20);
        assert!(matches!(decode_image(&png), Err(CodecError::DecodeFailed(_))));
    }

    #[test]
    fn test_decode_base64_rejects_invalid_base64() {
        let result = decode_base64_image("!!!not-base64!!!");
        assert!(matches!(result, Err(CodecError::InvalidBase64(_))));
    }

    #[test]
    fn test_decode_base64_rejects_non_image_payload() {
        let payload = BASE64.encode(b"plain text payload");
        let result = decode_base64_image(&payload);
        assert!(matches!(result, Err(CodecError::DecodeFailed(_))));
    }

    #[test]
    fn test_decode_base64_tolerates_surrounding_whitespace() {
        let payload = format!("  {}\n", png_base64(&checker(4, 4)).unwrap());
        assert!(decode_base64_image(&payload).is_ok());
    }

    #[test]
    fn test_dynamic_image_source_reports_dimensions() {
        let dynamic = DynamicImage::ImageRgba8(checker(12, 6));
        assert_eq!(PixelSource::width(&dynamic), 12);
        assert_eq!(PixelSource::height(&dynamic), 6);
        assert_eq!(dynamic.to_rgba().unwrap().dimensions(), (12, 6));
    }
}
