use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::debug;

use crate::error::AnalysisError;

/// Compression quality used for stills submitted to the vision model.
pub const JPEG_QUALITY: u8 = 90;

/// Encodes an RGB frame as JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, AnalysisError> {
    let mut encoded = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut encoded, quality);
    encoder
        .encode_image(image)
        .map_err(|e| AnalysisError::Encode(e.to_string()))?;
    debug!(
        "JPEG encoded {}x{} frame to {} bytes (quality {})",
        image.width(),
        image.height(),
        encoded.len(),
        quality
    );
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_to_jpeg_magic_bytes() {
        let image = RgbImage::from_pixel(64, 48, image::Rgb([120, 90, 60]));
        let bytes = encode_jpeg(&image, JPEG_QUALITY).expect("encode should succeed");
        assert!(bytes.len() > 2);
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
