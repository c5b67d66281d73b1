//! JPEG encoding of raw frames

use crate::frame::RawFrame;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use roomcast_core::RoomcastError;

/// Clamp a requested quality into the valid JPEG range [1, 100]
pub fn clamp_quality(quality: i32) -> u8 {
    quality.clamp(1, 100) as u8
}

/// Compress an RGB24 frame into a JPEG payload at the given quality
pub fn encode_jpeg(frame: &RawFrame, quality: u8) -> Result<Vec<u8>, RoomcastError> {
    let expected = frame.width as usize * frame.height as usize * 3;
    if frame.data.len() != expected {
        return Err(RoomcastError::EncodingFailed {
            reason: format!(
                "frame data is {} bytes, expected {} for {}x{} RGB24",
                frame.data.len(),
                expected,
                frame.width,
                frame.height
            ),
        });
    }

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality)
        .encode(
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| RoomcastError::EncodingFailed {
            reason: e.to_string(),
        })?;
    Ok(encoded)
}
