//! Photo type and the capture collaborator seam.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("pixel buffer length mismatch: expected {expected}, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image encode failed: {0}")]
    Encode(String),
    #[error("capture failed: {0}")]
    Capture(String),
}

/// An in-memory grayscale photo.
#[derive(Clone)]
pub struct Photo {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Photo {
    /// Wrap raw grayscale pixels. The buffer must hold exactly
    /// `width * height` bytes.
    pub fn from_gray(data: Vec<u8>, width: u32, height: u32) -> Result<Self, PhotoError> {
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(PhotoError::InvalidDimensions {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Decode any supported image format (PNG, JPEG, ...) and convert to
    /// grayscale.
    pub fn from_encoded_bytes(bytes: &[u8]) -> Result<Self, PhotoError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| PhotoError::Decode(e.to_string()))?;
        let gray = decoded.to_luma8();
        let (width, height) = gray.dimensions();
        Ok(Self {
            data: gray.into_raw(),
            width,
            height,
        })
    }

    /// Encode as PNG for storage.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, PhotoError> {
        let img = image::GrayImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            PhotoError::InvalidDimensions {
                expected: (self.width as usize) * (self.height as usize),
                actual: self.data.len(),
            },
        )?;
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| PhotoError::Encode(e.to_string()))?;
        Ok(bytes)
    }
}

/// Source of photos, typically a camera or gallery picker.
///
/// The workflow never captures on its own; callers capture through a source
/// and submit the result, so capture cancellation stays in their hands.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn capture(&self) -> Result<Photo, PhotoError>;
}
