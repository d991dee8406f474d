//! Still-image capture from a live video frame, plus light inspection of uploaded files.
//!
//! The shell hands over raw RGBA pixels it read off the stream; everything from validation
//! to JPEG encoding happens here so every platform produces the same buffer.

use std::fmt;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::camera_session::CameraSession;
use crate::capabilities::{RawFrame, StreamId};
use crate::config::CaptureConfig;

pub const CAPTURE_FILE_NAME: &str = "camera-capture.jpg";

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureError {
    #[error("video frame not ready ({width}x{height})")]
    NotReady { width: u32, height: u32 },

    #[error("malformed frame: {width}x{height} needs {expected} bytes, got {actual}")]
    MalformedFrame {
        width: u32,
        height: u32,
        expected: u64,
        actual: usize,
    },

    #[error("frame too large: {width}x{height}, max dimension {max}")]
    FrameTooLarge { width: u32, height: u32, max: u32 },

    #[error("frame belongs to stream {stream}, which is no longer live")]
    StaleStream { stream: StreamId },

    #[error("jpeg encoding failed: {reason}")]
    Encode { reason: String },
}

impl CaptureError {
    pub fn is_not_ready(&self) -> bool {
        matches!(self, CaptureError::NotReady { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
        }
    }

    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }

        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(ImageFormat::Png);
        }

        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(ImageFormat::Gif);
        }

        None
    }
}

/// Whether a MIME type names an image, e.g. `image/png` or `image/svg+xml`.
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .trim()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    Camera,
    Upload { file_name: String },
}

/// An encoded still image owned by the flow until it is submitted or discarded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedImage {
    source: ImageSource,
    mime_type: String,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

impl CapturedImage {
    /// Uploads are taken as-is. Dimensions are probed when the bytes are decodable and
    /// left unknown otherwise.
    pub fn from_upload(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        let dimensions = probe_dimensions(&data);
        Self {
            source: ImageSource::Upload {
                file_name: file_name.into(),
            },
            mime_type: mime_type.into(),
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            data,
        }
    }

    fn from_capture(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            source: ImageSource::Camera,
            mime_type: ImageFormat::Jpeg.mime_type().to_string(),
            width: Some(width),
            height: Some(height),
            data,
        }
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn file_name(&self) -> &str {
        match &self.source {
            ImageSource::Camera => CAPTURE_FILE_NAME,
            ImageSource::Upload { file_name } => file_name,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Redact debug output: image bytes are user content and large.
impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("source", &self.source)
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

/// Turn the current frame of `session` into a JPEG still of the same dimensions.
pub fn capture_frame(
    session: &CameraSession,
    frame: RawFrame,
    config: &CaptureConfig,
) -> Result<CapturedImage, CaptureError> {
    if frame.stream != session.stream {
        return Err(CaptureError::StaleStream {
            stream: frame.stream,
        });
    }

    let (width, height) = (frame.width, frame.height);
    if width == 0 || height == 0 {
        return Err(CaptureError::NotReady { width, height });
    }

    if width > config.max_frame_dimension || height > config.max_frame_dimension {
        return Err(CaptureError::FrameTooLarge {
            width,
            height,
            max: config.max_frame_dimension,
        });
    }

    let expected = u64::from(width) * u64::from(height) * 4;
    if frame.rgba.len() as u64 != expected {
        return Err(CaptureError::MalformedFrame {
            width,
            height,
            expected,
            actual: frame.rgba.len(),
        });
    }

    let data = encode_jpeg(frame.rgba, width, height, config.jpeg_quality)?;
    debug!(width, height, size_bytes = data.len(), "frame captured");
    Ok(CapturedImage::from_capture(data, width, height))
}

#[instrument(skip(rgba), fields(input_size = rgba.len()))]
fn encode_jpeg(
    rgba: Vec<u8>,
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, CaptureError> {
    let actual = rgba.len();
    let pixels = RgbaImage::from_raw(width, height, rgba).ok_or(CaptureError::MalformedFrame {
        width,
        height,
        expected: u64::from(width) * u64::from(height) * 4,
        actual,
    })?;

    // JPEG has no alpha channel; the video frame is opaque anyway.
    let rgb = DynamicImage::ImageRgba8(pixels).to_rgb8();

    let mut buffer = Vec::with_capacity(rgb.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| CaptureError::Encode {
            reason: e.to_string(),
        })?;

    if ImageFormat::from_magic_bytes(&buffer) != Some(ImageFormat::Jpeg) {
        return Err(CaptureError::Encode {
            reason: "invalid jpeg magic bytes".into(),
        });
    }

    Ok(buffer)
}

fn probe_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CameraFacing;
    use image::GenericImageView;

    fn session(stream: &str) -> CameraSession {
        CameraSession {
            stream: StreamId::new(stream),
            facing: CameraFacing::Back,
            width: 64,
            height: 48,
        }
    }

    fn frame(stream: &str, width: u32, height: u32) -> RawFrame {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 128, 255]);
            }
        }
        RawFrame {
            stream: StreamId::new(stream),
            width,
            height,
            rgba,
        }
    }

    fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 200, 30, 255]));
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
            .unwrap();
        buffer
    }

    #[test]
    fn capture_produces_jpeg_with_frame_dimensions() {
        let config = CaptureConfig::default();
        let image = capture_frame(&session("s1"), frame("s1", 64, 48), &config).unwrap();

        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.source(), &ImageSource::Camera);
        assert_eq!((image.width(), image.height()), (Some(64), Some(48)));
        assert_eq!(ImageFormat::from_magic_bytes(image.data()), Some(ImageFormat::Jpeg));

        let decoded = image::load_from_memory(image.data()).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[test]
    fn capture_rejects_zero_dimensions_as_not_ready() {
        let config = CaptureConfig::default();
        let empty = RawFrame {
            stream: StreamId::new("s1"),
            width: 0,
            height: 0,
            rgba: Vec::new(),
        };
        let err = capture_frame(&session("s1"), empty, &config).unwrap_err();
        assert!(err.is_not_ready());

        let half = RawFrame {
            stream: StreamId::new("s1"),
            width: 640,
            height: 0,
            rgba: Vec::new(),
        };
        assert!(capture_frame(&session("s1"), half, &config)
            .unwrap_err()
            .is_not_ready());
    }

    #[test]
    fn capture_rejects_frame_from_other_stream() {
        let config = CaptureConfig::default();
        let err = capture_frame(&session("s1"), frame("s0", 8, 8), &config).unwrap_err();
        assert!(matches!(err, CaptureError::StaleStream { .. }));
    }

    #[test]
    fn capture_rejects_short_buffer() {
        let config = CaptureConfig::default();
        let mut bad = frame("s1", 8, 8);
        bad.rgba.truncate(10);
        let err = capture_frame(&session("s1"), bad, &config).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::MalformedFrame {
                expected: 256,
                actual: 10,
                ..
            }
        ));
    }

    #[test]
    fn capture_rejects_oversized_frame() {
        let config = CaptureConfig::default().with_max_frame_dimension(16);
        let err = capture_frame(&session("s1"), frame("s1", 32, 8), &config).unwrap_err();
        assert!(matches!(err, CaptureError::FrameTooLarge { max: 16, .. }));
    }

    #[test]
    fn upload_probes_png_dimensions() {
        let png = create_test_png(30, 20);
        let image = CapturedImage::from_upload("bug.png", "image/png", png);
        assert_eq!((image.width(), image.height()), (Some(30), Some(20)));
        assert_eq!(image.file_name(), "bug.png");
    }

    #[test]
    fn upload_accepts_undecodable_bytes() {
        let image = CapturedImage::from_upload("bug.heic", "image/heic", vec![1, 2, 3]);
        assert_eq!(image.width(), None);
        assert_eq!(image.len(), 3);
    }

    #[test]
    fn image_mime_detection() {
        assert!(is_image_mime("image/png"));
        assert!(is_image_mime("IMAGE/JPEG"));
        assert!(is_image_mime("image/svg+xml"));
        assert!(!is_image_mime("text/plain"));
        assert!(!is_image_mime("img"));
        assert!(!is_image_mime(""));
    }

    #[test]
    fn magic_bytes_detection() {
        let png = create_test_png(2, 2);
        assert_eq!(ImageFormat::from_magic_bytes(&png), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::from_magic_bytes(b"GIF89a\x01\x00\x01\x00\x00\x00"),
            Some(ImageFormat::Gif)
        );
        assert_eq!(ImageFormat::from_magic_bytes(&[0xFF, 0xD8]), None);
        assert_eq!(ImageFormat::from_magic_bytes(&[0u8; 16]), None);
    }

    #[test]
    fn captured_image_debug_is_redacted() {
        let image = CapturedImage::from_upload("a.png", "image/png", vec![42; 100]);
        let rendered = format!("{image:?}");
        assert!(rendered.contains("size_bytes: 100"));
        assert!(!rendered.contains("42, 42"));
    }
}
