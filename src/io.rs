use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{CanvasError, Result};
use crate::ops::canvas_ops::MAX_CANVAS_DIM;

/// JPEG quality used for exports that don't specify one.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

// ============================================================================
// EXPORT FORMATS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
    Bmp,
    /// Raw pixel dump (`.rpx`).
    Rpx,
}

impl ExportFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "bmp" => Some(ExportFormat::Bmp),
            "rpx" => Some(ExportFormat::Rpx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }

    /// Encoded formats addressable by mime type. `.rpx` has none.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ExportFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ExportFormat::Jpeg),
            "image/bmp" => Some(ExportFormat::Bmp),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Bmp => "image/bmp",
            ExportFormat::Rpx => "application/octet-stream",
        }
    }
}

/// Encode `image` into an in-memory file of the given format.
pub fn encode(image: &RgbaImage, format: ExportFormat, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut buf).write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)?;
        }
        ExportFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ColorType::Rgb8,
            )?;
        }
        ExportFormat::Bmp => {
            BmpEncoder::new(&mut buf).encode(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)?;
        }
        ExportFormat::Rpx => {
            bincode::serialize_into(&mut buf, &RawImageFile::from_image(image))?;
        }
    }
    Ok(buf.into_inner())
}

/// `data:<mime>;base64,<…>` for `image/png`, `image/jpeg` or `image/bmp`.
pub fn to_data_url(image: &RgbaImage, mime: &str) -> Result<String> {
    let format = ExportFormat::from_mime(mime).ok_or_else(|| CanvasError::UnsupportedMime(mime.to_string()))?;
    let bytes = encode(image, format, DEFAULT_JPEG_QUALITY)?;
    tracing::debug!("data url: {} bytes of {}", bytes.len(), format.mime());
    Ok(format!("data:{};base64,{}", format.mime(), BASE64.encode(bytes)))
}

/// Write `image` to `path`, picking the format from the extension.
pub fn save_image(image: &RgbaImage, path: &Path) -> Result<()> {
    let format = ExportFormat::from_path(path).ok_or_else(|| {
        CanvasError::InvalidFormat(format!("no export format for '{}'", path.display()))
    })?;
    let bytes = encode(image, format, DEFAULT_JPEG_QUALITY)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    tracing::info!("exported {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}

/// Decode any raster the `image` crate reads, or a `.rpx` dump, into RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    if ExportFormat::from_path(path) == Some(ExportFormat::Rpx) {
        return load_rpx(path);
    }
    let img = image::open(path)?.to_rgba8();
    tracing::info!("loaded {}x{} image from {}", img.width(), img.height(), path.display());
    Ok(img)
}

// ============================================================================
// RPX RAW PIXEL FILE
// ============================================================================

/// Magic header for the raw pixel dump
const RPX_MAGIC_V1: &str = "RPX1";

#[derive(Serialize, Deserialize)]
struct RawImageFile {
    magic: String,
    width: u32,
    height: u32,
    /// Straight-alpha RGBA8, row-major.
    pixels: Vec<u8>,
}

impl RawImageFile {
    fn from_image(image: &RgbaImage) -> Self {
        Self {
            magic: RPX_MAGIC_V1.to_string(),
            width: image.width(),
            height: image.height(),
            pixels: image.as_raw().clone(),
        }
    }
}

pub fn save_rpx(image: &RgbaImage, path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &RawImageFile::from_image(image))?;
    Ok(())
}

pub fn load_rpx(path: &Path) -> Result<RgbaImage> {
    let raw = std::fs::read(path)?;
    decode_rpx(&raw)
}

/// Parse an in-memory `.rpx` file.
pub fn decode_rpx(raw: &[u8]) -> Result<RgbaImage> {
    if raw.len() < 12 {
        return Err(CanvasError::InvalidFormat("File too small".into()));
    }
    // bincode encodes a String as an 8-byte length prefix + UTF-8 data, so
    // bytes 8..12 hold the magic.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != RPX_MAGIC_V1 {
        return Err(CanvasError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }

    let file: RawImageFile = bincode::deserialize(raw)?;
    if file.width > MAX_CANVAS_DIM || file.height > MAX_CANVAS_DIM {
        return Err(CanvasError::InvalidFormat(format!(
            "Canvas size {}x{} exceeds maximum allowed {}x{}",
            file.width, file.height, MAX_CANVAS_DIM, MAX_CANVAS_DIM
        )));
    }
    let expected = file.width as usize * file.height as usize * 4;
    if file.pixels.len() != expected {
        return Err(CanvasError::InvalidFormat(format!(
            "Pixel data has {} bytes, expected {}",
            file.pixels.len(),
            expected
        )));
    }
    RgbaImage::from_raw(file.width, file.height, file.pixels)
        .ok_or_else(|| CanvasError::InvalidFormat("Failed to reconstruct image".into()))
}
