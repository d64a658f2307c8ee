//! Decoded bitmaps and image decoding.
//!
//! Supports decoding raw encoded bytes, base64 or percent-encoded data URIs,
//! and wrapping raw RGBA/BGRA pixel buffers.

use surface_core::{Color, Size};
use tiny_skia::{ColorU8, Pixmap};

use crate::error::{RenderError, RenderResult};

/// Encoded container format detected for a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// GIF (first frame only).
    Gif,
    /// Raw pixels or an unknown container.
    Unknown,
}

impl ImageFormat {
    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        // GIF87a / GIF89a
        if data.starts_with(b"GIF8") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        Self::Unknown
    }
}

/// Channel order of a raw pixel buffer. Alpha is straight (not premultiplied).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// Red, green, blue, alpha.
    #[default]
    Rgba8,
    /// Blue, green, red, alpha.
    Bgra8,
}

/// A decoded image held as premultiplied RGBA, ready to blit.
#[derive(Clone, PartialEq)]
pub struct Bitmap {
    pixmap: Pixmap,
    format: ImageFormat,
}

impl Bitmap {
    /// Wrap an already rasterized pixmap.
    #[must_use]
    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self {
            pixmap,
            format: ImageFormat::Unknown,
        }
    }

    /// Build a bitmap from a raw, tightly packed pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidPixelData`] if `bytes` is not exactly
    /// `width * height * 4` long, or [`RenderError::Decode`] for a zero
    /// dimension.
    pub fn from_pixels(
        bytes: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> RenderResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if bytes.len() != expected {
            return Err(RenderError::InvalidPixelData {
                expected,
                actual: bytes.len(),
            });
        }

        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            RenderError::Decode(format!("Cannot allocate a {width}x{height} bitmap"))
        })?;

        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(bytes.chunks_exact(4)) {
            let color = match format {
                PixelFormat::Rgba8 => ColorU8::from_rgba(src[0], src[1], src[2], src[3]),
                PixelFormat::Bgra8 => ColorU8::from_rgba(src[2], src[1], src[0], src[3]),
            };
            *dst = color.premultiply();
        }

        Ok(Self {
            pixmap,
            format: ImageFormat::Unknown,
        })
    }

    /// Create a bitmap filled with one color.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Decode`] for a zero dimension.
    pub fn solid(width: u32, height: u32, color: Color) -> RenderResult<Self> {
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            RenderError::Decode(format!("Cannot allocate a {width}x{height} bitmap"))
        })?;
        pixmap.fill(tiny_skia::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        Ok(Self::from_pixmap(pixmap))
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Natural size of the image.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Container format the bitmap was decoded from.
    #[must_use]
    pub fn source_format(&self) -> ImageFormat {
        self.format
    }

    /// The premultiplied pixel storage.
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Straight-alpha color at a pixel.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            Color::rgba(c.red(), c.green(), c.blue(), c.alpha())
        })
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format)
            .finish()
    }
}

/// Decode an encoded image (PNG, JPEG, ...) into a bitmap.
///
/// # Errors
///
/// Returns [`RenderError::Decode`] if the image cannot be decoded.
pub fn decode_image(data: &[u8]) -> RenderResult<Bitmap> {
    let format = ImageFormat::from_magic_bytes(data);

    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::Decode(format!("{e} ({format:?})")))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut bitmap = Bitmap::from_pixels(rgba.as_raw(), width, height, PixelFormat::Rgba8)?;
    bitmap.format = format;
    tracing::debug!("Decoded {:?} image {}x{}", format, width, height);
    Ok(bitmap)
}

/// Extract the payload bytes of a data URI.
///
/// Supports formats like: `data:image/png;base64,iVBORw0KGgo...`
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the data URI is malformed.
pub fn data_uri_bytes(uri: &str) -> RenderResult<Vec<u8>> {
    let uri_data = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Resource("Not a data URI".to_string()))?;

    // Find the comma separating metadata from data
    let comma_pos = uri_data
        .find(',')
        .ok_or_else(|| RenderError::Resource("Invalid data URI: missing comma".to_string()))?;

    let metadata = &uri_data[..comma_pos];
    let encoded_data = &uri_data[comma_pos + 1..];

    if metadata.contains(";base64") {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(encoded_data.trim())
            .map_err(|e| RenderError::Resource(format!("Failed to decode base64: {e}")))
    } else {
        percent_decode(encoded_data)
    }
}

/// Decode an image embedded in a data URI.
///
/// # Errors
///
/// Returns an error if the data URI is malformed or the image cannot be decoded.
pub fn decode_data_uri(uri: &str) -> RenderResult<Bitmap> {
    decode_image(&data_uri_bytes(uri)?)
}

/// Percent-decoding for non-base64 data URIs.
fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = bytes
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::Resource("Invalid URL encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }

    Ok(result)
}
