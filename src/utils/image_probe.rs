use std::io::Cursor;

use image::ImageReader;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageInfo {
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Best-effort format and dimensions, read from the header only.
///
/// Formats the decoder does not know (HEIC, AVIF) fall back to the MIME subtype.
pub fn probe(data: &[u8], content_type: &str) -> ImageInfo {
    let fallback_format = content_type
        .split_once('/')
        .map(|(_, subtype)| match subtype {
            "jpg" => "jpeg".to_string(),
            other => other.to_string(),
        });

    let reader = match ImageReader::new(Cursor::new(data)).with_guessed_format() {
        Ok(reader) => reader,
        Err(e) => {
            debug!("Could not guess image format: {e}");
            return ImageInfo {
                format: fallback_format,
                ..ImageInfo::default()
            };
        }
    };

    let format = reader
        .format()
        .and_then(|format| format.extensions_str().first())
        .map(|ext| match *ext {
            "jpg" => "jpeg".to_string(),
            other => other.to_string(),
        })
        .or(fallback_format);

    match reader.into_dimensions() {
        Ok((width, height)) => ImageInfo {
            format,
            width: Some(width),
            height: Some(height),
        },
        Err(e) => {
            debug!("Could not read image dimensions: {e}");
            ImageInfo {
                format,
                ..ImageInfo::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG.
    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_probe_png_header() {
        let info = probe(PNG_1X1, "image/png");
        assert_eq!(info.format.as_deref(), Some("png"));
        assert_eq!((info.width, info.height), (Some(1), Some(1)));
    }

    #[test]
    fn test_probe_unknown_bytes_falls_back_to_mime() {
        let info = probe(b"not an image", "image/heic");
        assert_eq!(info.format.as_deref(), Some("heic"));
        assert_eq!(info.width, None);
    }
}
