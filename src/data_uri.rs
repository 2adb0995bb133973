//! Image payloads: data URIs, format detection and loading source images.

use crate::error::{GenerationError, Result};
use base64::Engine;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// MIME type used when none can be recovered from the input.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Image formats accepted as source images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects the format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

fn mime_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*/[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*$")
            .expect("mime pattern is valid")
    })
}

/// Returns `mime` lowercased if it looks like `type/subtype`, otherwise the
/// generic image type.
pub fn normalize_mime_type(mime: &str) -> String {
    let mime = mime.trim();
    if mime_pattern().is_match(mime) {
        mime.to_ascii_lowercase()
    } else {
        DEFAULT_MIME_TYPE.to_string()
    }
}

/// A `data:<mime>;base64,<data>` URI split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    /// Base64 payload, kept encoded.
    pub data: String,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encodes raw bytes.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self::new(
            normalize_mime_type(mime_type),
            base64::engine::general_purpose::STANDARD.encode(bytes),
        )
    }

    /// Splits a data URI. The payload is everything after the first comma;
    /// an unreadable media type falls back to [`DEFAULT_MIME_TYPE`].
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| GenerationError::Decode("not a data URI".into()))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| GenerationError::Decode("data URI has no payload".into()))?;

        let mime = header.split(';').next().unwrap_or_default();

        Ok(Self::new(normalize_mime_type(mime), data))
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|e| GenerationError::Decode(e.to_string()))
    }

    /// Approximate decoded size without decoding.
    pub fn decoded_len(&self) -> usize {
        let data = self.data.trim_end_matches('=');
        data.len() * 3 / 4
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

/// An image picked by the user, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub data_uri: String,
    pub file_name: String,
    pub byte_len: usize,
}

/// Reads an image file entirely into memory as a data URI.
///
/// Only the extensions offered by the file picker (jpg, jpeg, png, webp) are
/// accepted; the content itself is not validated beyond picking a MIME type.
pub async fn read_image_file(path: &Path) -> Result<SourceImage> {
    let ext_format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .ok_or_else(|| {
            GenerationError::InvalidRequest(format!(
                "{} is not a JPG, PNG or WebP image",
                path.display()
            ))
        })?;

    let bytes = tokio::fs::read(path).await?;
    let format = ImageFormat::from_magic_bytes(&bytes).unwrap_or(ext_format);

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(SourceImage {
        data_uri: DataUri::from_bytes(format.mime_type(), &bytes).to_string(),
        file_name,
        byte_len: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(ImageFormat::from_magic_bytes(&PNG_MAGIC), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_magic_bytes(&JPEG_MAGIC), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_magic_bytes(&WEBP_MAGIC), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a"), None);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("gif"), None);
    }

    #[test]
    fn test_parse_data_uri() {
        let uri = DataUri::parse("data:image/jpeg;base64,AAA").unwrap();
        assert_eq!(uri.mime_type, "image/jpeg");
        assert_eq!(uri.data, "AAA");
        assert_eq!(uri.to_string(), "data:image/jpeg;base64,AAA");
    }

    #[test]
    fn test_parse_defaults_malformed_mime() {
        let uri = DataUri::parse("data:;base64,AAA").unwrap();
        assert_eq!(uri.mime_type, DEFAULT_MIME_TYPE);

        let uri = DataUri::parse("data:garbage;base64,AAA").unwrap();
        assert_eq!(uri.mime_type, DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_parse_rejects_non_data_uri() {
        assert!(DataUri::parse("https://example.com/a.png").is_err());
        assert!(DataUri::parse("data:image/png;base64").is_err());
    }

    #[test]
    fn test_from_bytes_and_decode() {
        let uri = DataUri::from_bytes("image/png", b"hello");
        assert_eq!(uri.to_string(), "data:image/png;base64,aGVsbG8=");
        assert_eq!(uri.decode().unwrap(), b"hello");
        assert_eq!(uri.decoded_len(), 5);
    }

    #[test]
    fn test_normalize_mime_type() {
        assert_eq!(normalize_mime_type(" IMAGE/WebP "), "image/webp");
        assert_eq!(normalize_mime_type("image"), DEFAULT_MIME_TYPE);
        assert_eq!(normalize_mime_type(""), DEFAULT_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_read_image_file_detects_content_type() {
        let dir = tempfile::tempdir().unwrap();
        // JPEG bytes behind a .png name: the content wins.
        let path = dir.path().join("chair.png");
        std::fs::File::create(&path).unwrap().write_all(&JPEG_MAGIC).unwrap();

        let image = read_image_file(&path).await.unwrap();
        assert_eq!(image.file_name, "chair.png");
        assert_eq!(image.byte_len, 12);
        assert!(image.data_uri.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_read_image_file_rejects_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"text").unwrap();

        let err = read_image_file(&path).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRequest(_)));
    }
}
