//! Inbound image normalization.
//!
//! Fingerprint images arrive either as raw bytes (multipart uploads) or as
//! base64 text, usually wrapped in a `data:image/...;base64,` URI by the
//! capture front-end. Everything downstream works on [`NormalizedImage`].

use ::image::ImageFormat;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{PipelineError, Result};

/// Media subtypes whose data-URI header is stripped before decoding.
const DATA_URI_SUBTYPES: &[&str] = &["png", "jpeg", "jpg"];

/// Scratch file extension used when the payload format can't be sniffed.
const FALLBACK_EXTENSION: &str = "png";

/// An image as it arrives at the pipeline boundary.
#[derive(Debug, Clone)]
pub enum ImagePayload {
    /// Raw image bytes.
    Binary(Vec<u8>),
    /// Base64 text, optionally prefixed with a data-URI header.
    Encoded(String),
}

impl ImagePayload {
    /// True when the payload carries nothing at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Binary(bytes) => bytes.is_empty(),
            Self::Encoded(text) => text.trim().is_empty(),
        }
    }
}

/// Decoded image bytes plus the container format, when recognizable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    bytes: Vec<u8>,
    format: Option<ImageFormat>,
}

impl NormalizedImage {
    fn new(bytes: Vec<u8>) -> Self {
        let format = ::image::guess_format(&bytes).ok();
        Self { bytes, format }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// File extension for staging this image on disk.
    pub fn extension(&self) -> &'static str {
        extension_of(self.format)
    }

    /// Canonical base64 text of the image, as fed to the engine's stdin.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

/// Decode an inbound payload into image bytes.
///
/// Encoded payloads lose a recognized data-URI header, then must be
/// canonical base64 (standard alphabet, correct padding, no whitespace).
pub fn normalize(payload: ImagePayload) -> Result<NormalizedImage> {
    let bytes = match payload {
        ImagePayload::Binary(bytes) => bytes,
        ImagePayload::Encoded(text) => {
            let encoded = strip_data_uri(&text);
            BASE64
                .decode(encoded)
                .map_err(|e| PipelineError::InvalidImageEncoding(e.to_string()))?
        }
    };

    if bytes.is_empty() {
        return Err(PipelineError::InvalidImageEncoding(
            "image payload is empty".into(),
        ));
    }

    Ok(NormalizedImage::new(bytes))
}

/// Scratch file extension for already-decoded image bytes.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    extension_of(::image::guess_format(bytes).ok())
}

fn extension_of(format: Option<ImageFormat>) -> &'static str {
    format
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Remove a leading `data:image/{png,jpeg,jpg};base64,` header if present.
///
/// Any other header is left alone and fails base64 validation later.
pub fn strip_data_uri(text: &str) -> &str {
    let Some(rest) = strip_prefix_ignore_case(text, "data:image/") else {
        return text;
    };
    let Some(sep) = rest.find(";base64,") else {
        return text;
    };

    let subtype = &rest[..sep];
    if DATA_URI_SUBTYPES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(subtype))
    {
        &rest[sep + ";base64,".len()..]
    } else {
        text
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_strips_known_prefixes() {
        let payload = b"fingerprint ridges";
        let encoded = BASE64.encode(payload);

        for subtype in ["png", "jpeg", "jpg", "PNG"] {
            let text = format!("data:image/{};base64,{}", subtype, encoded);
            let image = normalize(ImagePayload::Encoded(text)).unwrap();
            assert_eq!(image.bytes(), payload, "subtype {}", subtype);
        }
    }

    #[test]
    fn test_plain_base64_accepted() {
        let image = normalize(ImagePayload::Encoded(BASE64.encode(PNG_MAGIC))).unwrap();
        assert_eq!(image.bytes(), PNG_MAGIC);
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn test_unknown_prefix_rejected() {
        let text = format!("data:image/gif;base64,{}", BASE64.encode(b"abc"));
        let err = normalize(ImagePayload::Encoded(text)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidImageEncoding(_)));
    }

    #[test]
    fn test_bad_alphabet_and_padding_rejected() {
        for bad in ["abc$", "abcde", "ab=c", "YWJj\n", "YW Jj", "YQ", "YR=="] {
            let err = normalize(ImagePayload::Encoded(bad.to_string())).unwrap_err();
            assert!(
                matches!(err, PipelineError::InvalidImageEncoding(_)),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(normalize(ImagePayload::Encoded("data:image/png;base64,".into())).is_err());
        assert!(normalize(ImagePayload::Binary(Vec::new())).is_err());
    }

    #[test]
    fn test_binary_passthrough() {
        let image = normalize(ImagePayload::Binary(vec![1, 2, 3])).unwrap();
        assert_eq!(image.bytes(), &[1, 2, 3]);
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn test_payload_is_empty() {
        assert!(ImagePayload::Encoded("  ".into()).is_empty());
        assert!(ImagePayload::Binary(vec![]).is_empty());
        assert!(!ImagePayload::Encoded("YQ==".into()).is_empty());
    }
}
