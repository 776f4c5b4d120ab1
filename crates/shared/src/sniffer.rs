//! Image media type classification from the declared `Content-Type` header.
//!
//! The header is the only authority. URL suffixes are ignored and the body is
//! never inspected for magic numbers.

use std::fmt;
use std::str::FromStr;

use crate::error::ImageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageMediaType {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageMediaType {
    pub const ALL: [ImageMediaType; 4] = [
        ImageMediaType::Jpeg,
        ImageMediaType::Png,
        ImageMediaType::Gif,
        ImageMediaType::Webp,
    ];

    pub fn mime(&self) -> &'static str {
        match self {
            ImageMediaType::Jpeg => "image/jpeg",
            ImageMediaType::Png => "image/png",
            ImageMediaType::Gif => "image/gif",
            ImageMediaType::Webp => "image/webp",
        }
    }

    /// Map a MIME essence (no parameters, lowercase) to a media type.
    pub fn from_mime(essence: &str) -> Option<Self> {
        match essence {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageMediaType::Jpeg),
            "image/png" => Some(ImageMediaType::Png),
            "image/gif" => Some(ImageMediaType::Gif),
            "image/webp" => Some(ImageMediaType::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for ImageMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Accepts short names (`png`, `jpg`) or full MIME types (`image/png`).
impl FromStr for ImageMediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let essence = if lower.contains('/') {
            lower
        } else {
            format!("image/{}", lower)
        };
        Self::from_mime(&essence).ok_or_else(|| format!("unsupported image type '{}'", s.trim()))
    }
}

/// Strip parameters and normalize case: `Image/PNG; charset=x` -> `image/png`.
fn mime_essence(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Classify a declared content type against an allow-list, before any body is read.
pub fn classify_header(
    declared: Option<&str>,
    allowed: &[ImageMediaType],
) -> Result<ImageMediaType, ImageError> {
    let declared = declared
        .ok_or_else(|| ImageError::UnsupportedType("no content-type header".to_string()))?;
    let essence = mime_essence(declared);

    ImageMediaType::from_mime(&essence)
        .filter(|media_type| allowed.contains(media_type))
        .ok_or(ImageError::UnsupportedType(essence))
}

/// Classify a downloaded body by its declared content type against an allow-list.
pub fn sniff(
    declared: Option<&str>,
    body: &[u8],
    allowed: &[ImageMediaType],
) -> Result<ImageMediaType, ImageError> {
    let media_type = classify_header(declared, allowed)?;

    if body.is_empty() {
        return Err(ImageError::UnsupportedType(format!("{} with empty body", media_type)));
    }

    Ok(media_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn test_header_with_parameters() {
        let result = sniff(Some("Image/PNG; charset=binary"), b"data", &ImageMediaType::ALL);
        assert_eq!(result, Ok(ImageMediaType::Png));
    }

    #[test]
    fn test_header_wins_over_body_signature() {
        // PNG bytes declared as JPEG are classified as JPEG
        let result = sniff(Some("image/jpeg"), PNG_MAGIC, &ImageMediaType::ALL);
        assert_eq!(result, Ok(ImageMediaType::Jpeg));
    }

    #[test]
    fn test_non_image_header_rejected_even_with_image_bytes() {
        let result = sniff(Some("text/html"), PNG_MAGIC, &ImageMediaType::ALL);
        assert_eq!(
            result,
            Err(ImageError::UnsupportedType("text/html".to_string()))
        );
    }

    #[test]
    fn test_missing_header_rejected() {
        assert!(matches!(
            sniff(None, PNG_MAGIC, &ImageMediaType::ALL),
            Err(ImageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_allow_list_is_enforced() {
        let result = sniff(Some("image/webp"), b"RIFF", &[ImageMediaType::Png]);
        assert!(matches!(result, Err(ImageError::UnsupportedType(_))));
    }

    #[test]
    fn test_unlisted_image_type_rejected() {
        let result = sniff(Some("image/svg+xml"), b"<svg/>", &ImageMediaType::ALL);
        assert!(matches!(result, Err(ImageError::UnsupportedType(_))));
    }

    #[test]
    fn test_empty_body_rejected() {
        assert!(sniff(Some("image/gif"), b"", &ImageMediaType::ALL).is_err());
    }

    #[test]
    fn test_parse_short_and_full_names() {
        assert_eq!("jpg".parse::<ImageMediaType>(), Ok(ImageMediaType::Jpeg));
        assert_eq!("image/webp".parse::<ImageMediaType>(), Ok(ImageMediaType::Webp));
        assert!("tiff".parse::<ImageMediaType>().is_err());
    }
}
