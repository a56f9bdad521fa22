//! Text extraction capability for uploaded documents.
//!
//! The boundary admits a fixed set of mime types; anything else is
//! rejected with a typed error before extraction is attempted. The
//! built-in extractor handles PDF (`pdf-extract`) and plain text. Raster
//! scans (`png`/`jpeg`) are admitted at the boundary but the built-in
//! backend carries no OCR engine — it reports an extraction failure, and
//! the upload pipeline still records the file with nulled fields. A real
//! OCR backend plugs in behind [`TextExtractor`] without touching the
//! pipeline.

use crate::error::{Error, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";

/// Mime types the upload boundary admits.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[MIME_PDF, MIME_TEXT, MIME_PNG, MIME_JPEG];

pub fn is_supported_mime(mime: &str) -> bool {
    SUPPORTED_MIME_TYPES.contains(&mime)
}

/// Capability that turns file bytes into plain UTF-8 text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String>;
}

/// Default extractor: PDF and plain text, no OCR.
pub struct BuiltinExtractor;

impl TextExtractor for BuiltinExtractor {
    fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String> {
        match mime {
            MIME_PDF => pdf_extract::extract_text_from_mem(bytes)
                .map(|t| t.trim().to_string())
                .map_err(|e| Error::Extraction(format!("pdf: {}", e))),
            MIME_TEXT => std::str::from_utf8(bytes)
                .map(|t| t.trim().to_string())
                .map_err(|e| Error::Extraction(format!("utf-8: {}", e))),
            MIME_PNG | MIME_JPEG => Err(Error::Extraction(
                "no OCR backend configured for image input".to_string(),
            )),
            other => Err(Error::UnsupportedMedia(other.to_string())),
        }
    }
}

/// Guess a mime type from a filename extension (CLI convenience).
pub fn mime_from_extension(filename: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" => Some(MIME_TEXT),
        "png" => Some(MIME_PNG),
        "jpg" | "jpeg" => Some(MIME_JPEG),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_mime_returns_typed_error() {
        let err = BuiltinExtractor
            .extract_text(b"foo", "application/octet-stream")
            .unwrap_err();
        assert_eq!(err.code(), "unsupported_media_type");
    }

    #[test]
    fn invalid_pdf_is_extraction_failure() {
        let err = BuiltinExtractor
            .extract_text(b"not a pdf", MIME_PDF)
            .unwrap_err();
        assert_eq!(err.code(), "extraction_failed");
    }

    #[test]
    fn plain_text_passes_through() {
        let text = BuiltinExtractor
            .extract_text(b"MARKET\nTOTAL 5.00\n", MIME_TEXT)
            .unwrap();
        assert_eq!(text, "MARKET\nTOTAL 5.00");
    }

    #[test]
    fn image_without_ocr_is_extraction_failure() {
        let err = BuiltinExtractor
            .extract_text(&[0x89, 0x50, 0x4e, 0x47], MIME_PNG)
            .unwrap_err();
        assert_eq!(err.code(), "extraction_failed");
    }

    #[test]
    fn mime_guess_covers_supported_extensions() {
        assert_eq!(mime_from_extension("a.pdf"), Some(MIME_PDF));
        assert_eq!(mime_from_extension("a.JPG"), Some(MIME_JPEG));
        assert_eq!(mime_from_extension("a.docx"), None);
    }
}
