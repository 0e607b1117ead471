//! Enclosure media type detection.

use podvault_entity::podcast::{extension_for, mime_for_extension};

/// Pick the MIME type of an enclosure: the declared type when supported,
/// otherwise a guess from the URL's file extension.
pub fn detect(declared: &str, url: &str) -> Option<String> {
    let declared = declared.split(';').next().unwrap_or_default().trim();
    if extension_for(declared).is_some() {
        return Some(declared.to_ascii_lowercase());
    }

    let path = url.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = file.rsplit_once('.')?;
    mime_for_extension(ext).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(detect("audio/mpeg", "https://x/a").as_deref(), Some("audio/mpeg"));
        assert_eq!(
            detect("", "https://x/a.m4a?token=1").as_deref(),
            Some("audio/x-m4a")
        );
        assert_eq!(
            detect("application/octet-stream", "https://x/a.MOV").as_deref(),
            Some("video/quicktime")
        );
        assert_eq!(detect("text/html", "https://x/a.html"), None);
        assert_eq!(detect("", "https://example.com/noext"), None);
    }
}
