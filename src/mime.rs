/// Sniff an image MIME type from magic bytes, `None` when unrecognized.
pub fn detect_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x42, 0x4D, ..] => Some("image/bmp"),
        _ => None,
    }
}

/// MIME type used for a blob when reading it into a data URL.
///
/// A declared type wins; otherwise the bytes are sniffed, and unknown content
/// falls back to `application/octet-stream`.
pub fn resolve_mime(declared: Option<&str>, bytes: &[u8]) -> String {
    if let Some(declared) = declared.filter(|m| !m.trim().is_empty()) {
        return declared.trim().to_string();
    }

    match detect_image_mime(bytes) {
        Some(mime) => mime.to_string(),
        None => {
            tracing::warn!(
                "Unrecognized image format (first 4 bytes: {:02X?}), using application/octet-stream",
                &bytes[..bytes.len().min(4)]
            );
            "application/octet-stream".to_string()
        }
    }
}
