//! Loading page images into inline payloads.

use std::path::Path;

use base64::Engine;

use super::{Payload, ProviderError};

/// Read an image file and encode it as an inline base64 payload.
///
/// The MIME type comes from the file's magic bytes, falling back to the
/// extension. Files that are neither are rejected.
pub async fn load_image(path: &Path) -> Result<Payload, ProviderError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ProviderError::Io(format!("{}: {}", path.display(), e)))?;
    if bytes.is_empty() {
        return Err(ProviderError::Io(format!("{}: file is empty", path.display())));
    }

    let mime_type = detect_mime(&bytes, path).ok_or_else(|| {
        ProviderError::Io(format!("{}: not a supported image", path.display()))
    })?;

    Ok(Payload::InlineImage {
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        mime_type: mime_type.to_string(),
    })
}

/// Detect an image MIME type from content, then extension.
pub fn detect_mime(bytes: &[u8], path: &Path) -> Option<&'static str> {
    if let Some(kind) = infer::get(bytes) {
        let mime = kind.mime_type();
        return mime.starts_with("image/").then_some(mime);
    }
    mime_from_extension(path)
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// True if `path` has an image extension we can send.
pub fn is_image_path(path: &Path) -> bool {
    mime_from_extension(path).is_some()
}
