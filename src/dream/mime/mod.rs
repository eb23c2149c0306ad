//! File-extension to content-type lookup.

/// Returns the content type registered for a file extension (without the
/// leading dot), or `None` when the extension is unknown.
///
/// Callers decide the fallback; the static-file handlers default to
/// `application/octet-stream`.
pub fn mime_type_for(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" => "text/plain; charset=utf-8",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(mime_type_for("html"), Some("text/html; charset=utf-8"));
        assert_eq!(mime_type_for("JPEG"), Some("image/jpeg"));
        assert_eq!(mime_type_for("woff2"), Some("font/woff2"));
    }

    #[test]
    fn unknown_extension_is_none() {
        assert_eq!(mime_type_for("bin"), None);
        assert_eq!(mime_type_for(""), None);
    }
}
