//! MIME type detection from file names.
//!
//! Lookup is a pure extension table. Unknown extensions resolve to `None`
//! so registration can record the type as unresolved instead of guessing;
//! callers decide whether that is worth a warning.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    // Text
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const MARKDOWN: &str = "text/markdown; charset=utf-8";
    pub const CSV: &str = "text/csv; charset=utf-8";

    // Images
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    // Fonts
    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OTF: &str = "font/otf";

    // Documents / binary
    pub const PDF: &str = "application/pdf";
    pub const WASM: &str = "application/wasm";
    pub const ZIP: &str = "application/zip";
    pub const GZIP: &str = "application/gzip";
}

/// Guess the MIME type from a file name.
pub fn from_path(path: &Path) -> Option<&'static str> {
    from_extension(path.extension().and_then(|e| e.to_str()))
}

/// Guess the MIME type from an extension string.
pub fn from_extension(ext: Option<&str>) -> Option<&'static str> {
    match ext {
        Some("html" | "htm") => Some(types::HTML),
        Some("txt") => Some(types::PLAIN),
        Some("css") => Some(types::CSS),
        Some("js" | "mjs" | "cjs") => Some(types::JAVASCRIPT),
        Some("json") => Some(types::JSON),
        Some("xml") => Some(types::XML),
        Some("md") => Some(types::MARKDOWN),
        Some("csv") => Some(types::CSV),

        Some("png") => Some(types::PNG),
        Some("jpg" | "jpeg") => Some(types::JPEG),
        Some("gif") => Some(types::GIF),
        Some("webp") => Some(types::WEBP),
        Some("svg") => Some(types::SVG),
        Some("ico") => Some(types::ICO),

        Some("woff") => Some(types::WOFF),
        Some("woff2") => Some(types::WOFF2),
        Some("ttf") => Some(types::TTF),
        Some("otf") => Some(types::OTF),

        Some("pdf") => Some(types::PDF),
        Some("wasm") => Some(types::WASM),
        Some("zip") => Some(types::ZIP),
        Some("gz" | "gzip") => Some(types::GZIP),

        _ => None,
    }
}

/// Resolve a content-type hint for a dynamic route.
///
/// A hint containing `/` is already a full `type/subtype` value and is
/// taken literally. Anything else is treated as a file name to guess
/// from; a bare `.ext` becomes `file.ext` first.
pub fn resolve_hint(hint: &str) -> Option<String> {
    if hint.contains('/') {
        return Some(hint.to_string());
    }

    let filename = match hint.strip_prefix('.') {
        Some(ext) => format!("file.{ext}"),
        None => hint.to_string(),
    };
    from_path(Path::new(&filename)).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_path() {
        assert_eq!(from_path(&PathBuf::from("index.html")), Some(types::HTML));
        assert_eq!(from_path(&PathBuf::from("style.css")), Some(types::CSS));
        assert_eq!(from_path(&PathBuf::from("logo.png")), Some(types::PNG));
        assert_eq!(from_path(&PathBuf::from("unknown.xyz")), None);
        assert_eq!(from_path(&PathBuf::from("no_extension")), None);
    }

    #[test]
    fn test_resolve_hint_literal() {
        assert_eq!(
            resolve_hint("application/vnd.api+json").as_deref(),
            Some("application/vnd.api+json")
        );
    }

    #[test]
    fn test_resolve_hint_filename_and_extension() {
        assert_eq!(resolve_hint("report.csv").as_deref(), Some(types::CSV));
        assert_eq!(resolve_hint(".css").as_deref(), Some(types::CSS));
        assert_eq!(resolve_hint(".nonsense"), None);
    }
}
