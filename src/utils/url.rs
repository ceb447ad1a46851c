//! URL normalization for route keys.

use percent_encoding::percent_decode_str;

/// Normalize a URL path into its canonical route key.
///
/// Decodes percent-encoding, strips the query string and fragment,
/// converts backslashes to forward slashes and trims surrounding
/// slashes, so `/a/b`, `a/b/` and `a\b` all map to the key `a/b`.
/// The root path maps to the empty key.
pub fn normalize_url(url: &str) -> String {
    let decoded = percent_decode_str(url)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| url.to_string());

    let path = decoded.split(['?', '#']).next().unwrap_or(&decoded);
    path.replace('\\', "/").trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_variants_share_a_key() {
        assert_eq!(normalize_url("/a/b"), "a/b");
        assert_eq!(normalize_url("a/b/"), "a/b");
        assert_eq!(normalize_url("a\\b"), "a/b");
        assert_eq!(normalize_url("a/b"), "a/b");
    }

    #[test]
    fn test_root_is_empty() {
        assert_eq!(normalize_url("/"), "");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn test_strips_query_and_fragment() {
        assert_eq!(normalize_url("/a/b?x=1"), "a/b");
        assert_eq!(normalize_url("/a/b#top"), "a/b");
    }

    #[test]
    fn test_percent_decoding() {
        assert_eq!(normalize_url("/hello%20world.txt"), "hello world.txt");
    }
}
