//! Mapping post URLs back to content routes.

use percent_encoding::percent_decode_str;

/// Split a URL into path and fragment parts
#[inline]
fn split_path_fragment(url: &str) -> (&str, &str) {
    url.split_once('#').unwrap_or((url, ""))
}

/// Convert a post URL (absolute or path-only) into its content route.
///
/// The `.html` suffix and the site's base route are stripped, and the path
/// is percent-decoded:
///
/// ```ignore
/// assert_eq!(
///     route_from_url("https://bear.im/bearlog/2024/070/hello.html", "/bearlog/"),
///     Some("2024/070/hello".into()),
/// );
/// ```
pub fn route_from_url(url: &str, base_route: &str) -> Option<String> {
    let path = match url::Url::parse(url.trim()) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => split_path_fragment(url.trim()).0.split('?').next()?.to_string(),
    };
    let decoded = percent_decode_str(&path).decode_utf8().ok()?;
    let path: &str = &decoded;

    let path = match path.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("html") => stem,
        _ => path,
    };
    let route = path
        .strip_prefix(base_route)
        .or_else(|| path.strip_prefix(base_route.trim_end_matches('/')))
        .unwrap_or(path)
        .trim_matches('/');

    // reject empty routes and any attempt to climb out of the content root
    if route.is_empty() || route.split('/').any(|seg| seg.is_empty() || seg == "..") {
        return None;
    }
    Some(route.to_string())
}
