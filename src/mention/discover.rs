//! HTML scanning: outbound links, webmention endpoints, status hints.

use rustc_hash::FxHashSet;
use url::Url;

use super::transport::{MentionTransport, Page};
use crate::error::Result;

/// Value of attribute `name` on `tag`, matched case-insensitively.
fn attr(tag: &tl::HTMLTag<'_>, name: &str) -> Option<String> {
    tag.attributes()
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.map(|v| v.to_string()).unwrap_or_default())
}

fn has_rel(tag: &tl::HTMLTag<'_>, rel: &str) -> bool {
    attr(tag, "rel").is_some_and(|value| {
        value
            .split_ascii_whitespace()
            .any(|r| r.eq_ignore_ascii_case(rel))
    })
}

/// Mentionable links in `html`: `<a href>` targets that resolve to http(s)
/// URLs on another host than `source`. Deduplicated, in document order.
pub fn find_links(source: &Url, html: &str) -> Vec<String> {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        return Vec::new();
    };

    let mut seen = FxHashSet::default();
    let mut links = Vec::new();
    for tag in dom.nodes().iter().filter_map(|n| n.as_tag()) {
        if !tag.name().as_utf8_str().eq_ignore_ascii_case("a") {
            continue;
        }
        let Some(href) = attr(tag, "href") else {
            continue;
        };
        let Ok(mut target) = source.join(href.trim()) else {
            continue;
        };
        if !matches!(target.scheme(), "http" | "https") || target.host() == source.host() {
            continue;
        }
        target.set_fragment(None);
        let target = target.to_string();
        if seen.insert(target.clone()) {
            links.push(target);
        }
    }
    links
}

/// Parse `Link` header values into `(uri, rel)` pairs.
fn link_header_entries(value: &str) -> impl Iterator<Item = (&str, String)> {
    value.split(',').filter_map(|entry| {
        let mut parts = entry.split(';');
        let uri = parts
            .next()?
            .trim()
            .strip_prefix('<')?
            .strip_suffix('>')?;
        let rel = parts.find_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("rel")
                .then(|| value.trim().trim_matches('"').to_string())
        })?;
        Some((uri, rel))
    })
}

/// Webmention endpoint advertised by `page`: the `Link` header first, then
/// the first `<link>` or `<a>` whose `rel` contains `webmention`. Relative
/// endpoints resolve against the page's final URL.
pub fn endpoint_from_page(page: &Page) -> Option<String> {
    let base = Url::parse(&page.url).ok()?;

    let from_header = page.links.iter().find_map(|value| {
        link_header_entries(value)
            .find(|(_, rel)| {
                rel.split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("webmention"))
            })
            .map(|(uri, _)| uri.to_string())
    });

    let href = from_header.or_else(|| {
        let dom = tl::parse(&page.body, tl::ParserOptions::default()).ok()?;
        dom.nodes()
            .iter()
            .filter_map(|n| n.as_tag())
            .filter(|tag| {
                let name = tag.name().as_utf8_str();
                name.eq_ignore_ascii_case("link") || name.eq_ignore_ascii_case("a")
            })
            .find(|tag| has_rel(tag, "webmention"))
            .and_then(|tag| attr(tag, "href"))
    })?;

    base.join(href.trim()).ok().map(String::from)
}

/// Look up the webmention endpoint of `target`. `None` when the page cannot
/// be fetched successfully or advertises no endpoint.
pub fn discover_endpoint(transport: &dyn MentionTransport, target: &str) -> Result<Option<String>> {
    let page = transport.fetch(target)?;
    if !(200..300).contains(&page.status) {
        return Ok(None);
    }
    Ok(endpoint_from_page(&page))
}

/// Status code from `<meta http-equiv="Status" content="410 GONE">`.
pub fn meta_status(html: &str) -> Option<u16> {
    let dom = tl::parse(html, tl::ParserOptions::default()).ok()?;
    dom.nodes()
        .iter()
        .filter_map(|n| n.as_tag())
        .filter(|tag| tag.name().as_utf8_str().eq_ignore_ascii_case("meta"))
        .filter(|tag| attr(tag, "http-equiv").is_some_and(|v| v.eq_ignore_ascii_case("status")))
        .find_map(|tag| attr(tag, "content")?.split_whitespace().next()?.parse().ok())
}
