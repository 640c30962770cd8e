//! Entity escaping for values substituted into templates.

use std::borrow::Cow;

/// Text content and attribute values.
const MARKUP: [char; 5] = ['<', '>', '&', '"', '\''];

/// XML text nodes: quotes stay literal.
const XML_TEXT: [char; 3] = ['<', '>', '&'];

fn entity(c: char) -> Option<&'static str> {
    Some(match c {
        '<' => "&lt;",
        '>' => "&gt;",
        '&' => "&amp;",
        '"' => "&quot;",
        '\'' => "&#39;",
        _ => return None,
    })
}

/// Escape text content or a quoted attribute value. Borrows when nothing
/// needs escaping.
pub fn escape(s: &str) -> Cow<'_, str> {
    replace_entities(s, &MARKUP)
}

/// Escape rendered markup so it can travel inside an XML text node.
pub fn escape_xml(s: &str) -> Cow<'_, str> {
    replace_entities(s, &XML_TEXT)
}

fn replace_entities<'a>(s: &'a str, set: &[char]) -> Cow<'a, str> {
    if !s.contains(set) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match entity(c).filter(|_| set.contains(&c)) {
            Some(e) => out.push_str(e),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<script>"), "&lt;script&gt;");
        assert_eq!(escape("a & b"), "a &amp; b");
        assert_eq!(escape("\"it's\""), "&quot;it&#39;s&quot;");
        assert!(matches!(escape("hello"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_xml_keeps_quotes() {
        assert_eq!(
            escape_xml("<p class=\"x\">a & b</p>"),
            "&lt;p class=\"x\"&gt;a &amp; b&lt;/p&gt;"
        );
    }
}
