//! Title → URL slug.

use regex::Regex;
use std::sync::LazyLock;

/// Runs of whitespace and ASCII punctuation separate slug words.
static PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"[\t !"#$%&'()*\-/<=>?@\[\\\]^_`{|},.]+"##).unwrap());

/// Lower-case, transliterate to ASCII and join the words with `-`.
///
/// ```ignore
/// assert_eq!(create_slug("Hello, World!"), "hello-world");
/// assert_eq!(create_slug("Café Crème"), "cafe-creme");
/// ```
pub fn create_slug(title: &str) -> String {
    let lower = title.to_lowercase();
    let mut words = Vec::new();
    for word in PUNCT.split(&lower) {
        words.extend(
            deunicode::deunicode(word)
                .split_whitespace()
                .map(str::to_string),
        );
    }
    words.join("-")
}
