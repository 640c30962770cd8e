//! Markdown to HTML conversion using pulldown-cmark.

use pulldown_cmark::{Options, Parser, html};

/// Extensions enabled for post bodies.
fn options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts
}

/// Convert a post body to HTML. Raw HTML in the body passes through.
pub fn markdown_to_html(source: &str) -> String {
    let parser = Parser::new_ext(source, options());
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
