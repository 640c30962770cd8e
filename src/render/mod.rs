//! Rendering: markdown, article pages and the index.
//!
//! Templates are plain text with `__NAME__` placeholders. A [`Context`] maps
//! names to values; nested lists (mentions on a page, posts on the index) are
//! rendered through their own logical template and spliced in.
//!
//! # Module Structure
//!
//! ```text
//! render/
//! ├── template.rs  # TemplateSet (sources), TemplateRenderer
//! ├── markdown.rs  # markdown → HTML
//! ├── page.rs      # post (+ mentions) → article + page
//! ├── index.rs     # newest posts → index page
//! └── mod.rs       # Context, Render, fill (this file)
//! ```

mod index;
mod markdown;
mod page;
mod template;

pub use index::{collect_posts, regenerate_index};
pub use markdown::markdown_to_html;
pub use page::{PageRenderer, Rendered, TOMBSTONE_HTML, TOMBSTONE_TITLE, post_context};
pub use template::{TemplateRenderer, TemplateSet};

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::error::Result;
use crate::utils::html::escape;

/// Logical template names, mapped to files by `[templates]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    /// Article fragment; also each entry of the index.
    Post,
    PostPage,
    Index,
    /// One inbound mention on a page.
    Mention,
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Post => "post",
            Self::PostPage => "postPage",
            Self::Index => "index",
            Self::Mention => "mention",
        })
    }
}

/// Render collaborator: `(template, context) → markup`.
pub trait Render: Send + Sync {
    fn render(&self, template: TemplateName, context: &Context) -> Result<String>;
}

// ============================================================================
// Context
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Plain text, HTML-escaped on output.
    Text(String),
    /// Trusted markup, inserted verbatim.
    Markup(String),
    /// Each item rendered with `template`, joined by newlines.
    Each(TemplateName, Vec<Context>),
}

/// Placeholder values, keyed by upper-case name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.to_string(), Value::Text(value.into()));
        self
    }

    pub fn markup(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.to_string(), Value::Markup(value.into()));
        self
    }

    pub fn each(&mut self, name: &str, template: TemplateName, items: Vec<Context>) -> &mut Self {
        self.vars.insert(name.to_string(), Value::Each(template, items));
        self
    }

    /// Copy every value of `other` in as `{prefix}_{NAME}`.
    pub fn nest(&mut self, prefix: &str, other: &Context) -> &mut Self {
        for (name, value) in &other.vars {
            self.vars.insert(format!("{prefix}_{name}"), value.clone());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

// ============================================================================
// Placeholder substitution
// ============================================================================

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__([A-Z][A-Z0-9_]*?)__").unwrap());

/// Replace every `__NAME__` in `template` with `lookup(NAME)`.
///
/// Unknown names render as the empty string.
pub fn fill(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| lookup(&caps[1]).unwrap_or_default())
        .into_owned()
}

/// Resolve one context value to output text.
pub(crate) fn resolve(value: &Value, each: impl Fn(TemplateName, &Context) -> String) -> String {
    match value {
        Value::Text(text) => escape(text).into_owned(),
        Value::Markup(markup) => markup.clone(),
        Value::Each(template, items) => items
            .iter()
            .map(|item| each(*template, item))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
