//! Content file format.
//!
//! ```text
//! Title: Hello
//! Created: 2024-03-10 10:00:00
//! Tags: a,b
//!
//! Markdown body…
//! ```
//!
//! Header lines run until the first blank line; each `Key: value` line is
//! recorded with its key lower-cased. Everything after the blank line is the
//! body.

use rustc_hash::FxHashMap;
use uuid::Uuid;

use super::{Post, Route, Tags};
use crate::error::{Error, Result};
use crate::render::fill;
use crate::utils::date::{format_timestamp, parse_timestamp};

/// A parsed content file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFile {
    pub header: FxHashMap<String, String>,
    pub body: String,
}

impl ContentFile {
    pub fn parse(raw: &str) -> Self {
        let mut header = FxHashMap::default();
        let mut rest = Vec::new();
        let mut in_header = true;

        for line in raw.split_inclusive('\n') {
            if in_header && line.trim().is_empty() {
                in_header = false;
            }
            match line.split_once(':') {
                Some((key, value)) if in_header => {
                    header.insert(key.trim().to_lowercase(), value.trim().to_string());
                }
                _ => rest.push(line),
            }
        }

        // the first collected line is the blank separator
        let body = rest.get(1..).unwrap_or_default().concat();
        Self {
            header,
            body: body.trim_end_matches(['\n', '\r']).to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.header
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn timestamp(&self, key: &str) -> Option<chrono::NaiveDateTime> {
        self.get(key).and_then(parse_timestamp)
    }

    /// Derive a post from header fields alone (no metadata file yet).
    ///
    /// `stem` is the content file name without extension and stands in for a
    /// missing `Slug`. Deterministic: the same file always yields the same
    /// post.
    pub fn to_post(&self, stem: &str) -> Result<Post> {
        let created = self
            .timestamp("created")
            .or_else(|| self.timestamp("date"))
            .ok_or_else(|| {
                Error::validation(format!("content `{stem}` has no usable Created/Date header"))
            })?;
        let slug = self.get("slug").unwrap_or(stem).to_string();
        let summary = self.get("summary").unwrap_or_default().to_string();
        let title = self
            .get("title")
            .or(self.get("summary"))
            .unwrap_or(&slug)
            .to_string();

        let mut post = Post {
            route: Route::new(&created, &slug),
            slug,
            title,
            created,
            published: self.timestamp("published").unwrap_or(created),
            updated: self.timestamp("updated"),
            deleted: None,
            author: self.get("author").unwrap_or_default().to_string(),
            tags: Tags::parse(self.get("tags").unwrap_or_default()),
            content: self.body.clone(),
            summary,
            uuid: self.get("uuid").and_then(|u| Uuid::parse_str(u).ok()),
            payload: None,
        };
        post.normalize();
        Ok(post)
    }
}

/// Fill the content template for `post`.
///
/// `url` is the post's absolute URL. Header values are flattened to one line
/// so they cannot end the header early.
pub fn render_content(template: &str, post: &Post, url: &str) -> String {
    let line = |s: &str| s.replace(['\r', '\n'], " ");
    let mut out = fill(template, |name| {
        Some(match name {
            "TITLE" => line(&post.title),
            "SUMMARY" => line(&post.summary),
            "SLUG" => line(&post.slug),
            "AUTHOR" => line(&post.author),
            "TAGS" => line(&post.tags.to_string()),
            "URL" => line(url),
            "CREATED" => format_timestamp(&post.created),
            "PUBLISHED" => format_timestamp(&post.published),
            "UPDATED" => post.updated.as_ref().map(format_timestamp).unwrap_or_default(),
            "UUID" => post.uuid.map(|u| u.to_string()).unwrap_or_default(),
            "CONTENT" => post.content.trim_end().to_string(),
            _ => return None,
        })
    });
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
