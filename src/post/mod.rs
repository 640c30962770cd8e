//! Posts: the content/metadata pair behind every article.
//!
//! # Module Structure
//!
//! ```text
//! post/
//! ├── content.rs   # content file header + body
//! ├── edit.rs      # Micropub update semantics
//! ├── micropub.rs  # new post from a Micropub create
//! ├── slug.rs      # title → slug
//! ├── store.rs     # PostStore, Target (on-disk layout)
//! └── mod.rs       # Post, Route, Tags (this file)
//! ```

mod content;
mod edit;
mod micropub;
mod slug;
mod store;

pub use content::{ContentFile, render_content};
pub use edit::apply_edit;
pub use micropub::synthesize;
pub use slug::create_slug;
pub use store::{PostStore, Target};

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::utils::date::{day_of_year, sort_key, year};

// ============================================================================
// Post
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub slug: String,
    pub title: String,
    /// Fixed at creation, never recomputed.
    pub route: Route,
    pub created: NaiveDateTime,
    /// Never earlier than `created`.
    pub published: NaiveDateTime,
    pub updated: Option<NaiveDateTime>,
    pub deleted: Option<NaiveDateTime>,
    pub author: String,
    pub tags: Tags,
    /// Markdown source.
    pub content: String,
    pub summary: String,
    /// Assigned on Micropub creation; absent for hand-written posts.
    pub uuid: Option<Uuid>,
    /// Raw Micropub properties the post was created from.
    pub payload: Option<Value>,
}

impl Post {
    /// Index sort key: creation time as `YYYYmmddHHMMSS`.
    pub fn key(&self) -> String {
        sort_key(&self.created)
    }

    /// Site path of the rendered page, e.g. `/bearlog/2024/070/hello.html`.
    pub fn url(&self, base_route: &str) -> String {
        format!("{base_route}{}.html", self.route)
    }

    /// Clamp `published` so it never precedes `created`.
    pub fn normalize(&mut self) {
        if self.published < self.created {
            self.published = self.created;
        }
    }
}

// ============================================================================
// Route
// ============================================================================

/// `{year}/{doy}/{slug}`: where a post lives, relative to the content and
/// output roots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub year: String,
    pub doy: String,
    pub slug: String,
}

impl Route {
    pub fn new(created: &NaiveDateTime, slug: &str) -> Self {
        Self {
            year: year(created),
            doy: day_of_year(created),
            slug: slug.to_string(),
        }
    }

    /// Parse `year/doy/slug`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim_matches('/').splitn(3, '/');
        let (year, doy, slug) = (parts.next()?, parts.next()?, parts.next()?);
        if [year, doy, slug].iter().any(|p| p.is_empty()) || slug.contains('/') {
            return None;
        }
        Some(Self {
            year: year.to_string(),
            doy: doy.to_string(),
            slug: slug.to_string(),
        })
    }

    /// Directory holding the post under `root`.
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(&self.year).join(&self.doy)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.year, self.doy, self.slug)
    }
}

// ============================================================================
// Tags
// ============================================================================

/// Order-preserving tag set, stored comma-joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<String>);

impl Tags {
    /// Parse a comma-joined list, dropping blanks and duplicates.
    pub fn parse(raw: &str) -> Self {
        let mut tags = Self::default();
        tags.merge(raw.split(','));
        tags
    }

    /// Append tags not already present. Returns whether anything was added.
    pub fn merge<I, S>(&mut self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut changed = false;
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() && !self.contains(tag) {
                self.0.push(tag.to_string());
                changed = true;
            }
        }
        changed
    }

    /// Remove the given tags. Returns whether anything was removed.
    pub fn remove<I, S>(&mut self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.0.len();
        for tag in tags {
            let tag = tag.as_ref().trim();
            self.0.retain(|t| t != tag);
        }
        self.0.len() != before
    }

    /// Remove every tag. Returns whether there were any.
    pub fn clear(&mut self) -> bool {
        let had = !self.0.is_empty();
        self.0.clear();
        had
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl<S: AsRef<str>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Self::default();
        tags.merge(iter);
        tags
    }
}

impl Serialize for Tags {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Joined(String),
            List(Vec<String>),
        }
        Ok(match Option::<Raw>::deserialize(d)? {
            None => Self::default(),
            Some(Raw::Joined(s)) => Self::parse(&s),
            Some(Raw::List(list)) => list.into_iter().collect(),
        })
    }
}
