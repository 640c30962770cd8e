//! On-disk post storage.
//!
//! Every post is a family of sibling files sharing one base path,
//! `{content}/{year}/{doy}/{slug}`:
//!
//! | Extension           | Contents                              |
//! |---------------------|---------------------------------------|
//! | `.md`               | content file (header + markdown body) |
//! | `.json`             | metadata record                       |
//! | `.mentions`         | inbound webmentions                   |
//! | `.outboundmentions` | outbound webmentions sent             |
//! | `.deleted`          | zero-byte deletion marker             |
//! | `.html`             | rendered article fragment             |
//!
//! The content file is the source of truth for the body; the metadata record
//! for everything else. Content is always written before metadata, so an
//! interrupted save leaves content newer than metadata, which gather picks up.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::content::{ContentFile, render_content};
use super::{Post, Route, Tags};
use crate::config::KakuConfig;
use crate::error::{Error, IoContext, Result};
use crate::event::{FileRef, TargetRef};
use crate::utils::date::{day_of_year, serde_timestamp, sort_key, year};
use crate::utils::fs::{read_optional, remove_if_exists, touch, write_atomic, write_new};
use crate::utils::link::route_from_url;

// ============================================================================
// Target
// ============================================================================

/// Base path of one post's files, without extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    base: PathBuf,
}

impl Target {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// File name stem, the slug for well-formed content trees.
    pub fn stem(&self) -> String {
        self.base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn with_suffix(&self, ext: &str) -> PathBuf {
        // not `with_extension`: slugs may themselves contain dots
        let mut name = OsString::from(self.base.as_os_str());
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    }

    pub fn md(&self) -> PathBuf {
        self.with_suffix("md")
    }

    pub fn json(&self) -> PathBuf {
        self.with_suffix("json")
    }

    pub fn mentions(&self) -> PathBuf {
        self.with_suffix("mentions")
    }

    pub fn outbound(&self) -> PathBuf {
        self.with_suffix("outboundmentions")
    }

    pub fn deleted(&self) -> PathBuf {
        self.with_suffix("deleted")
    }

    pub fn html(&self) -> PathBuf {
        self.with_suffix("html")
    }
}

// ============================================================================
// Metadata record
// ============================================================================

/// Metadata file layout. Derived fields are rewritten on every save and
/// recomputed when missing on load.
#[derive(Debug, Serialize, Deserialize)]
struct PostRecord {
    slug: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    route: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    doy: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(with = "serde_timestamp", alias = "timestamp", alias = "date")]
    created: NaiveDateTime,
    #[serde(
        default,
        with = "serde_timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    published: Option<NaiveDateTime>,
    #[serde(
        default,
        with = "serde_timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    updated: Option<NaiveDateTime>,
    #[serde(
        default,
        with = "serde_timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    deleted: Option<NaiveDateTime>,
    #[serde(default)]
    author: String,
    #[serde(default)]
    tags: Tags,
    #[serde(default)]
    content: String,
    #[serde(default)]
    summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl PostRecord {
    fn from_post(post: &Post, base_route: &str) -> Self {
        Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            route: Some(post.route.to_string()),
            key: Some(sort_key(&post.created)),
            year: Some(year(&post.created)),
            doy: Some(day_of_year(&post.created)),
            url: Some(post.url(base_route)),
            created: post.created,
            published: Some(post.published),
            updated: post.updated,
            deleted: post.deleted,
            author: post.author.clone(),
            tags: post.tags.clone(),
            content: post.content.clone(),
            summary: post.summary.clone(),
            uuid: post.uuid,
            payload: post.payload.clone(),
        }
    }

    fn into_post(self, body: String) -> Post {
        let route = self
            .route
            .as_deref()
            .and_then(Route::parse)
            .or_else(|| match (&self.year, &self.doy) {
                (Some(year), Some(doy)) => Some(Route {
                    year: year.clone(),
                    doy: doy.clone(),
                    slug: self.slug.clone(),
                }),
                _ => None,
            })
            .unwrap_or_else(|| Route::new(&self.created, &self.slug));

        let mut post = Post {
            title: if self.title.is_empty() {
                self.slug.clone()
            } else {
                self.title
            },
            slug: self.slug,
            route,
            created: self.created,
            published: self.published.unwrap_or(self.created),
            updated: self.updated,
            deleted: self.deleted,
            author: self.author,
            tags: self.tags,
            content: body,
            summary: self.summary,
            uuid: self.uuid,
            payload: self.payload,
        };
        post.normalize();
        post
    }
}

// ============================================================================
// PostStore
// ============================================================================

pub struct PostStore {
    content_root: PathBuf,
    base_url: String,
    base_route: String,
    content_template: String,
}

impl PostStore {
    /// `content_template` is the template content files are written with.
    pub fn new(config: &KakuConfig, content_template: impl Into<String>) -> Self {
        Self {
            content_root: config.paths.content.clone(),
            base_url: config.site.base_url.trim_end_matches('/').to_string(),
            base_route: config.site.base_route.clone(),
            content_template: content_template.into(),
        }
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    pub fn base_route(&self) -> &str {
        &self.base_route
    }

    /// Absolute public URL of `post`.
    pub fn absolute_url(&self, post: &Post) -> String {
        format!("{}{}", self.base_url, post.url(&self.base_route))
    }

    pub fn target_for(&self, route: &Route) -> Target {
        Target::new(route.dir(&self.content_root).join(&route.slug))
    }

    /// Resolve an event's post reference to its on-disk target.
    pub fn resolve(&self, target: &TargetRef) -> Result<Target> {
        match target {
            TargetRef::File(file) => Ok(self.resolve_file(file)),
            TargetRef::Url(url) => route_from_url(url, &self.base_route)
                .map(|route| Target::new(self.content_root.join(route)))
                .ok_or_else(|| Error::validation(format!("`{url}` is not a post url"))),
        }
    }

    /// `file` may be a bare stem (joined to `path`), a path relative to the
    /// content root, or absolute; a trailing `.md` is dropped.
    pub fn resolve_file(&self, file: &FileRef) -> Target {
        let joined = match &file.path {
            Some(dir) => dir.join(&file.file),
            None => file.file.clone(),
        };
        let joined = if joined.is_relative() {
            self.content_root.join(joined)
        } else {
            joined
        };
        let base = match joined.extension() {
            Some(ext) if ext == "md" => joined.with_extension(""),
            _ => joined,
        };
        Target::new(base)
    }

    pub fn exists(&self, target: &Target) -> bool {
        target.md().is_file()
    }

    /// Load a post: body from the content file, fields from the metadata
    /// record, or derived from the content header when there is no record.
    pub fn load(&self, target: &Target) -> Result<Post> {
        let md = target.md();
        let raw = read_optional(&md)
            .at(&md)?
            .ok_or_else(|| Error::not_found(md.display().to_string()))?;
        let content = ContentFile::parse(&raw);

        let json = target.json();
        match read_optional(&json).at(&json)? {
            Some(raw) => {
                let record: PostRecord =
                    serde_json::from_str(&raw).map_err(|e| Error::corrupt(&json, e))?;
                Ok(record.into_post(content.body))
            }
            None => content.to_post(&target.stem()),
        }
    }

    /// Write the metadata record. The content file is not touched.
    pub fn save(&self, target: &Target, post: &Post) -> Result<()> {
        let json = target.json();
        let record = PostRecord::from_post(post, &self.base_route);
        let bytes = serde_json::to_vec_pretty(&record).map_err(|e| Error::corrupt(&json, e))?;
        write_atomic(&json, &bytes).at(&json)
    }

    /// Rewrite the content file from `post`.
    pub fn write_content(&self, target: &Target, post: &Post) -> Result<()> {
        let md = target.md();
        let text = render_content(&self.content_template, post, &self.absolute_url(post));
        write_atomic(&md, text.as_bytes()).at(&md)
    }

    /// Write a brand-new content file; `Conflict` if one already exists.
    pub fn create(&self, target: &Target, post: &Post) -> Result<()> {
        let md = target.md();
        let text = render_content(&self.content_template, post, &self.absolute_url(post));
        match write_new(&md, text.as_bytes()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::Conflict(md)),
            Err(e) => Err(Error::io(&md, e)),
        }
    }

    pub fn is_deleted(&self, target: &Target) -> bool {
        target.deleted().exists()
    }

    /// Touch the deletion marker. Idempotent.
    pub fn mark_deleted(&self, target: &Target) -> Result<()> {
        let marker = target.deleted();
        touch(&marker).at(&marker)
    }

    /// Remove the deletion marker. Returns whether one was present.
    pub fn clear_deleted(&self, target: &Target) -> Result<bool> {
        let marker = target.deleted();
        remove_if_exists(&marker).at(&marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::templates::POST_MD;
    use crate::test_utils::TestSite;
    use std::fs;

    #[test]
    fn test_target_paths() {
        let target = Target::new("/c/2024/070/v1.2");
        assert_eq!(target.md(), PathBuf::from("/c/2024/070/v1.2.md"));
        assert_eq!(target.outbound(), PathBuf::from("/c/2024/070/v1.2.outboundmentions"));
        assert_eq!(target.stem(), "v1.2");
    }

    #[test]
    fn test_resolve_refs() {
        let site = TestSite::new();
        let store = site.store();
        let root = store.content_root().to_path_buf();

        let by_url = store
            .resolve(&TargetRef::Url(
                "https://bear.im/bearlog/2024/070/hello.html".into(),
            ))
            .unwrap();
        assert_eq!(by_url.base(), root.join("2024/070/hello"));

        let by_stem = store.resolve_file(&FileRef {
            path: Some(root.join("2024/070")),
            file: "hello".into(),
        });
        assert_eq!(by_stem, by_url);

        let by_relative = store.resolve_file(&FileRef {
            path: None,
            file: "2024/070/hello.md".into(),
        });
        assert_eq!(by_relative, by_url);

        assert!(matches!(
            store.resolve(&TargetRef::Url("https://bear.im/bearlog/".into())),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let site = TestSite::new();
        let store = site.store();
        let target = store.resolve_file(&FileRef {
            path: None,
            file: "2024/070/nope".into(),
        });
        assert!(matches!(store.load(&target), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_first_read_migration() {
        let site = TestSite::new();
        let store = site.store();
        let target = site.write_md(
            "2024/070/hello",
            "Title: Hello\nCreated: 2024-03-10 10:00:00\nTags: a\n\nbody",
        );

        let first = store.load(&target).unwrap();
        let second = store.load(&target).unwrap();
        assert_eq!(first, second);
        assert!(!target.json().exists());

        store.save(&target, &first).unwrap();
        let reloaded = store.load(&target).unwrap();
        assert_eq!(reloaded, first);

        let record: Value = serde_json::from_str(&fs::read_to_string(target.json()).unwrap()).unwrap();
        assert_eq!(record["created"], "2024-03-10 10:00:00");
        assert_eq!(record["published"], "2024-03-10 10:00:00");
        assert_eq!(record["key"], "20240310100000");
        assert_eq!(record["doy"], "070");
        assert_eq!(record["url"], "/bearlog/2024/070/hello.html");
        assert_eq!(record["tags"], "a");
    }

    #[test]
    fn test_body_comes_from_content_file() {
        let site = TestSite::new();
        let store = site.store();
        let target = site.write_md("2024/070/hello", "Created: 2024-03-10 10:00:00\n\nfirst");
        let post = store.load(&target).unwrap();
        store.save(&target, &post).unwrap();

        fs::write(target.md(), "Created: 2024-03-10 10:00:00\n\nedited by hand").unwrap();
        assert_eq!(store.load(&target).unwrap().content, "edited by hand");
    }

    #[test]
    fn test_legacy_record_fields() {
        let site = TestSite::new();
        let store = site.store();
        let target = site.write_md("2016/123/old", "Created: 2016-05-02 08:00:00\n\nbody");
        fs::write(
            target.json(),
            r#"{"slug": "old", "timestamp": "2016-05-02T08:00:00", "year": "2016", "doy": "123", "tags": "x,y"}"#,
        )
        .unwrap();

        let post = store.load(&target).unwrap();
        assert_eq!(post.route.to_string(), "2016/123/old");
        assert_eq!(post.published, post.created);
        assert_eq!(post.title, "old");
    }

    #[test]
    fn test_create_conflict() {
        let site = TestSite::new();
        let store = site.store();
        let post = store
            .load(&site.write_md("2024/070/a", "Created: 2024-03-10 10:00:00\n\nbody"))
            .unwrap();
        let target = store.target_for(&post.route);
        assert!(matches!(store.create(&target, &post), Err(Error::Conflict(_))));

        let fresh = store.target_for(&Route::new(&post.created, "b"));
        store.create(&fresh, &post).unwrap();
        assert!(store.exists(&fresh));
        assert!(fs::read_to_string(fresh.md()).unwrap().ends_with("body\n"));
    }

    #[test]
    fn test_deletion_marker() {
        let site = TestSite::new();
        let store = site.store();
        let target = site.write_md("2024/070/a", "Created: 2024-03-10 10:00:00\n\nbody");

        assert!(!store.is_deleted(&target));
        store.mark_deleted(&target).unwrap();
        store.mark_deleted(&target).unwrap();
        assert!(store.is_deleted(&target));
        assert_eq!(fs::metadata(target.deleted()).unwrap().len(), 0);
        assert!(store.clear_deleted(&target).unwrap());
        assert!(!store.clear_deleted(&target).unwrap());
    }

    #[test]
    fn test_write_content_round_trip() {
        let site = TestSite::new();
        let store = PostStore::new(&site.config, POST_MD);
        let target = site.write_md("2024/070/a", "Created: 2024-03-10 10:00:00\nTags: x\n\nbody");
        let mut post = store.load(&target).unwrap();
        post.content = "changed".into();
        store.write_content(&target, &post).unwrap();

        let reloaded = store.load(&target).unwrap();
        assert_eq!(reloaded.content, "changed");
        assert_eq!(reloaded.tags, post.tags);
        assert_eq!(reloaded.created, post.created);
    }
}
