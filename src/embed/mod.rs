//! Embedded default templates.
//!
//! Used for every template the configured template directory does not
//! provide, so a fresh site renders without any template files.
//!
//! # Usage
//!
//! ```ignore
//! use embed::templates::{ARTICLE_HTML, POST_MD};
//! ```

pub mod templates {
    /// Article fragment, also each entry of the index.
    pub const ARTICLE_HTML: &str = include_str!("templates/article.html");

    /// Full article page.
    pub const ARTICLE_PAGE_HTML: &str = include_str!("templates/article_page.html");

    /// Index page.
    pub const BLOG_INDEX_HTML: &str = include_str!("templates/blog_index.html");

    /// One inbound mention.
    pub const MENTION_HTML: &str = include_str!("templates/mention.html");

    /// Content file written for new and edited posts.
    pub const POST_MD: &str = include_str!("templates/post.md");

    /// Metadata block for the page head.
    pub const META_EMBED: &str = include_str!("templates/meta.embed");
}
