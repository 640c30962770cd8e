//! `[templates]` section: logical template name → file name.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Article fragment, also used for each entry of the index.
    pub post: String,
    /// Full article page.
    pub post_page: String,
    /// Index page.
    pub index: String,
    /// One inbound mention inside an article page.
    pub mention: String,
    /// Content file written for new or edited posts.
    pub markdown: String,
    /// Metadata block embedded in the page head.
    pub embed: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            post: "article.html".into(),
            post_page: "article_page.html".into(),
            index: "blog_index.html".into(),
            mention: "mention.html".into(),
            markdown: "post.md".into(),
            embed: "meta.embed".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_override_one_name() {
        let config = test_parse_config("[templates]\npost_page = \"page.jinja\"");
        assert_eq!(config.templates.post_page, "page.jinja");
        assert_eq!(config.templates.post, "article.html");
    }
}
