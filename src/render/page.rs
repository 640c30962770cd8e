//! Article rendering: one post (plus its inbound mentions) → article
//! fragment and full page.

use super::{Context, Render, TemplateName, fill, markdown_to_html};
use crate::config::SiteConfig;
use crate::error::Result;
use crate::mention::Mention;
use crate::post::Post;
use crate::utils::date::{format_timestamp, parse_timestamp};
use crate::utils::html::{escape, escape_xml};

pub const TOMBSTONE_HTML: &str = "<p>This article has been deleted.</p>";
pub const TOMBSTONE_TITLE: &str = "This article has been deleted";
const GONE_META: &str = r#"<meta http-equiv="Status" content="410 GONE" />"#;

/// Output of one article render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Article fragment, stored next to the content file and scanned for
    /// outbound mentions.
    pub article: String,
    /// Full page written to the output tree.
    pub page: String,
}

/// Unprefixed context for one post. `url` is the absolute post URL and
/// `html` its rendered body.
pub fn post_context(post: &Post, url: &str, html: &str) -> Context {
    let mut ctx = Context::new();
    ctx.text("SLUG", &post.slug)
        .text("TITLE", &post.title)
        .text("URL", url)
        .text("KEY", post.key())
        .text("CREATED", format_timestamp(&post.created))
        .text("PUBLISHED", format_timestamp(&post.published))
        .text(
            "UPDATED",
            post.updated.as_ref().map(format_timestamp).unwrap_or_default(),
        )
        .text("AUTHOR", &post.author)
        .text("TAGS", post.tags.to_string())
        .text("SUMMARY", &post.summary)
        .markup("HTML", html)
        .markup("XML", escape_xml(html));
    ctx
}

/// Renders article pages against one site.
pub struct PageRenderer<'a> {
    pub renderer: &'a dyn Render,
    pub site: &'a SiteConfig,
    /// Page head metadata template.
    pub embed: &'a str,
}

impl PageRenderer<'_> {
    /// Render `post`. A deleted post gets the tombstone body, a gone status
    /// hint and no mentions.
    pub fn render(
        &self,
        post: &Post,
        url: &str,
        mentions: &[Mention],
        deleted: bool,
    ) -> Result<Rendered> {
        let mut ctx = Context::new();
        ctx.text("SITE_TITLE", &self.site.title)
            .text("SITE_URL", &self.site.base_url);

        let html = if deleted {
            ctx.text("TITLE", TOMBSTONE_TITLE)
                .markup("META", GONE_META)
                .each("MENTIONS", TemplateName::Mention, Vec::new());
            TOMBSTONE_HTML.to_string()
        } else {
            ctx.text("TITLE", &post.title)
                .markup("META", self.meta(post, url))
                .each(
                    "MENTIONS",
                    TemplateName::Mention,
                    mentions.iter().map(mention_context).collect(),
                );
            markdown_to_html(&post.content)
        };
        ctx.nest("POST", &post_context(post, url, &html));

        let article = self.renderer.render(TemplateName::Post, &ctx)?;
        ctx.markup("ARTICLE", &article);
        let page = self.renderer.render(TemplateName::PostPage, &ctx)?;
        Ok(Rendered { article, page })
    }

    fn meta(&self, post: &Post, url: &str) -> String {
        fill(self.embed, |name| {
            let value = match name {
                "TITLE" => post.title.clone(),
                "SUMMARY" => post.summary.clone(),
                "AUTHOR" => post.author.clone(),
                "TAGS" => post.tags.to_string(),
                "URL" => url.to_string(),
                "SLUG" => post.slug.clone(),
                "CREATED" => format_timestamp(&post.created),
                "PUBLISHED" => format_timestamp(&post.published),
                _ => return None,
            };
            Some(escape(&value).into_owned())
        })
    }
}

fn mention_context(mention: &Mention) -> Context {
    let mut item = Context::new();
    item.text("MENTION_SOURCE_URL", &mention.source_url)
        .text("MENTION_TARGET_URL", &mention.target_url);
    if let Some(raw) = &mention.post_date {
        let date = parse_timestamp(raw)
            .map(|ts| format_timestamp(&ts))
            .unwrap_or_else(|| raw.clone());
        item.text("MENTION_POST_DATE", date);
    }
    if let Some(domain) = &mention.vouch_domain {
        item.text("MENTION_VOUCH_DOMAIN", domain);
    }
    if let Some(vouched) = mention.vouched {
        item.text("MENTION_VOUCHED", vouched.to_string());
    }
    match &mention.hcard {
        Some(serde_json::Value::Object(card)) => {
            for (key, value) in card {
                if let Some(text) = value.as_str() {
                    item.text(&format!("MENTION_HCARD_{}", key.to_uppercase()), text);
                }
            }
        }
        Some(serde_json::Value::String(name)) => {
            item.text("MENTION_HCARD_NAME", name);
        }
        _ => {}
    }
    item
}
