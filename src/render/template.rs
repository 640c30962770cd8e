//! Template sources and the placeholder renderer.

use std::fs;
use std::path::Path;

use super::{Context, Render, TemplateName, fill, resolve};
use crate::config::KakuConfig;
use crate::debug;
use crate::embed::templates::{
    ARTICLE_HTML, ARTICLE_PAGE_HTML, BLOG_INDEX_HTML, MENTION_HTML, META_EMBED, POST_MD,
};
use crate::error::{IoContext, Result};

/// Every template the worker uses, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    pub post: String,
    pub post_page: String,
    pub index: String,
    pub mention: String,
    /// Content file template.
    pub markdown: String,
    /// Page head metadata block.
    pub embed: String,
}

impl TemplateSet {
    /// Built-in defaults only.
    pub fn embedded() -> Self {
        Self {
            post: ARTICLE_HTML.into(),
            post_page: ARTICLE_PAGE_HTML.into(),
            index: BLOG_INDEX_HTML.into(),
            mention: MENTION_HTML.into(),
            markdown: POST_MD.into(),
            embed: META_EMBED.into(),
        }
    }

    /// Read configured templates, falling back to the embedded default for
    /// each file the template directory lacks.
    pub fn load(config: &KakuConfig) -> Result<Self> {
        let mut set = Self::embedded();
        let Some(dir) = &config.paths.templates else {
            return Ok(set);
        };

        let names = &config.templates;
        for (file, slot) in [
            (&names.post, &mut set.post),
            (&names.post_page, &mut set.post_page),
            (&names.index, &mut set.index),
            (&names.mention, &mut set.mention),
            (&names.markdown, &mut set.markdown),
            (&names.embed, &mut set.embed),
        ] {
            if let Some(source) = read_template(dir, file)? {
                *slot = source;
            }
        }
        Ok(set)
    }

    pub fn source(&self, name: TemplateName) -> &str {
        match name {
            TemplateName::Post => &self.post,
            TemplateName::PostPage => &self.post_page,
            TemplateName::Index => &self.index,
            TemplateName::Mention => &self.mention,
        }
    }
}

fn read_template(dir: &Path, file: &str) -> Result<Option<String>> {
    let path = dir.join(file);
    if !path.is_file() {
        debug!("render"; "{} not found, using built-in", path.display());
        return Ok(None);
    }
    fs::read_to_string(&path).at(&path).map(Some)
}

/// [`Render`] over a [`TemplateSet`] with `__NAME__` substitution.
pub struct TemplateRenderer {
    templates: TemplateSet,
}

impl TemplateRenderer {
    pub fn new(templates: TemplateSet) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    fn render_str(&self, template: TemplateName, context: &Context) -> String {
        fill(self.templates.source(template), |name| {
            context
                .get(name)
                .map(|value| resolve(value, |t, item| self.render_str(t, item)))
        })
    }
}

impl Render for TemplateRenderer {
    fn render(&self, template: TemplateName, context: &Context) -> Result<String> {
        Ok(self.render_str(template, context))
    }
}
