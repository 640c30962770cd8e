//! Index page: the newest non-deleted posts.

use jwalk::WalkDir;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use super::{Context, Render, TemplateName, markdown_to_html, post_context};
use crate::config::SiteConfig;
use crate::error::{IoContext, Result};
use crate::log;
use crate::post::{Post, PostStore, Target};
use crate::utils::fs::write_atomic;

/// Load every non-deleted post with a metadata record, newest first.
///
/// Posts that fail to load are logged and left out.
pub fn collect_posts(store: &PostStore) -> Vec<Post> {
    let targets: Vec<Target> = WalkDir::new(store.content_root())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .map(|p: PathBuf| Target::new(p.with_extension("")))
        .filter(|target| !store.is_deleted(target))
        .collect();

    let mut posts: Vec<Post> = targets
        .par_iter()
        .filter_map(|target| match store.load(target) {
            Ok(post) => Some(post),
            Err(e) => {
                log!("index"; "skipping {}: {}", target.base().display(), e);
                None
            }
        })
        .collect();

    posts.sort_by(|a, b| b.key().cmp(&a.key()));
    posts
}

/// Render the index into `{output}/index.html`. Returns the number of posts
/// listed; an empty content tree renders an empty list.
pub fn regenerate_index(
    store: &PostStore,
    renderer: &dyn Render,
    site: &SiteConfig,
    output: &Path,
) -> Result<usize> {
    let posts = collect_posts(store);
    let items: Vec<Context> = posts
        .par_iter()
        .take(site.index_articles)
        .map(|post| {
            let html = markdown_to_html(&post.content);
            let mut item = Context::new();
            item.nest("POST", &post_context(post, &store.absolute_url(post), &html));
            item
        })
        .collect();
    let count = items.len();

    let mut ctx = Context::new();
    ctx.text("SITE_TITLE", &site.title)
        .text("SITE_URL", &site.base_url)
        .each("POSTS", TemplateName::Post, items);
    let page = renderer.render(TemplateName::Index, &ctx)?;

    let path = output.join("index.html");
    write_atomic(&path, page.as_bytes()).at(&path)?;
    log!("index"; "index rebuilt with {} posts", count);
    Ok(count)
}
