//! New posts from Micropub create requests.

use serde_json::Value;
use uuid::Uuid;

use super::{Post, Route, Tags};
use crate::event::{MicropubCreate, string_list};
use crate::utils::html::escape;

/// Build the post a Micropub create describes.
///
/// The body is the `content` lines, then any `html`, then one `<img>` per
/// `photo`. `category` becomes the tag set.
pub fn synthesize(create: &MicropubCreate, author: &str) -> Post {
    let props = &create.micropub;

    let mut content = string_list(props.get("content")).unwrap_or_default();
    if let Some(html) = string_list(props.get("html")) {
        content.extend(html.into_iter().filter(|h| !h.is_empty()));
    }
    if let Some(Value::Array(photos)) = props.get("photo") {
        content.extend(photos.iter().filter_map(photo_tag));
    }

    let tags: Tags = string_list(props.get("category"))
        .unwrap_or_default()
        .into_iter()
        .collect();

    Post {
        slug: create.slug.clone(),
        title: create.title.clone(),
        route: Route::new(&create.timestamp, &create.slug),
        created: create.timestamp,
        published: create.timestamp,
        updated: None,
        deleted: None,
        author: author.to_string(),
        tags,
        content: content.join("\n"),
        summary: create.title.clone(),
        uuid: Some(Uuid::new_v4()),
        payload: Some(Value::Object(props.clone())),
    }
}

/// Photos arrive as a URL, a `[url, alt]` pair or `{value, alt}`.
fn photo_tag(photo: &Value) -> Option<String> {
    let (url, alt) = match photo {
        Value::String(url) => (url.as_str(), ""),
        Value::Array(pair) => (
            pair.first()?.as_str()?,
            pair.get(1).and_then(Value::as_str).unwrap_or_default(),
        ),
        Value::Object(map) => (
            map.get("value")?.as_str()?,
            map.get("alt").and_then(Value::as_str).unwrap_or_default(),
        ),
        _ => return None,
    };
    let alt = if alt.is_empty() {
        String::new()
    } else {
        format!(" alt=\"{}\"", escape(alt))
    };
    Some(format!("<img src=\"{}\"{alt}></img>", escape(url)))
}
