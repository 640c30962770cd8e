//! Micropub update semantics.
//!
//! | kind      | content            | tags                                   |
//! |-----------|--------------------|----------------------------------------|
//! | `replace` | replaced wholesale | merged (existing ∪ new)                |
//! | `add`     | appended           | merged (existing ∪ new)                |
//! | `delete`  | untouched          | listed ones removed, or all if none    |

use super::Post;
use crate::event::{Edit, EditKind};

/// Apply `edit` to `post`. Returns whether anything changed.
pub fn apply_edit(post: &mut Post, edit: &Edit) -> bool {
    match edit.kind {
        EditKind::Replace => {
            let mut changed = false;
            if let Some(lines) = &edit.content {
                let content = lines.join("\n");
                changed |= post.content != content;
                post.content = content;
            }
            if let Some(tags) = &edit.category {
                changed |= post.tags.merge(tags);
            }
            changed
        }
        EditKind::Add => {
            let mut changed = false;
            if let Some(lines) = &edit.content
                && !lines.is_empty()
            {
                if !post.content.is_empty() && !post.content.ends_with('\n') {
                    post.content.push('\n');
                }
                post.content.push_str(&lines.join("\n"));
                changed = true;
            }
            if let Some(tags) = &edit.category {
                changed |= post.tags.merge(tags);
            }
            changed
        }
        EditKind::Delete => match &edit.category {
            Some(tags) if !tags.is_empty() => post.tags.remove(tags),
            _ => post.tags.clear(),
        },
    }
}
