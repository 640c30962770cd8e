//! Wire envelope and the typed event it decodes into.
//!
//! Producers store an [`Envelope`] in the ledger; the dispatcher turns it into
//! an [`Event`], rejecting payloads that lack what their variant needs.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::key::{Action, EventKey, EventType};
use crate::error::{Error, Result};
use crate::mention::Mention;
use crate::post::create_slug;
use crate::utils::date::parse_timestamp;

/// Event as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub key: String,
}

impl Envelope {
    /// Envelope with a freshly generated key.
    pub fn new(kind: EventType, action: Option<Action>, data: Value) -> Self {
        let key = EventKey::generate(kind, action);
        Self {
            kind,
            action,
            data,
            key: key.to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        // serializing a Value tree cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::validation(format!("malformed event: {e}")))
    }
}

// ============================================================================
// Typed events
// ============================================================================

/// A decoded event, one variant per handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PostCreate(PostCreate),
    PostUpdate(PostUpdate),
    PostDelete(TargetRef),
    PostUndelete(TargetRef),
    MentionCreate(Mention),
    MentionUpdate(Mention),
    MentionDelete(Mention),
    Gather(GatherRequest),
}

/// Where a post lives on disk, as given by gather events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Directory holding the post files. Absent when `file` is a full path.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// File stem, or path with or without the `.md` extension.
    pub file: PathBuf,
}

/// Post addressed by file or by public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    File(FileRef),
    Url(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostCreate {
    /// An existing content file picked up by gather.
    Path(FileRef),
    /// A new post described by a Micropub request.
    Micropub(MicropubCreate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MicropubCreate {
    /// Derived from the title when the producer sends none.
    pub slug: String,
    pub title: String,
    pub timestamp: NaiveDateTime,
    /// Raw Micropub properties, kept for audit.
    pub micropub: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostUpdate {
    pub target: TargetRef,
    /// Absent for updates detected by gather: re-render only.
    pub edit: Option<Edit>,
}

/// Micropub update vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Replace,
    Add,
    Delete,
}

/// Properties an update touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub kind: EditKind,
    pub content: Option<Vec<String>>,
    /// For `delete`, `None` or empty clears every tag.
    pub category: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherRequest {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub force: bool,
}

impl Event {
    /// Decode an envelope, validating the fields its variant requires.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        let data = &envelope.data;
        match (envelope.kind, envelope.action) {
            (EventType::Gather, _) => {
                let request = if data.is_null() {
                    GatherRequest::default()
                } else {
                    decode(data, "gather")?
                };
                Ok(Self::Gather(request))
            }
            (EventType::Post, Some(Action::Create)) => {
                if data.get("file").is_some() {
                    Ok(Self::PostCreate(PostCreate::Path(decode(data, "post create")?)))
                } else {
                    Ok(Self::PostCreate(PostCreate::Micropub(micropub_create(data)?)))
                }
            }
            (EventType::Post, Some(action @ (Action::Update | Action::Add))) => {
                let target = target_ref(data)?;
                let edit = edit(data, action)?;
                Ok(Self::PostUpdate(PostUpdate { target, edit }))
            }
            (EventType::Post, Some(Action::Delete)) => Ok(Self::PostDelete(target_ref(data)?)),
            (EventType::Post, Some(Action::Undelete)) => {
                Ok(Self::PostUndelete(target_ref(data)?))
            }
            (EventType::Mention, Some(action)) => {
                let mention: Mention = decode(data, "mention")?;
                match action {
                    Action::Create => Ok(Self::MentionCreate(mention)),
                    Action::Update => Ok(Self::MentionUpdate(mention)),
                    Action::Delete => Ok(Self::MentionDelete(mention)),
                    other => Err(Error::validation(format!(
                        "unsupported mention action `{other}`"
                    ))),
                }
            }
            (kind, None) => Err(Error::validation(format!("{kind} event without action"))),
        }
    }

    /// Post-affecting events trigger index regeneration.
    pub const fn affects_posts(&self) -> bool {
        matches!(
            self,
            Self::PostCreate(_) | Self::PostUpdate(_) | Self::PostDelete(_) | Self::PostUndelete(_)
        )
    }

    /// Short operation name used in log records.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::PostCreate(_) => "post create",
            Self::PostUpdate(_) => "post update",
            Self::PostDelete(_) => "post delete",
            Self::PostUndelete(_) => "post undelete",
            Self::MentionCreate(_) => "mention create",
            Self::MentionUpdate(_) => "mention update",
            Self::MentionDelete(_) => "mention delete",
            Self::Gather(_) => "gather",
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: &Value, what: &str) -> Result<T> {
    T::deserialize(data).map_err(|e| Error::validation(format!("{what}: {e}")))
}

fn required_str<'a>(data: &'a Value, field: &str) -> Result<&'a str> {
    data.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::validation(format!("missing `{field}`")))
}

fn micropub_create(data: &Value) -> Result<MicropubCreate> {
    let title = required_str(data, "title")?.to_string();
    let slug = match required_str(data, "slug") {
        Ok(slug) => slug.to_string(),
        Err(_) => create_slug(&title),
    };
    if slug.is_empty() {
        return Err(Error::validation(format!("no slug for title `{title}`")));
    }
    let raw_timestamp = required_str(data, "timestamp")?;
    let timestamp = parse_timestamp(raw_timestamp)
        .ok_or_else(|| Error::validation(format!("invalid timestamp `{raw_timestamp}`")))?;
    let micropub = match data.get("micropub") {
        Some(Value::Object(map)) => map.clone(),
        _ => return Err(Error::validation("missing `micropub` properties")),
    };

    Ok(MicropubCreate {
        slug,
        title,
        timestamp,
        micropub,
    })
}

fn target_ref(data: &Value) -> Result<TargetRef> {
    if data.get("file").is_some() {
        return decode(data, "post target").map(TargetRef::File);
    }
    match data.get("url").and_then(Value::as_str) {
        Some(url) if !url.trim().is_empty() => Ok(TargetRef::Url(url.trim().to_string())),
        _ => Err(Error::validation("post event needs `file` or `url`")),
    }
}

fn edit(data: &Value, action: Action) -> Result<Option<Edit>> {
    let Some(properties) = data.get("micropub") else {
        return Ok(None);
    };
    let kind = if action == Action::Add {
        EditKind::Add
    } else {
        match data.get("actionkey") {
            Some(key) => decode(key, "actionkey")?,
            None => return Err(Error::validation("update with `micropub` needs `actionkey`")),
        }
    };

    match properties {
        Value::Object(map) => Ok(Some(Edit {
            kind,
            content: string_list(map.get("content")),
            category: string_list(map.get("category")),
        })),
        // `delete: ["category"]` names properties to drop outright
        Value::Array(_) if kind == EditKind::Delete => Ok(Some(Edit {
            kind,
            content: None,
            category: None,
        })),
        _ => Err(Error::validation(format!(
            "`micropub` must be an object for `{}`",
            action
        ))),
    }
}

/// Micropub values are arrays, but a bare string is accepted too.
pub(crate) fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_envelope_round_trip() {
        let env = Envelope::new(EventType::Post, Some(Action::Delete), json!({"url": "/a.html"}));
        let back = Envelope::from_json(&env.to_json()).unwrap();
        assert_eq!(env, back);
        assert!(back.key.starts_with("kaku-event::post::delete::"));
    }

    #[test]
    fn test_micropub_create() {
        let env = envelope(json!({
            "type": "post", "action": "create",
            "data": {
                "slug": "hello-world", "title": "Hello",
                "timestamp": "2024-03-10 10:00:00",
                "micropub": {"content": ["Hi there"]}
            }
        }));
        let Event::PostCreate(PostCreate::Micropub(create)) = Event::from_envelope(&env).unwrap()
        else {
            panic!("expected micropub create");
        };
        assert_eq!(create.slug, "hello-world");
        assert_eq!(create.timestamp.to_string(), "2024-03-10 10:00:00");
    }

    #[test]
    fn test_micropub_create_slug_from_title() {
        let create = |data: Value| {
            let env = envelope(json!({"type": "post", "action": "create", "data": data}));
            match Event::from_envelope(&env) {
                Ok(Event::PostCreate(PostCreate::Micropub(create))) => Ok(create.slug),
                Ok(other) => panic!("expected micropub create, got {other:?}"),
                Err(e) => Err(e),
            }
        };
        let slug = create(json!({
            "title": "Café Crème, again!",
            "timestamp": "2024-03-10 10:00:00",
            "micropub": {"content": ["Hi"]}
        }));
        assert_eq!(slug.unwrap(), "cafe-creme-again");

        let slug = create(json!({
            "slug": "  ", "title": "Hello World",
            "timestamp": "2024-03-10 10:00:00",
            "micropub": {}
        }));
        assert_eq!(slug.unwrap(), "hello-world");

        let err = create(json!({
            "title": "!!!",
            "timestamp": "2024-03-10 10:00:00",
            "micropub": {}
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_gather_create() {
        let env = envelope(json!({
            "type": "post", "action": "create",
            "data": {"path": "/c/2024/070", "file": "hello"}
        }));
        assert_eq!(
            Event::from_envelope(&env).unwrap(),
            Event::PostCreate(PostCreate::Path(FileRef {
                path: Some("/c/2024/070".into()),
                file: "hello".into(),
            }))
        );
    }

    #[test]
    fn test_create_missing_fields_is_validation() {
        let env = envelope(json!({
            "type": "post", "action": "create",
            "data": {"slug": "x", "title": "X"}
        }));
        let err = Event::from_envelope(&env).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_update_replace() {
        let env = envelope(json!({
            "type": "post", "action": "update",
            "data": {
                "url": "https://bear.im/bearlog/2024/070/hello.html",
                "actionkey": "replace",
                "micropub": {"content": ["new"], "category": ["a", "b"]}
            }
        }));
        let Event::PostUpdate(update) = Event::from_envelope(&env).unwrap() else {
            panic!("expected update");
        };
        let edit = update.edit.unwrap();
        assert_eq!(edit.kind, EditKind::Replace);
        assert_eq!(edit.content, Some(vec!["new".to_string()]));
        assert_eq!(edit.category, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_add_action_forces_add_edit() {
        let env = envelope(json!({
            "type": "post", "action": "add",
            "data": {"file": "/c/2024/070/hello", "micropub": {"category": "x"}}
        }));
        let Event::PostUpdate(update) = Event::from_envelope(&env).unwrap() else {
            panic!("expected update");
        };
        assert_eq!(update.edit.unwrap().kind, EditKind::Add);
    }

    #[test]
    fn test_delete_property_list_clears() {
        let env = envelope(json!({
            "type": "post", "action": "update",
            "data": {"url": "/x.html", "actionkey": "delete", "micropub": ["category"]}
        }));
        let Event::PostUpdate(update) = Event::from_envelope(&env).unwrap() else {
            panic!("expected update");
        };
        let edit = update.edit.unwrap();
        assert_eq!(edit.kind, EditKind::Delete);
        assert!(edit.category.is_none());
    }

    #[test]
    fn test_gather_update_has_no_edit() {
        let env = envelope(json!({
            "type": "post", "action": "update",
            "data": {"path": "/c/2024/070", "file": "hello"}
        }));
        let Event::PostUpdate(update) = Event::from_envelope(&env).unwrap() else {
            panic!("expected update");
        };
        assert!(update.edit.is_none());
    }

    #[test]
    fn test_rejects_unknown_shapes() {
        for value in [
            json!({"type": "post", "action": "delete", "data": {}}),
            json!({"type": "post", "data": {"url": "/x"}}),
            json!({"type": "mention", "action": "undelete", "data": {
                "sourceURL": "https://a.example/p", "targetURL": "https://b.example/q"}}),
            json!({"type": "mention", "action": "create", "data": {"sourceURL": 1}}),
            json!({"type": "post", "action": "update", "data": {
                "url": "/x", "actionkey": "upsert", "micropub": {}}}),
        ] {
            let err = Event::from_envelope(&envelope(value)).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{err}");
        }
    }

    #[test]
    fn test_unknown_type_fails_to_parse() {
        assert!(Envelope::from_json(r#"{"type": "bogus", "data": {}}"#).is_err());
    }

    #[test]
    fn test_gather_event() {
        let env = envelope(json!({"type": "gather", "action": null, "data": {"file": "a.md", "force": true}}));
        assert_eq!(
            Event::from_envelope(&env).unwrap(),
            Event::Gather(GatherRequest {
                file: Some("a.md".into()),
                force: true,
            })
        );
    }
}
