//! Directory scanner: turn the content tree into post events.
//!
//! Gather never handles posts itself. It classifies each content file by the
//! state of its sibling files and publishes one post event per file that
//! needs work; the dispatcher picks them up like any other event.

use jwalk::WalkDir;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::bus::Publisher;
use crate::error::{Error, Result};
use crate::event::{Action, Envelope, EventType, GatherRequest};
use crate::post::Target;
use crate::utils::mtime::is_newer_than;
use crate::{debug, log};

/// What a content file needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A deletion marker exists.
    Delete,
    /// Metadata exists but content is newer (or a forced pass).
    Update,
    Unchanged,
    /// No metadata yet.
    Create,
}

impl Classification {
    /// Event action to emit, `None` for files that need nothing.
    pub const fn action(self) -> Option<Action> {
        match self {
            Self::Delete => Some(Action::Delete),
            Self::Update => Some(Action::Update),
            Self::Create => Some(Action::Create),
            Self::Unchanged => None,
        }
    }
}

pub fn classify(target: &Target, force: bool) -> Classification {
    if target.deleted().exists() {
        return Classification::Delete;
    }
    let json = target.json();
    if !json.exists() {
        return Classification::Create;
    }
    if force || is_newer_than(&target.md(), &json) {
        Classification::Update
    } else {
        Classification::Unchanged
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatherReport {
    pub emitted: usize,
    pub unchanged: usize,
}

pub struct Gatherer<'a> {
    content_root: &'a Path,
    publisher: &'a Publisher,
}

impl<'a> Gatherer<'a> {
    pub fn new(content_root: &'a Path, publisher: &'a Publisher) -> Self {
        Self {
            content_root,
            publisher,
        }
    }

    pub fn run(&self, request: &GatherRequest) -> Result<GatherReport> {
        log!(
            "gather";
            "gather [{}] [{}] force={}",
            self.content_root.display(),
            request.file.as_ref().map(|f| f.display().to_string()).unwrap_or_default(),
            request.force
        );
        match &request.file {
            Some(file) => self.one(file, request.force),
            None => self.walk(request.force),
        }
    }

    fn walk(&self, force: bool) -> Result<GatherReport> {
        let mut files: Vec<PathBuf> = WalkDir::new(self.content_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path())
            .filter(|p| is_content_file(p))
            .collect();
        files.sort();

        let mut report = GatherReport::default();
        for md in &files {
            self.emit(md, force, &mut report)?;
        }
        Ok(report)
    }

    fn one(&self, file: &Path, force: bool) -> Result<GatherReport> {
        let md = self
            .resolve(file)
            .ok_or_else(|| Error::not_found(file.display().to_string()))?;
        if !is_content_file(&md) {
            return Err(Error::validation(format!(
                "`{}` is not a content file",
                md.display()
            )));
        }
        let mut report = GatherReport::default();
        self.emit(&md, force, &mut report)?;
        Ok(report)
    }

    /// As given (with `~` expansion), then relative to the content root.
    fn resolve(&self, file: &Path) -> Option<PathBuf> {
        let expanded = PathBuf::from(shellexpand::tilde(&file.to_string_lossy()).into_owned());
        if expanded.is_file() {
            return Some(expanded);
        }
        let rooted = self.content_root.join(&expanded);
        rooted.is_file().then_some(rooted)
    }

    fn emit(&self, md: &Path, force: bool, report: &mut GatherReport) -> Result<()> {
        let target = Target::new(md.with_extension(""));
        let state = classify(&target, force);
        let Some(action) = state.action() else {
            debug!("gather"; "unchanged [{}]", md.display());
            report.unchanged += 1;
            return Ok(());
        };

        let path = md.parent().unwrap_or(self.content_root);
        let envelope = Envelope::new(
            EventType::Post,
            Some(action),
            json!({ "path": path, "file": target.stem() }),
        );
        let key = self.publisher.publish(&envelope)?;
        log!("gather"; "{} [{}] {}", action, md.display(), key);
        report.emitted += 1;
        Ok(())
    }
}

fn is_content_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}
