//! `[paths]` section configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ConfigDiagnostics;

/// Directories the worker reads from and writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Content tree: `{year}/{doy}/{slug}.md` plus sidecar files.
    pub content: PathBuf,
    /// Rendered site output.
    pub output: PathBuf,
    /// Template directory. Embedded defaults are used when unset.
    pub templates: Option<PathBuf>,
    /// Worker state: ledger records and bus spools.
    pub state: PathBuf,
    /// Optional file every log line is appended to.
    pub log_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content: "content".into(),
            output: "public".into(),
            templates: None,
            state: ".kaku".into(),
            log_file: None,
        }
    }
}

impl PathsConfig {
    /// Directory holding one file per ledger key.
    pub fn ledger_dir(&self) -> PathBuf {
        self.state.join("ledger")
    }

    /// Directory holding one spool subdirectory per bus channel.
    pub fn spool_dir(&self) -> PathBuf {
        self.state.join("spool")
    }

    /// Resolve every path against `root`, with `~` expansion.
    pub fn normalize(&mut self, root: &Path) {
        self.content = resolve(root, &self.content);
        self.output = resolve(root, &self.output);
        self.state = resolve(root, &self.state);
        self.templates = self.templates.take().map(|p| resolve(root, &p));
        self.log_file = self.log_file.take().map(|p| resolve(root, &p));
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.content.as_os_str().is_empty() {
            diag.error("paths.content", "must not be empty");
        }
        if self.output.as_os_str().is_empty() {
            diag.error("paths.output", "must not be empty");
        }
        if self.content == self.output {
            diag.error("paths.output", "must differ from paths.content");
        }
        if let Some(templates) = &self.templates
            && !templates.is_dir()
        {
            diag.error(
                "paths.templates",
                format!("`{}` is not a directory", templates.display()),
            );
        }
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = PathBuf::from(expanded);
    if path.is_relative() {
        root.join(path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative_and_absolute() {
        let mut paths = PathsConfig {
            output: "/srv/site".into(),
            ..PathsConfig::default()
        };
        paths.normalize(Path::new("/home/bear"));
        assert_eq!(paths.content, PathBuf::from("/home/bear/content"));
        assert_eq!(paths.output, PathBuf::from("/srv/site"));
        assert_eq!(paths.ledger_dir(), PathBuf::from("/home/bear/.kaku/ledger"));
        assert_eq!(paths.spool_dir(), PathBuf::from("/home/bear/.kaku/spool"));
    }

    #[test]
    fn test_validate_same_dirs() {
        let paths = PathsConfig {
            content: "site".into(),
            output: "site".into(),
            ..PathsConfig::default()
        };
        let mut diag = ConfigDiagnostics::new();
        paths.validate(&mut diag);
        assert_eq!(diag.errors().len(), 1);
    }
}
