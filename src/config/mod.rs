//! Worker configuration loaded from `kaku.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [site] [paths] [templates] [events] [webmention]
//! ├── error          # ConfigError, ConfigDiagnostics
//! └── mod.rs         # KakuConfig (this file)
//! ```
//!
//! The loaded configuration is immutable and handed to every component
//! constructor; nothing reads it from a global.

mod error;
pub mod section;

pub use error::{ConfigDiagnostics, ConfigError};
pub use section::{EventsConfig, PathsConfig, SiteConfig, TemplatesConfig, WebmentionConfig};

use crate::log;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing kaku.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KakuConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory relative paths resolve against (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub webmention: WebmentionConfig,
}

impl KakuConfig {
    /// Locate, parse, normalize and validate the configuration.
    pub fn load(config_name: &Path) -> Result<Self> {
        let config_path = find_config_file(config_name).with_context(|| {
            format!("config file `{}` not found", config_name.display())
        })?;
        let mut config = Self::from_path(&config_path)?;

        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = config_path;
        config.finalize(&root);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            log!("warning"; "unknown fields in {}, ignoring:", path.display());
            for field in &ignored {
                log!("warning"; "- {}", field);
            }
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Resolve paths against `root`.
    pub fn finalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();
        self.paths.normalize(root);
    }

    /// Validate every section, collecting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.site.validate(&mut diag);
        self.paths.validate(&mut diag);
        self.events.validate(&mut diag);
        self.webmention.validate(&mut diag);
        diag.into_result()
    }

    /// Configuration rooted at `root` with every default, for tests and tooling.
    pub fn rooted(root: &Path) -> Self {
        let mut config = Self::default();
        config.finalize(root);
        config
    }
}

/// Find config file by searching upward from current directory
///
/// Returns the absolute path to the config file if found
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

/// Parse config; panics on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> KakuConfig {
    let config = format!("[site]\ntitle = \"Test\"\n{extra}");
    let (parsed, ignored) = KakuConfig::parse_with_ignored(&config).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
