//! Error taxonomy for event handling.
//!
//! Each variant maps to one propagation rule in the dispatcher:
//!
//! | Variant      | Dispatcher behaviour                                  |
//! |--------------|-------------------------------------------------------|
//! | `NotFound`   | logged with the event key, event skipped               |
//! | `Conflict`   | logged, event skipped                                  |
//! | `Validation` | logged with the event key, event skipped               |
//! | `Network`    | caught per link / per mention, never reaches the top   |
//! | `Persistence`| event marked failed and kept for inspection            |

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: `{0}` already exists")]
    Conflict(PathBuf),

    #[error("invalid event payload: {0}")]
    Validation(String),

    #[error("network error for `{url}`: {message}")]
    Network { url: String, message: String },

    #[error("persistence error at `{path}`")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record at `{path}`")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn corrupt(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Errors that skip the event instead of failing it.
    pub const fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Conflict(_) | Self::Validation(_)
        )
    }
}

/// Attach a path to an `io::Result`.
pub trait IoContext<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
