//! Configuration section definitions.

mod events;
mod paths;
mod site;
mod templates;

pub use events::{EventsConfig, WebmentionConfig};
pub use paths::PathsConfig;
pub use site::SiteConfig;
pub use templates::TemplatesConfig;
