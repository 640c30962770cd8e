//! Events exchanged between producers and the dispatcher.
//!
//! # Module Structure
//!
//! ```text
//! event/
//! ├── key.rs      # EventKey, EventType, Action
//! └── payload.rs  # Envelope (wire) and Event (typed)
//! ```

mod key;
mod payload;

pub use key::{Action, EVENT_PREFIX, EventKey, EventType, FAILED_PREFIX};
pub use payload::{
    Edit, EditKind, Envelope, Event, FileRef, GatherRequest, MicropubCreate, PostCreate,
    PostUpdate, TargetRef,
};
pub(crate) use payload::string_list;
