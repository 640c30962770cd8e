//! Webmentions, both directions.
//!
//! # Module Structure
//!
//! ```text
//! mention/
//! ├── inbound.rs    # received mentions: dedup, upsert, verify
//! ├── outbound.rs   # Reconciler: notify linked pages
//! ├── discover.rs   # link / endpoint / status-meta scanning (tl)
//! ├── transport.rs  # MentionTransport trait, reqwest implementation
//! └── mod.rs
//! ```

mod discover;
mod inbound;
mod outbound;
mod transport;

pub use discover::{discover_endpoint, endpoint_from_page, find_links, meta_status};
pub use inbound::{InboundMentions, Mention, StoredMention, mention_key};
pub use outbound::{OutboundMentions, OutboundRecord, ReconcileReport, Reconciler, outbound_key};
pub use transport::{HttpTransport, MentionTransport, Page, Sent};
