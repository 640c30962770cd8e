//! Event dispatcher: event key in, handled / skipped / failed out.
//!
//! Every event goes `received → dispatched → handled | failed`:
//!
//! 1. the key arrives on the bus and its payload is read from the ledger
//! 2. the payload is decoded and routed to one handler
//! 3. handled (or skipped) payloads expire after the retention window;
//!    failed payloads stay and get a `kaku-failed::{key}` record
//!
//! # Module Structure
//!
//! ```text
//! dispatch/
//! ├── handlers.rs  # post / mention / gather handlers, article render
//! ├── locks.rs     # TargetLocks
//! ├── shutdown.rs  # Ctrl+C flag
//! ├── worker.rs    # bus loop, replay
//! ├── tests.rs     # end-to-end scenarios over in-memory services
//! └── mod.rs       # Dispatcher (this file)
//! ```

mod handlers;
mod locks;
mod shutdown;
mod worker;

#[cfg(test)]
mod tests;

pub use locks::{TargetGuard, TargetLocks};
pub use shutdown::{is_shutdown, setup_shutdown_handler};
pub use worker::{Worker, WorkerStats, replay};

use serde_json::json;
use std::sync::Arc;

use crate::bus::{EventBus, Publisher};
use crate::config::KakuConfig;
use crate::error::{Error, Result};
use crate::event::{Envelope, Event, EventKey};
use crate::ledger::Ledger;
use crate::mention::MentionTransport;
use crate::post::PostStore;
use crate::render::{Render, TemplateRenderer, TemplateSet, regenerate_index};
use crate::utils::date::{format_timestamp, now};
use crate::{debug, log};

/// Final state of one delivered key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Handled,
    /// Not actionable (bad payload, missing post, …); logged and expired.
    Skipped(String),
    /// Persistence failure; payload kept for inspection and replay.
    Failed(String),
    /// Not a `kaku-event::` key.
    Ignored,
}

/// Shared collaborators of the dispatcher.
#[derive(Clone)]
pub struct Services {
    pub ledger: Arc<dyn Ledger>,
    pub bus: Arc<dyn EventBus>,
    pub transport: Arc<dyn MentionTransport>,
}

pub struct Dispatcher {
    config: KakuConfig,
    services: Services,
    publisher: Publisher,
    store: PostStore,
    renderer: Box<dyn Render>,
    /// Page head metadata template.
    embed: String,
    locks: TargetLocks,
}

impl Dispatcher {
    pub fn new(config: KakuConfig, templates: TemplateSet, services: Services) -> Self {
        let publisher = Publisher::new(
            Arc::clone(&services.ledger),
            Arc::clone(&services.bus),
            config.events.channel.clone(),
        );
        let store = PostStore::new(&config, templates.markdown.clone());
        let embed = templates.embed.clone();
        Self {
            config,
            services,
            publisher,
            store,
            renderer: Box::new(TemplateRenderer::new(templates)),
            embed,
            locks: TargetLocks::new(),
        }
    }

    pub fn config(&self) -> &KakuConfig {
        &self.config
    }

    pub fn store(&self) -> &PostStore {
        &self.store
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Process one key received from the bus.
    pub fn handle_key(&self, raw: &str) -> EventOutcome {
        let Some(key) = EventKey::parse(raw) else {
            log!("dispatch"; "ignoring non-event key [{}]", raw.trim());
            return EventOutcome::Ignored;
        };

        let ledger = &self.services.ledger;
        let payload = match ledger.get(key.as_str()) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                log!("dispatch"; "no payload for [{}], already expired?", key);
                return EventOutcome::Skipped("no payload".into());
            }
            Err(e) => return self.fail(&key, "load", &e),
        };

        let event = match Envelope::from_json(&payload).and_then(|env| Event::from_envelope(&env)) {
            Ok(event) => event,
            Err(e) => return self.finish(&key, "decode", Err(e)),
        };

        log!("dispatch"; "dispatching {} [{}]", event.operation(), key);
        let mut result = self.dispatch(&event);
        if event.affects_posts() {
            let index = self.regenerate_index();
            if result.is_ok() {
                result = index;
            } else if let Err(e) = index {
                log!("index"; "index rebuild failed: {}", e);
            }
        }
        self.finish(&key, event.operation(), result)
    }

    /// Route one decoded event to its handler.
    pub fn dispatch(&self, event: &Event) -> Result<()> {
        match event {
            Event::Gather(request) => self.handle_gather(request),
            Event::PostCreate(create) => self.handle_post_create(create),
            Event::PostUpdate(update) => self.handle_post_update(update),
            Event::PostDelete(target) => self.handle_post_delete(target),
            Event::PostUndelete(target) => self.handle_post_undelete(target),
            Event::MentionCreate(mention) | Event::MentionUpdate(mention) => {
                self.handle_mention_upsert(mention)
            }
            Event::MentionDelete(mention) => self.handle_mention_delete(mention),
        }
    }

    pub fn regenerate_index(&self) -> Result<()> {
        regenerate_index(
            &self.store,
            self.renderer.as_ref(),
            &self.config.site,
            &self.config.paths.output,
        )
        .map(|_| ())
    }

    fn finish(&self, key: &EventKey, operation: &str, result: Result<()>) -> EventOutcome {
        match result {
            Ok(()) => {
                self.retire(key);
                // a replayed failure that now succeeds
                if let Err(e) = self.services.ledger.delete(&key.failed_key()) {
                    debug!("dispatch"; "could not clear failure record: {}", e);
                }
                log!("dispatch"; "handled {} [{}]", operation, key);
                EventOutcome::Handled
            }
            Err(e) if e.is_skippable() => {
                log!("dispatch"; "skipping {} [{}]: {}", operation, key, e);
                self.retire(key);
                EventOutcome::Skipped(e.to_string())
            }
            Err(e) => self.fail(key, operation, &e),
        }
    }

    /// Expire a finished payload after the retention window.
    fn retire(&self, key: &EventKey) {
        let retention = self.config.events.retention();
        if let Err(e) = self.services.ledger.expire(key.as_str(), retention) {
            log!("dispatch"; "could not expire [{}]: {}", key, e);
        }
    }

    fn fail(&self, key: &EventKey, operation: &str, error: &Error) -> EventOutcome {
        let message = error_chain(error);
        log!("failed"; "{} [{}]: {}", operation, key, message);
        let record = json!({
            "key": key.as_str(),
            "operation": operation,
            "error": message,
            "at": format_timestamp(&now()),
        });
        if let Err(e) = self
            .services
            .ledger
            .set(&key.failed_key(), &record.to_string())
        {
            log!("failed"; "could not record failure of [{}]: {}", key, e);
        }
        EventOutcome::Failed(message)
    }
}

/// `error: cause: cause` on one line.
fn error_chain(error: &Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
