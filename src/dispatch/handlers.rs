//! Event handlers and the shared post render step.

use super::Dispatcher;
use crate::error::{Error, IoContext, Result};
use crate::event::{Action, GatherRequest, PostCreate, PostUpdate, TargetRef};
use crate::gather::Gatherer;
use crate::mention::{InboundMentions, Mention, Reconciler};
use crate::post::{Route, Target, apply_edit, synthesize};
use crate::render::PageRenderer;
use crate::utils::date::now;
use crate::utils::fs::write_atomic;
use crate::{debug, log};

impl Dispatcher {
    pub(super) fn handle_gather(&self, request: &GatherRequest) -> Result<()> {
        let report = Gatherer::new(self.store.content_root(), &self.publisher).run(request)?;
        log!(
            "gather";
            "{} events emitted, {} unchanged",
            report.emitted,
            report.unchanged
        );
        Ok(())
    }

    pub(super) fn handle_post_create(&self, create: &PostCreate) -> Result<()> {
        let target = match create {
            PostCreate::Path(file) => self.store.resolve_file(file),
            PostCreate::Micropub(create) => self
                .store
                .target_for(&Route::new(&create.timestamp, &create.slug)),
        };
        let _guard = self.locks.lock(target.base());

        if !self.store.exists(&target) {
            let PostCreate::Micropub(create) = create else {
                return Err(Error::not_found(format!(
                    "{} (no micropub data to create it from)",
                    target.md().display()
                )));
            };
            let post = synthesize(create, &self.config.site.author);
            match self.store.create(&target, &post) {
                Ok(()) => {
                    self.store.save(&target, &post)?;
                    log!("post"; "created [{}]", target.md().display());
                }
                // written by another process since the check
                Err(Error::Conflict(path)) => {
                    debug!("post"; "{} appeared meanwhile", path.display());
                }
                Err(e) => return Err(e),
            }
        }
        self.render_post(&target, Some(Action::Create))
    }

    pub(super) fn handle_post_update(&self, update: &PostUpdate) -> Result<()> {
        let target = self.existing(&update.target)?;
        let _guard = self.locks.lock(target.base());

        if let Some(edit) = &update.edit {
            let mut post = self.store.load(&target)?;
            if !apply_edit(&mut post, edit) {
                log!("post"; "{:?} edit changed nothing [{}]", edit.kind, target.base().display());
                return Ok(());
            }
            self.store.write_content(&target, &post)?;
            self.store.save(&target, &post)?;
        }
        self.render_post(&target, Some(Action::Update))
    }

    pub(super) fn handle_post_delete(&self, target: &TargetRef) -> Result<()> {
        let target = self.existing(target)?;
        let _guard = self.locks.lock(target.base());
        self.store.mark_deleted(&target)?;
        self.render_post(&target, Some(Action::Delete))
    }

    pub(super) fn handle_post_undelete(&self, target: &TargetRef) -> Result<()> {
        let target = self.existing(target)?;
        let _guard = self.locks.lock(target.base());
        if !self.store.clear_deleted(&target)? {
            log!("post"; "not deleted, nothing to undo [{}]", target.base().display());
            return Ok(());
        }
        self.render_post(&target, Some(Action::Undelete))
    }

    pub(super) fn handle_mention_upsert(&self, mention: &Mention) -> Result<()> {
        log!(
            "mention";
            "mention of [{}] within [{}]",
            mention.target_url,
            mention.source_url
        );
        let source = mention.source()?;
        let target = self.mention_target(mention)?;
        let _guard = self.locks.lock(target.base());

        let path = target.mentions();
        let mut inbound = InboundMentions::load(&path)?;
        let found = inbound.scan(&source);
        let action = if found.is_some() { "updated" } else { "added" };
        let key = inbound.upsert(found, mention.clone(), &now())?;
        inbound.save(&path)?;
        log!("mention"; "{} [{}]", action, key);

        self.render_post(&target, None)
    }

    /// Removal happens on the next verify pass; just re-render.
    pub(super) fn handle_mention_delete(&self, mention: &Mention) -> Result<()> {
        log!(
            "mention";
            "mention delete of [{}] within [{}]",
            mention.target_url,
            mention.source_url
        );
        let target = self.mention_target(mention)?;
        let _guard = self.locks.lock(target.base());
        self.render_post(&target, None)
    }

    fn existing(&self, target: &TargetRef) -> Result<Target> {
        let target = self.store.resolve(target)?;
        if !self.store.exists(&target) {
            return Err(Error::not_found(target.md().display().to_string()));
        }
        Ok(target)
    }

    fn mention_target(&self, mention: &Mention) -> Result<Target> {
        self.existing(&TargetRef::Url(mention.target_url.trim().to_string()))
    }

    /// Render one post: article fragment, page, metadata, then outbound
    /// reconciliation. The caller holds the target lock.
    fn render_post(&self, target: &Target, action: Option<Action>) -> Result<()> {
        let mut post = self.store.load(target)?;
        let deleted = self.store.is_deleted(target);

        if action == Some(Action::Update) {
            post.updated = Some(now());
        }

        let mentions_path = target.mentions();
        let mut inbound = InboundMentions::load(&mentions_path)?;
        if deleted {
            log!("post"; "marked as deleted [{}]", target.base().display());
            if action == Some(Action::Delete) && post.deleted.is_none() {
                post.deleted = Some(now());
            }
        } else {
            log!("post"; "rendering [{}]", target.base().display());
            post.deleted = None;
            if !inbound.verify(self.services.transport.as_ref()).is_empty() {
                inbound.save(&mentions_path)?;
            }
        }

        let url = self.store.absolute_url(&post);
        let mentions: Vec<Mention> = inbound.mentions().cloned().collect();
        let pages = PageRenderer {
            renderer: self.renderer.as_ref(),
            site: &self.config.site,
            embed: &self.embed,
        };
        let rendered = pages.render(&post, &url, &mentions, deleted)?;

        let fragment = target.html();
        write_atomic(&fragment, rendered.article.as_bytes()).at(&fragment)?;
        let page = post
            .route
            .dir(&self.config.paths.output)
            .join(format!("{}.html", post.route.slug));
        write_atomic(&page, rendered.page.as_bytes()).at(&page)?;
        self.store.save(target, &post)?;

        let reconciler = Reconciler::new(
            self.services.ledger.as_ref(),
            self.services.transport.as_ref(),
        );
        match reconciler.reconcile(
            &url,
            &rendered.article,
            &target.outbound(),
            self.config.webmention.resend_on_render,
        ) {
            Ok(report) => debug!("outbound"; "{:?} [{}]", report, url),
            Err(e) => log!("outbound"; "reconciliation failed for [{}]: {}", url, e),
        }
        Ok(())
    }
}
