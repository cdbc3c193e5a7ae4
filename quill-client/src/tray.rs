use std::{
    cell::{Cell, Ref, RefCell},
    collections::VecDeque,
    future::Future,
};

use crate::{
    api::{
        cancellation, validate_content, Actor, Cancellation, Comment, CommentId, CommentService,
        Error, Family, Post, PostId, Session, Teardown,
    },
    mode::{Composer, Mode, Submission},
    view::{
        reply_label, CommentEntry, ComposeView, Notification, ReplyAffordance, ReplyEntry,
        TrayView, COMPOSE_PLACEHOLDER,
    },
    CommentStore, Expansion, ReplyCache,
};

/// The kinds of mutation requests, at most one of which is in flight
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Request {
    Create,
    Edit,
    Delete,
    Reply,
}

struct TrayState {
    post: Post,
    loaded: bool,
    store: CommentStore,
    cache: ReplyCache,
    expansion: Expansion,
    composer: Composer,
    notifications: VecDeque<Notification>,
}

/// Comments of one viewed post.
///
/// Built when the post view opens and dropped when it closes: nothing carries over
/// from one post to the next. All the methods take `&self` so that the view can
/// keep rendering while requests are in flight; completions may come back in any
/// order. Responses are applied only once the service confirmed them, and a single
/// mutation may be outstanding at any time.
pub struct CommentTray<S, A> {
    service: S,
    session: A,
    cancel: Cancellation,
    teardown: RefCell<Option<Teardown>>,
    in_flight: Cell<Option<Request>>,
    state: RefCell<TrayState>,
}

/// Clears the in-flight marker once the mutation is over, including when its
/// future gets dropped before completion
struct InFlight<'a>(&'a Cell<Option<Request>>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(None);
    }
}

/// A first fetch of replies. Unless completed, the panel goes back to closed
/// so that the next expand retries.
struct FirstFetch<'a> {
    state: &'a RefCell<TrayState>,
    parent: CommentId,
    done: bool,
}

impl FirstFetch<'_> {
    fn complete(mut self) {
        self.done = true;
        self.state.borrow_mut().expansion.mark_open(self.parent);
    }
}

impl Drop for FirstFetch<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        match self.state.try_borrow_mut() {
            Ok(mut st) => st.expansion.abandon_open(&self.parent),
            Err(_) => {
                tracing::warn!(parent = ?self.parent, "could not abandon reply fetch, state is borrowed")
            }
        }
    }
}

impl<S: CommentService, A: Session> CommentTray<S, A> {
    pub fn new(service: S, session: A, post: Post) -> CommentTray<S, A> {
        let (teardown, cancel) = cancellation();
        CommentTray {
            service,
            session,
            cancel,
            teardown: RefCell::new(Some(teardown)),
            in_flight: Cell::new(None),
            state: RefCell::new(TrayState {
                post,
                loaded: false,
                store: CommentStore::new(),
                cache: ReplyCache::new(),
                expansion: Expansion::new(),
                composer: Composer::new(),
                notifications: VecDeque::new(),
            }),
        }
    }

    /// Builds the tray and runs the initial load. A failed load is reported
    /// through the notifications and leaves the tray empty.
    pub async fn mount(service: S, session: A, post: Post) -> CommentTray<S, A> {
        let tray = CommentTray::new(service, session, post);
        if let Err(err) = tray.load_initial().await {
            tracing::debug!(?err, "initial comment load failed");
        }
        tray
    }

    /// Tears the view down: in-flight requests resolve to `Error::Aborted` and
    /// their responses are never applied
    pub fn unmount(&self) {
        if let Some(teardown) = self.teardown.borrow_mut().take() {
            tracing::debug!(post = ?self.post_id(), "unmounting comment tray");
            teardown.fire();
        }
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    pub fn post_id(&self) -> PostId {
        self.state.borrow().post.id
    }

    pub fn total_comments(&self) -> u64 {
        self.state.borrow().post.total_comments
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().loaded
    }

    /// Must not be held across an await point
    pub fn store(&self) -> Ref<'_, CommentStore> {
        Ref::map(self.state.borrow(), |s| &s.store)
    }

    /// Must not be held across an await point
    pub fn cache(&self) -> Ref<'_, ReplyCache> {
        Ref::map(self.state.borrow(), |s| &s.cache)
    }

    pub fn is_expanded(&self, parent: &CommentId) -> bool {
        self.state.borrow().expansion.is_open(parent)
    }

    pub fn mode(&self) -> Mode {
        self.state.borrow().composer.mode().clone()
    }

    pub fn compose_text(&self) -> String {
        String::from(self.state.borrow().composer.text())
    }

    pub fn set_compose_text(&self, text: impl Into<String>) {
        self.state.borrow_mut().composer.set_text(text.into());
    }

    pub fn in_flight(&self) -> Option<Request> {
        self.in_flight.get()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight().is_some()
    }

    /// Whether the submit control should be enabled
    pub fn can_submit(&self) -> bool {
        let st = self.state.borrow();
        !self.cancel.is_cancelled()
            && self.session.is_authenticated()
            && self.in_flight.get().is_none()
            && validate_content(st.composer.text()).is_ok()
    }

    /// Only authors may edit or delete their comments
    pub fn can_modify(&self, comment: &Comment) -> bool {
        self.session
            .current_actor()
            .map_or(false, |a| a.id == comment.author_id)
    }

    pub fn take_notifications(&self) -> Vec<Notification> {
        self.state.borrow_mut().notifications.drain(..).collect()
    }

    /// Looks a comment up, at top level first and then in the fetched replies
    pub fn find(&self, id: &CommentId) -> Option<Comment> {
        let st = self.state.borrow();
        st.store
            .get(id)
            .or_else(|| st.cache.find_reply(id))
            .cloned()
    }

    pub async fn load_initial(&self) -> Result<(), Error> {
        self.try_load_initial().await.map_err(|e| self.report(e))
    }

    pub async fn create(&self, content: &str) -> Result<CommentId, Error> {
        self.try_create(content).await.map_err(|e| self.report(e))
    }

    /// Edits `id`, wherever it lives
    pub async fn edit(&self, id: CommentId, content: &str) -> Result<(), Error> {
        let res = match self.find(&id) {
            Some(target) => self.try_edit(target, content).await,
            None => Err(Error::UnknownTarget(id)),
        };
        res.map_err(|e| self.report(e))
    }

    pub async fn edit_reply(
        &self,
        parent: CommentId,
        reply: CommentId,
        content: &str,
    ) -> Result<(), Error> {
        let res = match self.find_in_bundle(&parent, &reply) {
            Some(target) => self.try_edit(target, content).await,
            None => Err(Error::UnknownTarget(reply)),
        };
        res.map_err(|e| self.report(e))
    }

    /// Deletes `id`, wherever it lives
    pub async fn delete(&self, id: CommentId) -> Result<(), Error> {
        let res = match self.find(&id) {
            Some(target) => self.try_delete(target).await,
            None => Err(Error::UnknownTarget(id)),
        };
        res.map_err(|e| self.report(e))
    }

    pub async fn delete_reply(&self, parent: CommentId, reply: CommentId) -> Result<(), Error> {
        let res = match self.find_in_bundle(&parent, &reply) {
            Some(target) => self.try_delete(target).await,
            None => Err(Error::UnknownTarget(reply)),
        };
        res.map_err(|e| self.report(e))
    }

    pub async fn create_reply(&self, parent: CommentId, content: &str) -> Result<CommentId, Error> {
        self.try_create_reply(parent, content)
            .await
            .map_err(|e| self.report(e))
    }

    /// Fetches `parent` and its replies, replacing whatever was cached for it
    pub async fn fetch_family(&self, parent: CommentId) -> Result<(), Error> {
        self.try_fetch_family(parent)
            .await
            .map_err(|e| self.report(e))
    }

    /// Opens the reply panel of `parent`, fetching its replies only if they were
    /// never fetched before
    pub async fn expand(&self, parent: CommentId) -> Result<(), Error> {
        self.try_expand(parent).await.map_err(|e| self.report(e))
    }

    /// Closes the reply panel of `parent`; its replies stay cached
    pub fn collapse(&self, parent: &CommentId) -> bool {
        self.state.borrow_mut().expansion.collapse(parent)
    }

    pub fn start_edit(&self, id: CommentId) -> Result<(), Error> {
        self.try_start_edit(id).map_err(|e| self.report(e))
    }

    pub fn start_reply(&self, parent: CommentId) -> Result<(), Error> {
        self.try_start_reply(parent).map_err(|e| self.report(e))
    }

    pub fn cancel_compose(&self) {
        self.state.borrow_mut().composer.cancel();
    }

    /// Sends the compose field according to the current mode
    pub async fn submit(&self) -> Result<(), Error> {
        self.try_submit().await.map_err(|e| self.report(e))
    }

    pub fn view(&self) -> TrayView {
        let actor = self.session.current_actor();
        let can_submit = self.can_submit();
        let st = self.state.borrow();
        let owned = |c: &Comment| actor.as_ref().map_or(false, |a| a.id == c.author_id);
        let by_post_author = |c: &Comment| c.author_id == st.post.author_id;

        let entries = st
            .store
            .comments()
            .iter()
            .map(|c| {
                let replies = match c.reply_count() {
                    0 => ReplyAffordance::None,
                    n => {
                        let label = reply_label(n);
                        match st.cache.get(&c.id) {
                            Some(bundle) if st.expansion.is_open(&c.id) => {
                                ReplyAffordance::Expanded {
                                    label,
                                    replies: bundle
                                        .replies
                                        .iter()
                                        .map(|r| ReplyEntry {
                                            comment: r.clone(),
                                            by_post_author: by_post_author(r),
                                            can_modify: owned(r),
                                            replying_to: c.author.username.clone(),
                                        })
                                        .collect(),
                                }
                            }
                            _ if st.expansion.is_opening(&c.id) => {
                                ReplyAffordance::Opening { label }
                            }
                            _ => ReplyAffordance::Collapsed { label },
                        }
                    }
                };
                CommentEntry {
                    comment: c.clone(),
                    by_post_author: by_post_author(c),
                    can_modify: owned(c),
                    can_reply: actor.is_some(),
                    replies,
                }
            })
            .collect();

        let (placeholder, banner) = match st.composer.mode() {
            Mode::Idle => (Some(COMPOSE_PLACEHOLDER), None),
            Mode::Editing(_) => (None, Some(String::from("Editing"))),
            Mode::Replying(p) => (None, Some(format!("Replying to @{}", p.author.username))),
        };

        TrayView {
            loaded: st.loaded,
            total_comments: st.post.total_comments,
            entries,
            compose: ComposeView {
                text: String::from(st.composer.text()),
                placeholder,
                banner,
                submit_enabled: can_submit,
            },
        }
    }

    fn find_in_bundle(&self, parent: &CommentId, reply: &CommentId) -> Option<Comment> {
        let st = self.state.borrow();
        st.cache
            .get(parent)
            .and_then(|b| b.replies.iter().find(|r| r.id == *reply))
            .cloned()
    }

    fn notify(&self, n: Notification) {
        self.state.borrow_mut().notifications.push_back(n);
    }

    /// Surfaces the error to the user, then hands it back
    fn report(&self, err: Error) -> Error {
        match &err {
            Error::Aborted | Error::Busy => (),
            Error::Unauthenticated => self.notify(Notification::error("Login first.")),
            err => {
                if err.is_validation() {
                    tracing::debug!(?err, "rejected comment input");
                } else if err.is_from_service() {
                    tracing::error!(?err, "comment request failed");
                }
                self.notify(Notification::error(err.to_string()));
            }
        }
        err
    }

    fn alive(&self) -> Result<(), Error> {
        match self.cancel.is_cancelled() {
            true => Err(Error::Aborted),
            false => Ok(()),
        }
    }

    fn require_actor(&self) -> Result<Actor, Error> {
        self.session.current_actor().ok_or(Error::Unauthenticated)
    }

    fn require_owned(&self, target: &Comment) -> Result<(), Error> {
        match self.require_actor()? {
            a if a.id == target.author_id => Ok(()),
            _ => Err(Error::PermissionDenied),
        }
    }

    /// Waits for a service call. Once this returns `Ok`, the view is still alive
    /// and the result may be applied.
    async fn call<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let res = self.cancel.guard(fut).await;
        if self.cancel.is_cancelled() {
            if res.is_ok() {
                tracing::warn!("dropping completion for a torn-down comment tray");
            }
            return Err(Error::Aborted);
        }
        res
    }

    /// Same as `call`, for mutations: refuses to start while another one is
    /// outstanding
    async fn send<T, F>(&self, req: Request, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        if let Some(other) = self.in_flight.get() {
            tracing::debug!(?req, ?other, "refusing mutation while another is in flight");
            return Err(Error::Busy);
        }
        self.in_flight.set(Some(req));
        let _in_flight = InFlight(&self.in_flight);
        self.call(fut).await
    }

    async fn try_load_initial(&self) -> Result<(), Error> {
        self.alive()?;
        let ids = self.state.borrow().post.comment_ids.clone();
        let comments = match ids.is_empty() {
            true => {
                tracing::debug!("post has no comments, not fetching");
                Vec::new()
            }
            false => {
                self.call(self.service.list_by_ids(&ids, &self.cancel))
                    .await?
            }
        };
        let mut st = self.state.borrow_mut();
        st.store.load(comments);
        st.loaded = true;
        Ok(())
    }

    async fn try_create(&self, content: &str) -> Result<CommentId, Error> {
        self.alive()?;
        self.require_actor()?;
        let content = validate_content(content)?;
        let post = self.post_id();
        let comment = self
            .send(
                Request::Create,
                self.service.create(content, post, &self.cancel),
            )
            .await?;

        let id = comment.id;
        let mut st = self.state.borrow_mut();
        st.post.comment_ids.push(id);
        st.post.total_comments += 1;
        st.store.append(comment);
        st.notifications
            .push_back(Notification::success("comment added."));
        tracing::info!(?id, "comment added");
        Ok(id)
    }

    async fn try_edit(&self, target: Comment, content: &str) -> Result<(), Error> {
        self.alive()?;
        self.require_owned(&target)?;
        let content = validate_content(content)?;
        let mut updated = self
            .send(
                Request::Edit,
                self.service.edit(content, target.id, &self.cancel),
            )
            .await?;

        let mut st = self.state.borrow_mut();
        let applied = match target.parent_id {
            None => {
                // reply refs only move together with the cached replies
                if let Some(local) = st.store.get(&target.id) {
                    updated.reply_refs = local.reply_refs.clone();
                }
                st.store.replace(updated)
            }
            Some(_) => st.cache.replace_reply(updated),
        };
        if !applied {
            tracing::warn!(id = ?target.id, "edited comment vanished from the view");
        }
        st.notifications
            .push_back(Notification::success("comment updated."));
        tracing::info!(id = ?target.id, "comment updated");
        Ok(())
    }

    async fn try_delete(&self, target: Comment) -> Result<(), Error> {
        self.alive()?;
        self.require_owned(&target)?;
        let id = target.id;
        self.send(Request::Delete, self.service.delete(id, &self.cancel))
            .await?;

        let mut st = self.state.borrow_mut();
        match target.parent_id {
            None => {
                st.store.remove(&id);
                st.post.comment_ids.retain(|c| *c != id);
                st.expansion.collapse(&id);
            }
            Some(parent) => {
                st.cache.remove_reply(&parent, &id);
                if !st.store.remove_reply_ref(&parent, &id) {
                    if let Some(p) = st.cache.find_reply_mut(&parent) {
                        p.reply_refs.retain(|r| *r != id);
                    }
                }
            }
        }
        st.composer.forget(&id);
        st.post.total_comments = st.post.total_comments.saturating_sub(1);
        st.notifications
            .push_back(Notification::success("comment deleted."));
        tracing::info!(?id, "comment deleted");
        Ok(())
    }

    async fn try_create_reply(&self, parent: CommentId, content: &str) -> Result<CommentId, Error> {
        self.alive()?;
        self.require_actor()?;
        let content = validate_content(content)?;
        match self.find(&parent) {
            None => return Err(Error::UnknownTarget(parent)),
            Some(p) if p.is_reply() => return Err(Error::ReplyToReply(parent)),
            Some(_) => (),
        }
        let post = self.post_id();
        let mut reply = self
            .send(
                Request::Reply,
                self.service
                    .create_reply(content, post, parent, &self.cancel),
            )
            .await?;

        if reply.parent_id != Some(parent) {
            tracing::warn!(id = ?reply.id, ?parent, got = ?reply.parent_id, "service returned a reply with another parent");
            reply.parent_id = Some(parent);
        }
        let id = reply.id;
        let mut st = self.state.borrow_mut();
        // both sides of the reply count move together
        st.cache.append_reply(reply);
        if !st.store.add_reply_ref(&parent, id) {
            if let Some(p) = st.cache.find_reply_mut(&parent) {
                p.reply_refs.push(id);
            }
        }
        st.post.total_comments += 1;
        st.notifications
            .push_back(Notification::success("reply added."));
        tracing::info!(?id, ?parent, "reply added");
        Ok(id)
    }

    fn apply_family(&self, parent: CommentId, family: Family) {
        let Family { comment, replies } = family;
        let mut st = self.state.borrow_mut();
        if comment.id != parent {
            tracing::warn!(?parent, got = ?comment.id, "family fetch returned another comment");
        } else if !st.store.replace(comment.clone()) {
            if let Some(c) = st.cache.find_reply_mut(&parent) {
                *c = comment;
            }
        }
        st.cache.store(parent, replies);
    }

    async fn try_fetch_family(&self, parent: CommentId) -> Result<(), Error> {
        self.alive()?;
        let family = self
            .call(self.service.get_family(parent, &self.cancel))
            .await?;
        self.apply_family(parent, family);
        Ok(())
    }

    async fn try_expand(&self, parent: CommentId) -> Result<(), Error> {
        self.alive()?;
        {
            let mut st = self.state.borrow_mut();
            if st.expansion.is_open(&parent) {
                return Ok(());
            }
            if st.cache.contains(&parent) {
                st.expansion.mark_open(parent);
                return Ok(());
            }
            if !st.expansion.begin_open(parent) {
                tracing::debug!(?parent, "replies already being fetched");
                return Ok(());
            }
        }
        let first_fetch = FirstFetch {
            state: &self.state,
            parent,
            done: false,
        };
        let family = self
            .call(self.service.get_family(parent, &self.cancel))
            .await?;
        self.apply_family(parent, family);
        first_fetch.complete();
        Ok(())
    }

    fn try_start_edit(&self, id: CommentId) -> Result<(), Error> {
        self.alive()?;
        let target = self.find(&id).ok_or(Error::UnknownTarget(id))?;
        self.require_owned(&target)?;
        self.state.borrow_mut().composer.start_edit(target);
        Ok(())
    }

    fn try_start_reply(&self, parent: CommentId) -> Result<(), Error> {
        self.alive()?;
        self.require_actor()?;
        let target = self.find(&parent).ok_or(Error::UnknownTarget(parent))?;
        self.state.borrow_mut().composer.start_reply(target)
    }

    async fn try_submit(&self) -> Result<(), Error> {
        self.alive()?;
        self.require_actor()?;
        let (submission, generation) = {
            let st = self.state.borrow();
            (st.composer.submission()?, st.composer.generation())
        };
        match submission {
            Submission::Create { content } => self.try_create(&content).await.map(drop)?,
            Submission::Edit { comment, content } => {
                let target = self.find(&comment).ok_or(Error::UnknownTarget(comment))?;
                self.try_edit(target, &content).await?
            }
            Submission::EditReply {
                parent,
                reply,
                content,
            } => {
                let target = self
                    .find_in_bundle(&parent, &reply)
                    .ok_or(Error::UnknownTarget(reply))?;
                self.try_edit(target, &content).await?
            }
            Submission::Reply { parent, content } => {
                self.try_create_reply(parent, &content).await.map(drop)?
            }
        }
        let mut st = self.state.borrow_mut();
        // the user may have switched to another mode while this was in flight
        if st.composer.generation() == generation {
            st.composer.cancel();
        }
        Ok(())
    }
}
