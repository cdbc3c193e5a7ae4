use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use futures::{
    channel::oneshot,
    future::{FutureExt, Shared},
};
use parking_lot::Mutex;
use quill_api::{
    validate_content, Actor, Author, Cancellation, Comment, CommentId, CommentService, Error,
    Family, Post, PostId, Time, UserId, Uuid,
};

/// Content left behind when a comment that still has replies gets deleted
pub const TOMBSTONE: &str = "deleted";

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Op {
    ListByIds,
    GetFamily,
    Create,
    Edit,
    Delete,
    CreateReply,
}

/// In-memory comment backend, behaving like the real server as far as the
/// client can tell
pub struct MockServer(Mutex<State>);

struct State {
    users: BTreeMap<UserId, Author>,
    acting_as: Option<UserId>,
    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
    clock: Time,
    calls: HashMap<Op, usize>,
    failures: HashMap<Op, VecDeque<Error>>,
    gate: Option<Shared<oneshot::Receiver<()>>>,
}

impl State {
    fn tick(&mut self) -> Time {
        self.clock = self.clock + Duration::seconds(1);
        self.clock
    }

    fn actor(&self) -> Result<UserId, Error> {
        self.acting_as.ok_or(Error::Unauthenticated)
    }

    fn author(&self, user: &UserId) -> Author {
        self.users.get(user).cloned().unwrap_or_else(|| Author {
            username: String::from("unknown"),
            display_name: String::from("Unknown"),
            avatar_url: None,
        })
    }

    fn insert(
        &mut self,
        post: PostId,
        author_id: UserId,
        content: &str,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, Error> {
        let now = self.tick();
        let comment = Comment {
            id: CommentId(Uuid::new_v4()),
            post_id: post,
            author_id,
            author: self.author(&author_id),
            content: String::from(content),
            created_at: now,
            modified_at: now,
            parent_id,
            reply_refs: Vec::new(),
        };
        let p = self.posts.get_mut(&post).ok_or(Error::NotFound)?;
        match parent_id {
            None => p.comment_ids.push(comment.id),
            Some(parent) => self
                .comments
                .get_mut(&parent)
                .ok_or(Error::NotFound)?
                .reply_refs
                .push(comment.id),
        }
        p.total_comments += 1;
        self.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer(Mutex::new(State {
            users: BTreeMap::new(),
            acting_as: None,
            posts: BTreeMap::new(),
            comments: BTreeMap::new(),
            clock: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            calls: HashMap::new(),
            failures: HashMap::new(),
            gate: None,
        }))
    }

    pub fn admin_create_user(&self, username: &str, display_name: &str) -> UserId {
        let id = UserId(Uuid::new_v4());
        self.0.lock().users.insert(
            id,
            Author {
                username: String::from(username),
                display_name: String::from(display_name),
                avatar_url: None,
            },
        );
        id
    }

    /// The actor as the authentication layer would expose it
    pub fn actor(&self, id: UserId) -> Option<Actor> {
        let state = self.0.lock();
        state.users.get(&id).map(|a| Actor {
            id,
            username: a.username.clone(),
            display_name: a.display_name.clone(),
            avatar_url: a.avatar_url.clone(),
        })
    }

    /// Sets whose credentials the following calls carry
    pub fn act_as(&self, user: Option<UserId>) {
        self.0.lock().acting_as = user;
    }

    pub fn create_post(&self, author_id: UserId) -> PostId {
        let id = PostId(Uuid::new_v4());
        self.0.lock().posts.insert(
            id,
            Post {
                id,
                author_id,
                comment_ids: Vec::new(),
                total_comments: 0,
            },
        );
        id
    }

    pub fn post(&self, id: PostId) -> Option<Post> {
        self.0.lock().posts.get(&id).cloned()
    }

    pub fn comment(&self, id: CommentId) -> Option<Comment> {
        self.0.lock().comments.get(&id).cloned()
    }

    /// Adds a comment directly, bypassing the service interface
    pub fn test_add_comment(&self, post: PostId, author: UserId, content: &str) -> CommentId {
        self.0
            .lock()
            .insert(post, author, content, None)
            .expect("adding test comment to unknown post")
            .id
    }

    pub fn test_add_reply(
        &self,
        post: PostId,
        parent: CommentId,
        author: UserId,
        content: &str,
    ) -> CommentId {
        self.0
            .lock()
            .insert(post, author, content, Some(parent))
            .expect("adding test reply to unknown post or parent")
            .id
    }

    /// Makes the next call to `op` fail with `err` once it is released
    pub fn fail_next(&self, op: Op, err: Error) {
        self.0
            .lock()
            .failures
            .entry(op)
            .or_insert_with(VecDeque::new)
            .push_back(err);
    }

    /// Number of times `op` was called so far
    pub fn calls(&self, op: Op) -> usize {
        self.0.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Holds every call issued from now on until the returned sender is used or dropped
    pub fn hold_responses(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.0.lock().gate = Some(receiver.shared());
        sender
    }

    async fn enter(&self, op: Op) -> Result<(), Error> {
        let (gate, failure) = {
            let mut state = self.0.lock();
            *state.calls.entry(op).or_insert(0) += 1;
            let failure = state.failures.get_mut(&op).and_then(|f| f.pop_front());
            (state.gate.clone(), failure)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

#[async_trait]
impl CommentService for MockServer {
    async fn list_by_ids(
        &self,
        ids: &[CommentId],
        _cancel: &Cancellation,
    ) -> Result<Vec<Comment>, Error> {
        self.enter(Op::ListByIds).await?;
        let state = self.0.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.comments.get(id))
            .cloned()
            .collect())
    }

    async fn get_family(
        &self,
        parent: CommentId,
        _cancel: &Cancellation,
    ) -> Result<Family, Error> {
        self.enter(Op::GetFamily).await?;
        let state = self.0.lock();
        let comment = state.comments.get(&parent).ok_or(Error::NotFound)?.clone();
        let replies = comment
            .reply_refs
            .iter()
            .filter_map(|id| state.comments.get(id))
            .cloned()
            .collect();
        Ok(Family { comment, replies })
    }

    async fn create(
        &self,
        content: &str,
        post: PostId,
        _cancel: &Cancellation,
    ) -> Result<Comment, Error> {
        self.enter(Op::Create).await?;
        let mut state = self.0.lock();
        let author = state.actor()?;
        let content = validate_content(content)?;
        state.insert(post, author, content, None)
    }

    async fn edit(
        &self,
        content: &str,
        comment: CommentId,
        _cancel: &Cancellation,
    ) -> Result<Comment, Error> {
        self.enter(Op::Edit).await?;
        let mut state = self.0.lock();
        let actor = state.actor()?;
        let content = validate_content(content)?;
        let now = state.tick();
        let c = state.comments.get_mut(&comment).ok_or(Error::NotFound)?;
        if c.author_id != actor {
            return Err(Error::PermissionDenied);
        }
        c.content = String::from(content);
        c.modified_at = now;
        Ok(c.clone())
    }

    async fn delete(&self, comment: CommentId, _cancel: &Cancellation) -> Result<(), Error> {
        self.enter(Op::Delete).await?;
        let mut state = self.0.lock();
        let actor = state.actor()?;
        let c = state.comments.get(&comment).ok_or(Error::NotFound)?.clone();
        if c.author_id != actor {
            return Err(Error::PermissionDenied);
        }
        if !c.reply_refs.is_empty() {
            let now = state.tick();
            if let Some(c) = state.comments.get_mut(&comment) {
                c.content = String::from(TOMBSTONE);
                c.modified_at = now;
            }
        } else {
            state.comments.remove(&comment);
            match c.parent_id {
                None => {
                    if let Some(p) = state.posts.get_mut(&c.post_id) {
                        p.comment_ids.retain(|id| *id != comment);
                    }
                }
                Some(parent) => {
                    if let Some(p) = state.comments.get_mut(&parent) {
                        p.reply_refs.retain(|id| *id != comment);
                    }
                }
            }
        }
        if let Some(p) = state.posts.get_mut(&c.post_id) {
            p.total_comments = p.total_comments.saturating_sub(1);
        }
        Ok(())
    }

    async fn create_reply(
        &self,
        content: &str,
        post: PostId,
        parent: CommentId,
        _cancel: &Cancellation,
    ) -> Result<Comment, Error> {
        self.enter(Op::CreateReply).await?;
        let mut state = self.0.lock();
        let author = state.actor()?;
        let content = validate_content(content)?;
        match state.comments.get(&parent) {
            None => return Err(Error::NotFound),
            Some(p) if p.is_reply() => return Err(Error::ReplyToReply(parent)),
            Some(_) => (),
        }
        state.insert(post, author, content, Some(parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_api::cancellation;

    fn setup() -> (MockServer, UserId, PostId) {
        let srv = MockServer::new();
        let ann = srv.admin_create_user("ann", "Ann");
        let post = srv.create_post(ann);
        srv.act_as(Some(ann));
        (srv, ann, post)
    }

    #[tokio::test]
    async fn list_by_ids_keeps_requested_order() {
        let (srv, ann, post) = setup();
        let (_t, cancel) = cancellation();
        let a = srv.test_add_comment(post, ann, "a");
        let b = srv.test_add_comment(post, ann, "b");
        let missing = CommentId(Uuid::new_v4());
        let res = srv.list_by_ids(&[b, missing, a], &cancel).await.unwrap();
        assert_eq!(res.iter().map(|c| c.id).collect::<Vec<_>>(), vec![b, a]);
    }

    #[tokio::test]
    async fn only_author_may_edit() {
        let (srv, ann, post) = setup();
        let (_t, cancel) = cancellation();
        let bob = srv.admin_create_user("bob", "Bob");
        let c = srv.test_add_comment(post, ann, "old");
        srv.act_as(Some(bob));
        assert_eq!(
            srv.edit("new", c, &cancel).await,
            Err(Error::PermissionDenied)
        );
        srv.act_as(Some(ann));
        let edited = srv.edit("new", c, &cancel).await.unwrap();
        assert_eq!(edited.content, "new");
        assert!(edited.is_edited());
    }

    #[tokio::test]
    async fn delete_with_replies_leaves_tombstone() {
        let (srv, ann, post) = setup();
        let (_t, cancel) = cancellation();
        let c = srv.test_add_comment(post, ann, "parent");
        let r = srv.test_add_reply(post, c, ann, "child");
        assert_eq!(srv.post(post).unwrap().total_comments, 2);

        srv.delete(c, &cancel).await.unwrap();
        assert_eq!(srv.comment(c).unwrap().content, TOMBSTONE);
        assert_eq!(srv.post(post).unwrap().total_comments, 1);

        srv.delete(r, &cancel).await.unwrap();
        assert!(srv.comment(r).is_none());
        assert!(srv.comment(c).unwrap().reply_refs.is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_once() {
        let (srv, _ann, post) = setup();
        let (_t, cancel) = cancellation();
        srv.fail_next(Op::Create, Error::Network(String::from("down")));
        assert!(srv.create("hi", post, &cancel).await.is_err());
        assert!(srv.create("hi", post, &cancel).await.is_ok());
        assert_eq!(srv.calls(Op::Create), 2);
        assert_eq!(srv.post(post).unwrap().comment_ids.len(), 1);
    }

    #[tokio::test]
    async fn anonymous_writes_are_rejected() {
        let (srv, _ann, post) = setup();
        let (_t, cancel) = cancellation();
        srv.act_as(None);
        assert_eq!(
            srv.create("hi", post, &cancel).await,
            Err(Error::Unauthenticated)
        );
    }
}
