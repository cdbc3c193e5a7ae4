use std::collections::HashMap;

use crate::api::{Comment, CommentId};

/// Replies of one parent, exactly as fetched and then locally amended
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReplyBundle {
    pub parent_id: CommentId,
    pub replies: Vec<Comment>,
}

/// Reply bundles of every parent expanded at least once during this view. Entries
/// are never evicted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReplyCache {
    bundles: HashMap<CommentId, ReplyBundle>,
}

impl ReplyCache {
    pub fn new() -> ReplyCache {
        ReplyCache::default()
    }

    pub fn get(&self, parent: &CommentId) -> Option<&ReplyBundle> {
        self.bundles.get(parent)
    }

    pub fn contains(&self, parent: &CommentId) -> bool {
        self.bundles.contains_key(parent)
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Stores a freshly fetched reply list, replacing any previous bundle wholesale
    pub fn store(&mut self, parent: CommentId, replies: Vec<Comment>) -> &ReplyBundle {
        tracing::debug!(?parent, num_replies = replies.len(), "storing reply bundle");
        let bundle = ReplyBundle {
            parent_id: parent,
            replies,
        };
        self.bundles.insert(parent, bundle);
        &self.bundles[&parent]
    }

    /// Looks a reply up across all bundles
    pub fn find_reply(&self, id: &CommentId) -> Option<&Comment> {
        self.bundles
            .values()
            .flat_map(|b| b.replies.iter())
            .find(|r| r.id == *id)
    }

    pub fn find_reply_mut(&mut self, id: &CommentId) -> Option<&mut Comment> {
        self.bundles
            .values_mut()
            .flat_map(|b| b.replies.iter_mut())
            .find(|r| r.id == *id)
    }

    /// Appends a newly created reply to its parent's bundle, if that bundle was
    /// fetched. Returns whether it was appended.
    pub fn append_reply(&mut self, reply: Comment) -> bool {
        let Some(parent) = reply.parent_id else {
            tracing::warn!(id = ?reply.id, "tried caching a reply without a parent");
            return false;
        };
        match self.bundles.get_mut(&parent) {
            Some(b) => {
                if !b.replies.iter().any(|r| r.id == reply.id) {
                    b.replies.push(reply);
                }
                true
            }
            None => false,
        }
    }

    /// Replaces the reply in place, inside the bundle of its parent
    pub fn replace_reply(&mut self, reply: Comment) -> bool {
        let Some(parent) = reply.parent_id else {
            return false;
        };
        let Some(b) = self.bundles.get_mut(&parent) else {
            return false;
        };
        match b.replies.iter_mut().find(|r| r.id == reply.id) {
            Some(r) => {
                *r = reply;
                true
            }
            None => false,
        }
    }

    pub fn remove_reply(&mut self, parent: &CommentId, id: &CommentId) -> Option<Comment> {
        let b = self.bundles.get_mut(parent)?;
        let idx = b.replies.iter().position(|r| r.id == *id)?;
        Some(b.replies.remove(idx))
    }
}
