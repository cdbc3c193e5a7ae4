//! Top-level comments of the viewed post.
//!
//! Everything in here is applied only once the service confirmed the matching
//! request; the requests themselves are issued by [`CommentTray`](crate::CommentTray).

use crate::api::{Comment, CommentId};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentStore {
    comments: Vec<Comment>,
}

impl CommentStore {
    pub fn new() -> CommentStore {
        CommentStore::default()
    }

    /// In fetch order, then creation order
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn ids(&self) -> impl Iterator<Item = CommentId> + '_ {
        self.comments.iter().map(|c| c.id)
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn get(&self, id: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == *id)
    }

    pub fn get_mut(&mut self, id: &CommentId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == *id)
    }

    /// Result of the initial load: replaces everything, keeping the server's order
    pub fn load(&mut self, comments: Vec<Comment>) {
        tracing::debug!(num_comments = comments.len(), "loaded top-level comments");
        self.comments = comments;
    }

    pub fn append(&mut self, comment: Comment) {
        if self.get(&comment.id).is_some() {
            tracing::warn!(id = ?comment.id, "comment already in store, replacing it instead");
            self.replace(comment);
            return;
        }
        self.comments.push(comment);
    }

    /// Replaces the comment with the same id at its current position. Returns
    /// `false` if there is no such comment.
    pub fn replace(&mut self, comment: Comment) -> bool {
        match self.get_mut(&comment.id) {
            Some(c) => {
                *c = comment;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &CommentId) -> Option<Comment> {
        let idx = self.comments.iter().position(|c| c.id == *id)?;
        Some(self.comments.remove(idx))
    }

    /// Records a newly created reply on its parent, if the parent is here
    pub fn add_reply_ref(&mut self, parent: &CommentId, reply: CommentId) -> bool {
        match self.get_mut(parent) {
            Some(p) => {
                if !p.reply_refs.contains(&reply) {
                    p.reply_refs.push(reply);
                }
                true
            }
            None => false,
        }
    }

    pub fn remove_reply_ref(&mut self, parent: &CommentId, reply: &CommentId) -> bool {
        match self.get_mut(parent) {
            Some(p) => {
                p.reply_refs.retain(|r| r != reply);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::{Author, PostId, UserId, Uuid};
    use chrono::{TimeZone, Utc};

    pub(crate) fn comment(content: &str) -> Comment {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Comment {
            id: CommentId(Uuid::new_v4()),
            post_id: PostId(Uuid::nil()),
            author_id: UserId::stub(),
            author: Author {
                username: String::from("ann"),
                display_name: String::from("Ann"),
                avatar_url: None,
            },
            content: String::from(content),
            created_at: now,
            modified_at: now,
            parent_id: None,
            reply_refs: Vec::new(),
        }
    }

    fn contents(s: &CommentStore) -> Vec<&str> {
        s.comments().iter().map(|c| &c.content as &str).collect()
    }

    #[test]
    fn replace_keeps_position() {
        let mut s = CommentStore::new();
        let (a, b, c) = (comment("a"), comment("b"), comment("c"));
        s.load(vec![a, b.clone(), c]);
        let mut edited = b;
        edited.content = String::from("b2");
        assert!(s.replace(edited));
        assert_eq!(contents(&s), vec!["a", "b2", "c"]);
        assert!(!s.replace(comment("stranger")));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn remove_keeps_order_of_others() {
        let mut s = CommentStore::new();
        let (a, b, c) = (comment("a"), comment("b"), comment("c"));
        s.load(vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(s.remove(&b.id).map(|c| c.content), Some(String::from("b")));
        assert_eq!(s.remove(&b.id), None);
        assert_eq!(s.ids().collect::<Vec<_>>(), vec![a.id, c.id]);
    }

    #[test]
    fn append_goes_last_and_never_duplicates() {
        let mut s = CommentStore::new();
        let a = comment("a");
        s.load(vec![a.clone()]);
        let d = comment("d");
        s.append(d.clone());
        s.append(d.clone());
        assert_eq!(s.ids().collect::<Vec<_>>(), vec![a.id, d.id]);
    }

    #[test]
    fn reply_refs_are_tracked_once() {
        let mut s = CommentStore::new();
        let a = comment("a");
        s.load(vec![a.clone()]);
        let r = CommentId(Uuid::new_v4());
        assert!(s.add_reply_ref(&a.id, r));
        assert!(s.add_reply_ref(&a.id, r));
        assert_eq!(s.get(&a.id).unwrap().reply_refs, vec![r]);
        assert!(s.remove_reply_ref(&a.id, &r));
        assert!(s.get(&a.id).unwrap().reply_refs.is_empty());
        assert!(!s.add_reply_ref(&CommentId(Uuid::new_v4()), r));
    }
}
