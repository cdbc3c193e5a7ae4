use uuid::Uuid;

use crate::{Author, Error, PostId, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub author: Author,

    pub content: String,
    pub created_at: Time,
    pub modified_at: Time,

    /// Set iff this comment is a reply
    pub parent_id: Option<CommentId>,

    /// Replies in creation order. Authoritative for the reply count even when the
    /// replies themselves were not fetched yet.
    pub reply_refs: Vec<CommentId>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_edited(&self) -> bool {
        self.modified_at != self.created_at
    }

    pub fn reply_count(&self) -> usize {
        self.reply_refs.len()
    }
}

/// A comment along with all of its replies, as returned by a family fetch
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Family {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

/// Returns the content that should actually be submitted
pub fn validate_content(content: &str) -> Result<&str, Error> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::EmptyContent);
    }
    Ok(content)
}
