use uuid::Uuid;

use crate::{CommentId, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct PostId(pub Uuid);

/// The slice of a post that the comment tray needs
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,

    /// Top-level comments, in display order
    pub comment_ids: Vec<CommentId>,

    /// Comments and replies, as counted by the server
    pub total_comments: u64,
}
