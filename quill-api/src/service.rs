use async_trait::async_trait;

use crate::{Cancellation, Comment, CommentId, Error, Family, PostId};

/// Network boundary for comments.
///
/// Implementations are expected to be cheap to share: the tray issues calls through
/// `&self` and may have several of them in flight at once. Every call carries the
/// view's `Cancellation`, which transports may use to give up early; the caller
/// also races each call against it.
#[async_trait]
pub trait CommentService: Send + Sync {
    /// Returns the comments in the order of `ids`
    async fn list_by_ids(
        &self,
        ids: &[CommentId],
        cancel: &Cancellation,
    ) -> Result<Vec<Comment>, Error>;

    async fn get_family(&self, parent: CommentId, cancel: &Cancellation)
        -> Result<Family, Error>;

    async fn create(
        &self,
        content: &str,
        post: PostId,
        cancel: &Cancellation,
    ) -> Result<Comment, Error>;

    async fn edit(
        &self,
        content: &str,
        comment: CommentId,
        cancel: &Cancellation,
    ) -> Result<Comment, Error>;

    async fn delete(&self, comment: CommentId, cancel: &Cancellation) -> Result<(), Error>;

    async fn create_reply(
        &self,
        content: &str,
        post: PostId,
        parent: CommentId,
        cancel: &Cancellation,
    ) -> Result<Comment, Error>;
}

#[async_trait]
impl<S: CommentService + ?Sized> CommentService for std::sync::Arc<S> {
    async fn list_by_ids(
        &self,
        ids: &[CommentId],
        cancel: &Cancellation,
    ) -> Result<Vec<Comment>, Error> {
        (**self).list_by_ids(ids, cancel).await
    }

    async fn get_family(
        &self,
        parent: CommentId,
        cancel: &Cancellation,
    ) -> Result<Family, Error> {
        (**self).get_family(parent, cancel).await
    }

    async fn create(
        &self,
        content: &str,
        post: PostId,
        cancel: &Cancellation,
    ) -> Result<Comment, Error> {
        (**self).create(content, post, cancel).await
    }

    async fn edit(
        &self,
        content: &str,
        comment: CommentId,
        cancel: &Cancellation,
    ) -> Result<Comment, Error> {
        (**self).edit(content, comment, cancel).await
    }

    async fn delete(&self, comment: CommentId, cancel: &Cancellation) -> Result<(), Error> {
        (**self).delete(comment, cancel).await
    }

    async fn create_reply(
        &self,
        content: &str,
        post: PostId,
        parent: CommentId,
        cancel: &Cancellation,
    ) -> Result<Comment, Error> {
        (**self).create_reply(content, post, parent, cancel).await
    }
}
