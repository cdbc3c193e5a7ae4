use async_trait::async_trait;
use quill_client::api::{
    Actor, Cancellation, Comment, CommentId, CommentService, Error, Family, Post, PostId,
};

/// `CommentService` talking to a comment backend over HTTP
pub struct HttpCommentService {
    client: reqwest::Client,
    host: String,
    token: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentsByIds {
    /// Comma-separated
    comment_ids: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct NewComment<'a> {
    content: &'a str,
    post_id: PostId,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct EditComment<'a> {
    content: &'a str,
    comment_id: CommentId,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct NewReply<'a> {
    content: &'a str,
    post_id: PostId,
    parent_id: CommentId,
}

#[derive(serde::Deserialize)]
struct CommentResponse {
    comment: Comment,
}

#[derive(serde::Deserialize)]
struct CommentsResponse {
    comments: Vec<Comment>,
}

#[derive(serde::Deserialize)]
struct FamilyResponse {
    comment: Comment,
    replies: Vec<Comment>,
}

#[derive(serde::Deserialize)]
struct PostResponse {
    post: Post,
}

#[derive(serde::Deserialize)]
struct UserResponse {
    user: Actor,
}

fn network(err: reqwest::Error) -> Error {
    Error::Network(err.to_string())
}

impl HttpCommentService {
    pub fn new(host: String, token: Option<String>) -> HttpCommentService {
        HttpCommentService {
            client: reqwest::Client::new(),
            host,
            token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}/api/{}", self.host, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn run<R>(&self, req: reqwest::RequestBuilder, cancel: &Cancellation) -> Result<R, Error>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        cancel
            .guard(async move {
                let resp = req.send().await.map_err(network)?;
                let status = resp.status();
                let body = resp.bytes().await.map_err(network)?;
                if !status.is_success() {
                    let err = Error::parse(status, &body);
                    tracing::debug!(%status, ?err, "comment backend refused request");
                    return Err(err);
                }
                serde_json::from_slice(&body)
                    .map_err(|e| Error::Network(format!("unexpected response body: {e}")))
            })
            .await
    }

    pub async fn fetch_post(&self, post: PostId, cancel: &Cancellation) -> Result<Post, Error> {
        let path = format!("p/{}", post.0);
        let resp: PostResponse = self
            .run(self.request(reqwest::Method::GET, &path), cancel)
            .await?;
        Ok(resp.post)
    }

    /// The signed-in user, if a token was configured
    pub async fn whoami(&self, cancel: &Cancellation) -> Result<Option<Actor>, Error> {
        if self.token.is_none() {
            return Ok(None);
        }
        let resp: UserResponse = self
            .run(self.request(reqwest::Method::GET, "auth/user"), cancel)
            .await?;
        Ok(Some(resp.user))
    }
}

#[async_trait]
impl CommentService for HttpCommentService {
    async fn list_by_ids(
        &self,
        ids: &[CommentId],
        cancel: &Cancellation,
    ) -> Result<Vec<Comment>, Error> {
        let comment_ids = ids
            .iter()
            .map(|id| id.0.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let req = self
            .request(reqwest::Method::POST, "get-comments-byids")
            .json(&CommentsByIds { comment_ids });
        let mut resp: CommentsResponse = self.run(req, cancel).await?;
        // the backend does not promise any order
        let mut ordered = Vec::with_capacity(resp.comments.len());
        for id in ids {
            if let Some(pos) = resp.comments.iter().position(|c| c.id == *id) {
                ordered.push(resp.comments.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    async fn get_family(&self, parent: CommentId, cancel: &Cancellation) -> Result<Family, Error> {
        let path = format!("p/comments/{}", parent.0);
        let resp: FamilyResponse = self
            .run(self.request(reqwest::Method::GET, &path), cancel)
            .await?;
        Ok(Family {
            comment: resp.comment,
            replies: resp.replies,
        })
    }

    async fn create(
        &self,
        content: &str,
        post: PostId,
        cancel: &Cancellation,
    ) -> Result<Comment, Error> {
        let req = self
            .request(reqwest::Method::POST, "new-comment")
            .json(&NewComment {
                content,
                post_id: post,
            });
        let resp: CommentResponse = self.run(req, cancel).await?;
        Ok(resp.comment)
    }

    async fn edit(
        &self,
        content: &str,
        comment: CommentId,
        cancel: &Cancellation,
    ) -> Result<Comment, Error> {
        let req = self
            .request(reqwest::Method::PUT, "edit-comment")
            .json(&EditComment {
                content,
                comment_id: comment,
            });
        let resp: CommentResponse = self.run(req, cancel).await?;
        Ok(resp.comment)
    }

    async fn delete(&self, comment: CommentId, cancel: &Cancellation) -> Result<(), Error> {
        let req = self
            .request(reqwest::Method::DELETE, "delete-comment")
            .query(&[("commentId", comment.0.to_string())]);
        let _: serde_json::Value = self.run(req, cancel).await?;
        Ok(())
    }

    async fn create_reply(
        &self,
        content: &str,
        post: PostId,
        parent: CommentId,
        cancel: &Cancellation,
    ) -> Result<Comment, Error> {
        let req = self
            .request(reqwest::Method::POST, "reply-to-a-comment")
            .json(&NewReply {
                content,
                post_id: post,
                parent_id: parent,
            });
        let resp: CommentResponse = self.run(req, cancel).await?;
        Ok(resp.comment)
    }
}
