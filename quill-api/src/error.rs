use serde_json::json;

use crate::CommentId;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("No content found for comment")]
    EmptyContent,

    #[error("Cannot reply to comment {0}, which is itself a reply")]
    ReplyToReply(CommentId),

    #[error("Login first")]
    Unauthenticated,

    #[error("Comment not found")]
    NotFound,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Comment {0} is not loaded in this view")]
    UnknownTarget(CommentId),

    #[error("Another request is still in flight")]
    Busy,

    #[error("Request aborted, the view was torn down")]
    Aborted,
}

impl Error {
    /// Validation errors are detected locally and never reach the service
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::EmptyContent | Error::ReplyToReply(_))
    }

    pub fn is_from_service(&self) -> bool {
        matches!(
            self,
            Error::NotFound | Error::PermissionDenied | Error::Network(_)
        )
    }

    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::EmptyContent | Error::ReplyToReply(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::NotFound | Error::UnknownTarget(_) => StatusCode::NOT_FOUND,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::Busy => StatusCode::CONFLICT,
            Error::Network(_) | Error::Aborted => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        let typ = match self {
            Error::EmptyContent => "empty-content",
            Error::ReplyToReply(_) => "reply-to-reply",
            Error::Unauthenticated => "unauthenticated",
            Error::NotFound | Error::UnknownTarget(_) => "not-found",
            Error::PermissionDenied => "permission-denied",
            Error::Busy => "busy",
            Error::Network(_) | Error::Aborted => "unknown",
        };
        serde_json::to_vec(&json!({
            "success": false,
            "type": typ,
            "message": self.to_string(),
        }))
        .expect("serializing error contents")
    }

    /// Rebuilds an error out of a failed response. Bodies without a known `type`
    /// fall back to the status code.
    pub fn parse(status: http::StatusCode, body: &[u8]) -> Error {
        use http::StatusCode;
        let data: Option<serde_json::Value> = serde_json::from_slice(body).ok();
        let message = data
            .as_ref()
            .and_then(|d| d.get("message").or_else(|| d.get("error")))
            .and_then(|m| m.as_str())
            .map(String::from);
        let typ = data
            .as_ref()
            .and_then(|d| d.get("type"))
            .and_then(|t| t.as_str());
        match typ {
            Some("empty-content") => return Error::EmptyContent,
            Some("unauthenticated") => return Error::Unauthenticated,
            Some("not-found") => return Error::NotFound,
            Some("permission-denied") => return Error::PermissionDenied,
            Some("busy") => return Error::Busy,
            _ => (),
        }
        match status {
            StatusCode::BAD_REQUEST
                if message.as_deref() == Some("Comment content is required") =>
            {
                Error::EmptyContent
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
                if message.as_deref().map_or(false, |m| m.starts_with("unauthorised")) =>
            {
                Error::PermissionDenied
            }
            StatusCode::UNAUTHORIZED => Error::Unauthenticated,
            StatusCode::FORBIDDEN => Error::PermissionDenied,
            StatusCode::NOT_FOUND => Error::NotFound,
            _ => Error::Network(message.unwrap_or_else(|| format!("server answered {status}"))),
        }
    }
}
