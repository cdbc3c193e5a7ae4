use crate::api::Comment;

pub const COMPOSE_PLACEHOLDER: &str = "Add a comment...";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Success,
    Error,
}

/// Transient message for the user, to be shown as a toast
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Notification {
        Notification {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Notification {
        Notification {
            level: Level::Error,
            message: message.into(),
        }
    }
}

/// Everything needed to render the tray
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrayView {
    pub loaded: bool,
    pub total_comments: u64,
    pub entries: Vec<CommentEntry>,
    pub compose: ComposeView,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentEntry {
    pub comment: Comment,
    pub by_post_author: bool,
    pub can_modify: bool,
    pub can_reply: bool,
    pub replies: ReplyAffordance,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReplyAffordance {
    None,
    Collapsed { label: String },
    Opening { label: String },
    Expanded { label: String, replies: Vec<ReplyEntry> },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReplyEntry {
    pub comment: Comment,
    pub by_post_author: bool,
    pub can_modify: bool,

    /// Username of the parent's author
    pub replying_to: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComposeView {
    pub text: String,
    pub placeholder: Option<&'static str>,
    pub banner: Option<String>,
    pub submit_enabled: bool,
}

pub fn reply_label(count: usize) -> String {
    match count {
        1 => String::from("1 reply"),
        n => format!("{n} replies"),
    }
}
