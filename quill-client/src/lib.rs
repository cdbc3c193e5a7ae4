mod expansion;
pub use expansion::Expansion;

mod mode;
pub use mode::{Composer, Mode, Submission};

mod reply_cache;
pub use reply_cache::{ReplyBundle, ReplyCache};

mod store;
pub use store::CommentStore;

mod tray;
pub use tray::{CommentTray, Request};

mod view;
pub use view::{
    reply_label, CommentEntry, ComposeView, Level, Notification, ReplyAffordance, ReplyEntry,
    TrayView, COMPOSE_PLACEHOLDER,
};

#[cfg(test)]
mod fuzz;

pub mod api {
    pub use quill_api::*;
}
