pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<chrono::Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod auth;
pub use auth::{Actor, Session};

mod cancel;
pub use cancel::{cancellation, Cancellation, Teardown};

mod comment;
pub use comment::{validate_content, Comment, CommentId, Family};

mod error;
pub use error::Error;

mod post;
pub use post::{Post, PostId};

mod service;
pub use service::CommentService;

mod user;
pub use user::{Author, UserId};
