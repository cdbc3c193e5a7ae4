use crate::api::{validate_content, Comment, CommentId, Error};

/// What the compose field currently means
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Idle,
    Editing(Comment),
    Replying(Comment),
}

impl Mode {
    pub fn target(&self) -> Option<&Comment> {
        match self {
            Mode::Idle => None,
            Mode::Editing(c) | Mode::Replying(c) => Some(c),
        }
    }
}

/// A validated compose submission, ready to be sent
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Submission {
    Create {
        content: String,
    },
    Edit {
        comment: CommentId,
        content: String,
    },
    EditReply {
        parent: CommentId,
        reply: CommentId,
        content: String,
    },
    Reply {
        parent: CommentId,
        content: String,
    },
}

/// The single compose field along with the mode it is in
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Composer {
    mode: Mode,
    text: String,

    /// Bumped on every mode transition, so that a late completion can tell
    /// whether the user moved on in the meantime
    generation: u64,
}

impl Composer {
    pub fn new() -> Composer {
        Composer::default()
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_text(&mut self, text: String) {
        self.text = text;
    }

    fn transition(&mut self, mode: Mode, text: String) {
        self.mode = mode;
        self.text = text;
        self.generation += 1;
    }

    /// Pre-fills the field with the current content of `comment`
    pub fn start_edit(&mut self, comment: Comment) {
        let text = comment.content.clone();
        self.transition(Mode::Editing(comment), text);
    }

    pub fn start_reply(&mut self, parent: Comment) -> Result<(), Error> {
        if parent.is_reply() {
            return Err(Error::ReplyToReply(parent.id));
        }
        self.transition(Mode::Replying(parent), String::new());
        Ok(())
    }

    pub fn cancel(&mut self) {
        self.transition(Mode::Idle, String::new());
    }

    /// Drops the mode if it targets `id`, which no longer exists
    pub fn forget(&mut self, id: &CommentId) -> bool {
        match self.mode.target() {
            Some(c) if c.id == *id => {
                self.cancel();
                true
            }
            _ => false,
        }
    }

    /// Validates the field and decides where it should be dispatched
    pub fn submission(&self) -> Result<Submission, Error> {
        let content = String::from(validate_content(&self.text)?);
        Ok(match &self.mode {
            Mode::Idle => Submission::Create { content },
            Mode::Editing(c) => match c.parent_id {
                None => Submission::Edit {
                    comment: c.id,
                    content,
                },
                Some(parent) => Submission::EditReply {
                    parent,
                    reply: c.id,
                    content,
                },
            },
            Mode::Replying(p) => Submission::Reply {
                parent: p.id,
                content,
            },
        })
    }
}
