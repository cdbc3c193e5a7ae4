use std::collections::HashSet;

use crate::api::CommentId;

/// Which reply panels are open, independently of what the cache holds
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Expansion {
    open: HashSet<CommentId>,

    /// Panels waiting on their first fetch
    opening: HashSet<CommentId>,
}

impl Expansion {
    pub fn new() -> Expansion {
        Expansion::default()
    }

    pub fn is_open(&self, parent: &CommentId) -> bool {
        self.open.contains(parent)
    }

    pub fn is_opening(&self, parent: &CommentId) -> bool {
        self.opening.contains(parent)
    }

    /// Returns `false` if a fetch for this panel is already in flight
    pub fn begin_open(&mut self, parent: CommentId) -> bool {
        self.opening.insert(parent)
    }

    /// A failed fetch leaves the panel closed, so the next click retries
    pub fn abandon_open(&mut self, parent: &CommentId) {
        self.opening.remove(parent);
    }

    pub fn mark_open(&mut self, parent: CommentId) {
        self.opening.remove(&parent);
        self.open.insert(parent);
    }

    pub fn collapse(&mut self, parent: &CommentId) -> bool {
        self.open.remove(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Uuid;

    #[test]
    fn open_lifecycle() {
        let mut e = Expansion::new();
        let p = CommentId(Uuid::new_v4());
        assert!(e.begin_open(p));
        assert!(!e.begin_open(p));
        assert!(!e.is_open(&p));
        e.mark_open(p);
        assert!(e.is_open(&p));
        assert!(!e.is_opening(&p));
        assert!(e.collapse(&p));
        assert!(!e.collapse(&p));
    }

    #[test]
    fn abandoned_opening_can_be_retried() {
        let mut e = Expansion::new();
        let p = CommentId(Uuid::new_v4());
        assert!(e.begin_open(p));
        e.abandon_open(&p);
        assert!(!e.is_open(&p));
        assert!(e.begin_open(p));
    }
}
