#![cfg(test)]

use std::{cmp, collections::HashSet, ops::RangeTo, panic::AssertUnwindSafe};

use quill_mock_server::Op;

use crate::{
    api::{CommentId, Error},
    tray::tests::{fixture, mount_as, Fixture, Tray},
    CommentStore, ReplyCache,
};

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

#[derive(Clone, Copy, Debug, bolero::generator::TypeGenerator)]
enum FuzzFailure {
    GetFamily,
    Create,
    Edit,
    Delete,
    CreateReply,
}

impl FuzzFailure {
    fn op(self) -> Op {
        match self {
            FuzzFailure::GetFamily => Op::GetFamily,
            FuzzFailure::Create => Op::Create,
            FuzzFailure::Edit => Op::Edit,
            FuzzFailure::Delete => Op::Delete,
            FuzzFailure::CreateReply => Op::CreateReply,
        }
    }
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    Create { blank: bool },
    Reply { target: usize, blank: bool },
    Edit { target: usize, blank: bool },
    Delete { target: usize },
    Expand { target: usize },
    Collapse { target: usize },
    FetchFamily { target: usize },
    ForeignReply { target: usize },
    Fail(FuzzFailure),
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end);
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1))
}

struct Snapshot {
    store: CommentStore,
    cache: ReplyCache,
    total: u64,
}

/// Drives a tray signed in as `ann` against the mock server, and tracks what
/// the tray is expected to look like
struct TrayFuzzer {
    f: Fixture,
    tray: Tray,
    order: Vec<CommentId>,
    total: u64,
    family_calls: usize,
    counter: usize,
}

impl TrayFuzzer {
    async fn new() -> TrayFuzzer {
        let f = fixture();
        let c1 = f.srv.test_add_comment(f.post, f.ann, "mine");
        f.srv.test_add_comment(f.post, f.bob, "theirs");
        f.srv.test_add_reply(f.post, c1, f.bob, "a reply");
        let tray = mount_as(&f, Some(f.ann)).await;
        let order = tray.store().ids().collect();
        TrayFuzzer {
            order,
            total: tray.total_comments(),
            f,
            tray,
            family_calls: 0,
            counter: 0,
        }
    }

    /// Comments visible in the tray: the top-level ones, then the fetched replies
    /// of each of them
    fn targets(&self) -> Vec<CommentId> {
        let store = self.tray.store();
        let cache = self.tray.cache();
        let mut res = store.ids().collect::<Vec<_>>();
        for id in store.ids() {
            if let Some(b) = cache.get(&id) {
                res.extend(b.replies.iter().map(|r| r.id));
            }
        }
        res
    }

    fn pick(&self, target: usize) -> Option<CommentId> {
        let targets = self.targets();
        resize_int(target, ..targets.len()).map(|i| targets[i])
    }

    fn pick_top(&self, target: usize) -> Option<CommentId> {
        resize_int(target, ..self.order.len()).map(|i| self.order[i])
    }

    fn content(&mut self, blank: bool) -> String {
        self.counter += 1;
        match blank {
            true => String::from(" \t "),
            false => format!("content {}", self.counter),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            store: self.tray.store().clone(),
            cache: self.tray.cache().clone(),
            total: self.tray.total_comments(),
        }
    }

    fn assert_unchanged<T>(&self, name: &str, res: &Result<T, Error>, before: Snapshot) {
        if res.is_err() {
            assert_eq!(*self.tray.store(), before.store, "{name} failed but changed the store");
            assert_eq!(*self.tray.cache(), before.cache, "{name} failed but changed the cache");
            assert_eq!(self.tray.total_comments(), before.total);
        }
    }

    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::Create { blank } => {
                let content = self.content(blank);
                let before = self.snapshot();
                let res = self.tray.create(&content).await;
                self.assert_unchanged("create", &res, before);
                match res {
                    Ok(id) => {
                        assert!(!blank);
                        assert_eq!(self.tray.store().comments().last().map(|c| c.id), Some(id));
                        self.order.push(id);
                        self.total += 1;
                    }
                    Err(Error::EmptyContent) => assert!(blank),
                    Err(e) => assert_eq!(e, Error::Network(String::from("injected"))),
                }
            }
            FuzzOp::Reply { target, blank } => {
                let Some(parent) = self.pick(target) else {
                    return;
                };
                let content = self.content(blank);
                let had_bundle = self.tray.cache().contains(&parent);
                let before = self.snapshot();
                let res = self.tray.create_reply(parent, &content).await;
                self.assert_unchanged("reply", &res, before);
                if let Ok(id) = res {
                    let p = self.tray.find(&parent).expect("reply parent vanished");
                    assert!(!p.is_reply());
                    assert_eq!(p.reply_refs.last(), Some(&id));
                    assert_eq!(
                        had_bundle,
                        self.tray
                            .cache()
                            .get(&parent)
                            .map_or(false, |b| b.replies.iter().any(|r| r.id == id))
                    );
                    self.total += 1;
                }
            }
            FuzzOp::Edit { target, blank } => {
                let Some(id) = self.pick(target) else {
                    return;
                };
                let content = self.content(blank);
                let calls = self.f.srv.calls(Op::Edit);
                let before = self.snapshot();
                let res = self.tray.edit(id, &content).await;
                self.assert_unchanged("edit", &res, before);
                match res {
                    Ok(()) => {
                        let c = self.tray.find(&id).expect("edited comment vanished");
                        assert_eq!(c.content, content);
                        assert!(c.is_edited());
                    }
                    Err(Error::EmptyContent) | Err(Error::PermissionDenied) => {
                        assert_eq!(self.f.srv.calls(Op::Edit), calls)
                    }
                    Err(_) => (),
                }
            }
            FuzzOp::Delete { target } => {
                let Some(id) = self.pick(target) else {
                    return;
                };
                let before = self.snapshot();
                let res = self.tray.delete(id).await;
                self.assert_unchanged("delete", &res, before);
                if res.is_ok() {
                    assert!(self.tray.find(&id).is_none());
                    self.order.retain(|c| *c != id);
                    self.total -= 1;
                }
            }
            FuzzOp::Expand { target } => {
                let Some(parent) = self.pick_top(target) else {
                    return;
                };
                if !self.tray.is_expanded(&parent) && !self.tray.cache().contains(&parent) {
                    self.family_calls += 1;
                }
                let before = self.snapshot();
                let res = self.tray.expand(parent).await;
                self.assert_unchanged("expand", &res, before);
                assert_eq!(res.is_ok(), self.tray.is_expanded(&parent));
                assert_eq!(res.is_ok(), self.tray.cache().contains(&parent));
            }
            FuzzOp::Collapse { target } => {
                if let Some(parent) = self.pick_top(target) {
                    self.tray.collapse(&parent);
                    assert!(!self.tray.is_expanded(&parent));
                }
            }
            FuzzOp::FetchFamily { target } => {
                if let Some(parent) = self.pick_top(target) {
                    self.family_calls += 1;
                    if self.tray.fetch_family(parent).await.is_ok() {
                        let srv = self.f.srv.comment(parent).expect("fetched unknown comment");
                        let bundle = self.tray.cache().get(&parent).cloned().expect("no bundle");
                        let ids = bundle.replies.iter().map(|r| r.id).collect::<Vec<_>>();
                        assert_eq!(ids, srv.reply_refs);
                    }
                }
            }
            FuzzOp::ForeignReply { target } => {
                if let Some(parent) = self.pick_top(target) {
                    self.f
                        .srv
                        .test_add_reply(self.f.post, parent, self.f.bob, "foreign");
                }
            }
            FuzzOp::Fail(failure) => self
                .f
                .srv
                .fail_next(failure.op(), Error::Network(String::from("injected"))),
        }
        self.check_invariants();
    }

    fn check_invariants(&self) {
        let store = self.tray.store();
        let cache = self.tray.cache();

        assert_eq!(store.ids().collect::<Vec<_>>(), self.order);
        assert_eq!(store.ids().collect::<HashSet<_>>().len(), store.len());
        assert_eq!(self.tray.total_comments(), self.total);
        assert_eq!(self.f.srv.calls(Op::GetFamily), self.family_calls);
        assert!(!self.tray.is_busy());

        for c in store.comments() {
            assert!(!c.is_reply());
            if let Some(b) = cache.get(&c.id) {
                let ids = b.replies.iter().map(|r| r.id).collect::<Vec<_>>();
                assert_eq!(ids, c.reply_refs, "reply count out of sync for {:?}", c.id);
            }
        }
        for id in store.ids() {
            if let Some(b) = cache.get(&id) {
                assert_eq!(b.parent_id, id);
                let unique = b.replies.iter().map(|r| r.id).collect::<HashSet<_>>();
                assert_eq!(unique.len(), b.replies.len());
                assert!(b.replies.iter().all(|r| r.parent_id == Some(id)));
            }
        }
    }
}

do_tokio_test!(tray_keeps_invariants, Vec<FuzzOp>, |ops: Vec<FuzzOp>| async move {
    let mut fuzzer = TrayFuzzer::new().await;
    for op in ops {
        fuzzer.execute_fuzz_op(op).await;
    }
});
