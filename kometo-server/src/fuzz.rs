#![cfg(test)]

use std::{fmt::Debug, panic::AssertUnwindSafe};

use axum::{
    body::Body,
    http::{self, request},
    Router,
};
use bolero_generator::TypeGenerator;
use kometo_api::{
    Comment, CommentEdit, CommentId, CommentList, Error as ApiError, NewComment, ReactionChange,
    ReactionSummary, SessionId, UserId, Uuid,
};
use tower::ServiceExt;

use crate::{db::Board, extractors::*, *};

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

const USERS: [&str; 3] = ["0", "1", "2"];
const GLYPHS: [&str; 3] = ["👍", "🔥", "🎉"];

#[derive(Clone, Debug, TypeGenerator)]
enum FuzzOp {
    CreateComment {
        author: u8,
        parent: Option<u8>,
        content: u8,
    },
    UpdateComment {
        comment: u8,
        content: u8,
    },
    DeleteComment {
        comment: u8,
    },
    AddReaction {
        user: u8,
        comment: u8,
        glyph: u8,
    },
    RemoveReaction {
        user: u8,
        comment: u8,
        glyph: u8,
    },
}

/// Naive rendition of the board, that the app must agree with
#[derive(Default)]
struct Model {
    /// (id, parent, content), in insertion order
    comments: Vec<(CommentId, Option<CommentId>, String)>,
    /// (user, comment, glyph), in insertion order and without duplicates
    reactions: Vec<(usize, CommentId, usize)>,
    /// Every id ever handed out, so that ops can also target deleted comments
    known_ids: Vec<CommentId>,
}

impl Model {
    fn pick(&self, idx: u8) -> CommentId {
        if self.known_ids.is_empty() {
            return CommentId::new("missing");
        }
        self.known_ids[usize::from(idx) % self.known_ids.len()].clone()
    }

    fn delete(&mut self, id: &CommentId) -> Vec<CommentId> {
        if !self.comments.iter().any(|(c, _, _)| c == id) {
            return Vec::new();
        }
        let mut removed = vec![id.clone()];
        let mut i = 0;
        // breadth-first is enough to find everyone, the order is checked elsewhere
        while i < removed.len() {
            for (c, p, _) in self.comments.iter() {
                if p.as_ref() == Some(&removed[i]) && !removed.contains(c) {
                    removed.push(c.clone());
                }
            }
            i += 1;
        }
        self.comments.retain(|(c, _, _)| !removed.contains(c));
        self.reactions.retain(|(_, c, _)| !removed.contains(c));
        removed
    }

    fn summarize(&self, comment: &CommentId, viewer: usize) -> Vec<ReactionSummary> {
        let mut res: Vec<ReactionSummary> = Vec::new();
        for (u, c, g) in self.reactions.iter() {
            if c != comment {
                continue;
            }
            match res.iter_mut().find(|s| s.reaction_char == GLYPHS[*g]) {
                Some(s) => {
                    s.count += 1;
                    s.viewer_reacted |= *u == viewer;
                }
                None => res.push(ReactionSummary {
                    reaction_char: String::from(GLYPHS[*g]),
                    count: 1,
                    viewer_reacted: *u == viewer,
                }),
            }
        }
        res
    }
}

async fn run_on_app<Resp>(
    app: &Router,
    method: http::Method,
    uri: &str,
    body: Option<&(dyn erased::Body)>,
) -> Result<Resp, ApiError>
where
    Resp: for<'de> serde::Deserialize<'de>,
{
    let req = request::Builder::new()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    let req = req
        .body(match body {
            None => Body::empty(),
            Some(body) => Body::from(body.to_json()),
        })
        .expect("building request");
    let resp = app.clone().oneshot(req).await.expect("running request");
    let status = resp.status();
    let body = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("recovering resp bytes");
    if status == http::StatusCode::OK {
        return Ok(serde_json::from_slice(&body)
            .unwrap_or_else(|err| panic!("failed parsing resp body {body:?}: {err}")));
    }
    Err(ApiError::parse(&body)
        .unwrap_or_else(|err| panic!("parsing error response body {err}, body is {body:?}")))
}

mod erased {
    pub trait Body: Sync {
        fn to_json(&self) -> Vec<u8>;
    }

    impl<T: serde::Serialize + Sync> Body for T {
        fn to_json(&self) -> Vec<u8> {
            serde_json::to_vec(self).expect("serializing request body to json")
        }
    }
}

fn compare<T>(name: &str, app_res: T, model_res: T)
where
    T: Debug + PartialEq,
{
    assert_eq!(
        app_res, model_res,
        "app and model did not return the same result for {name}"
    );
}

struct ComparativeFuzzer {
    app: Router,
    model: Model,
    origin: SessionId,
}

impl ComparativeFuzzer {
    fn new() -> ComparativeFuzzer {
        let state = AppState {
            board: SharedBoard::new(Board::new(Vec::new())),
            feeds: SessionFeeds::new(),
        };
        ComparativeFuzzer {
            app: app(state, None),
            model: Model::default(),
            // not a live session, changes go nowhere
            origin: SessionId(Uuid::nil()),
        }
    }

    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::CreateComment {
                author,
                parent,
                content,
            } => {
                let parent = parent.map(|p| self.model.pick(p));
                let content = format!("comment {content}");
                let c: Comment = run_on_app(
                    &self.app,
                    http::Method::POST,
                    "/comments",
                    Some(&NewComment {
                        content: content.clone(),
                        author_user_id: UserId::new(USERS[usize::from(author) % USERS.len()]),
                        parent_comment_id: parent.clone(),
                        origin_session_id: self.origin,
                    }),
                )
                .await
                .expect("creating comment");
                compare("CreateComment", (&c.parent_comment_id, &c.content), (&parent, &content));
                assert!(!self.model.known_ids.contains(&c.id), "reused id {:?}", c.id);
                self.model.known_ids.push(c.id.clone());
                self.model.comments.push((c.id, parent, content));
            }
            FuzzOp::UpdateComment { comment, content } => {
                let id = self.model.pick(comment);
                let content = format!("edit {content}");
                let res: Result<Comment, _> = run_on_app(
                    &self.app,
                    http::Method::PUT,
                    "/comments",
                    Some(&CommentEdit {
                        id: id.clone(),
                        content: content.clone(),
                        origin_session_id: self.origin,
                    }),
                )
                .await;
                let expected = match self.model.comments.iter_mut().find(|(c, _, _)| *c == id) {
                    Some(c) => {
                        c.2 = content.clone();
                        Ok(content)
                    }
                    None => Err(ApiError::CommentNotFound(id)),
                };
                compare("UpdateComment", res.map(|c| c.content), expected);
            }
            FuzzOp::DeleteComment { comment } => {
                let id = self.model.pick(comment);
                let removed: Vec<CommentId> = run_on_app(
                    &self.app,
                    http::Method::DELETE,
                    &format!(
                        "/comments?commentId={}&originSessionId={}",
                        id.0, self.origin.0
                    ),
                    None,
                )
                .await
                .expect("deleting comment");
                let mut expected = self.model.delete(&id);
                let mut removed_sorted = removed.clone();
                removed_sorted.sort();
                expected.sort();
                compare("DeleteComment", removed_sorted, expected);
                if let Some(first) = removed.first() {
                    assert_eq!(*first, id, "cascade must start with the deleted comment");
                }
            }
            FuzzOp::AddReaction {
                user,
                comment,
                glyph,
            } => {
                let (user, glyph) = (usize::from(user) % USERS.len(), usize::from(glyph) % GLYPHS.len());
                let id = self.model.pick(comment);
                let res: bool = run_on_app(
                    &self.app,
                    http::Method::POST,
                    "/reactions",
                    Some(&ReactionChange {
                        user_id: UserId::new(USERS[user]),
                        comment_id: id.clone(),
                        reaction_char: String::from(GLYPHS[glyph]),
                        origin_session_id: self.origin,
                    }),
                )
                .await
                .expect("adding reaction");
                let exists = self.model.comments.iter().any(|(c, _, _)| *c == id);
                compare("AddReaction", res, exists);
                if exists && !self.model.reactions.contains(&(user, id.clone(), glyph)) {
                    self.model.reactions.push((user, id, glyph));
                }
            }
            FuzzOp::RemoveReaction {
                user,
                comment,
                glyph,
            } => {
                let (user, glyph) = (usize::from(user) % USERS.len(), usize::from(glyph) % GLYPHS.len());
                let id = self.model.pick(comment);
                let res: bool = run_on_app(
                    &self.app,
                    http::Method::DELETE,
                    &format!(
                        "/reactions?userId={}&commentId={}&reactionChar={}&originSessionId={}",
                        USERS[user],
                        id.0,
                        percent_encode(GLYPHS[glyph]),
                        self.origin.0
                    ),
                    None,
                )
                .await
                .expect("removing reaction");
                let key = (user, id, glyph);
                let expected = self.model.reactions.contains(&key);
                self.model.reactions.retain(|r| *r != key);
                compare("RemoveReaction", res, expected);
            }
        }
    }

    async fn check_state(&self) {
        let list: CommentList = run_on_app(&self.app, http::Method::GET, "/comments", None)
            .await
            .expect("listing comments");
        compare(
            "ListComments",
            list.comments
                .into_iter()
                .map(|c| (c.id, c.parent_comment_id, c.content))
                .collect::<Vec<_>>(),
            self.model.comments.clone(),
        );
        for id in self.model.known_ids.iter() {
            for (viewer, name) in USERS.iter().enumerate() {
                let summary: Vec<ReactionSummary> = run_on_app(
                    &self.app,
                    http::Method::GET,
                    &format!("/reactions?commentId={}&userId={name}", id.0),
                    None,
                )
                .await
                .expect("listing reactions");
                compare("ListReactions", summary, self.model.summarize(id, viewer));
            }
        }
    }
}

fn percent_encode(s: &str) -> String {
    s.bytes().map(|b| format!("%{b:02X}")).collect()
}

do_tokio_test!(
    compare_with_model,
    Vec<FuzzOp>,
    |test: Vec<FuzzOp>| async move {
        let mut fuzzer = ComparativeFuzzer::new();
        for op in test {
            fuzzer.execute_fuzz_op(op).await;
        }
        fuzzer.check_state().await;
    }
);
