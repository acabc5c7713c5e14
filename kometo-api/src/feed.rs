use uuid::Uuid;

use crate::{CommentId, ReactionSummary, Time, User};

/// Identifies one connected feed, ie. one client instance
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> SessionId {
        SessionId(Uuid::new_v4())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAdded {
    pub id: CommentId,

    /// None if the author is not a known user
    pub user_info: Option<User>,

    pub content: String,
    pub post_time: Time,
    pub update_time: Time,
    #[serde(default, with = "crate::root_as_empty")]
    pub parent_comment_id: Option<CommentId>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentUpdated {
    pub id: CommentId,
    pub content: String,
    pub update_time: Time,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionChanged {
    pub comment_id: CommentId,

    /// Summary as seen by the user who made the change
    pub reaction_info: Vec<ReactionSummary>,
}

/// Messages sent by the server on a session feed
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum FeedMessage {
    /// First message of every feed, to be echoed as `originSessionId`
    Session { id: SessionId },
    Pong,
    CommentAdded(CommentAdded),
    CommentUpdated(CommentUpdated),
    CommentDeleted { id: CommentId },
    ReactionChanged(ReactionChanged),
}
