use chrono::Utc;

pub use uuid::Uuid;
pub type Time = chrono::DateTime<Utc>;

mod comment;
pub use comment::{Comment, CommentEdit, CommentId, CommentList, DeleteComment, NewComment};

mod error;
pub use error::Error;

mod feed;
pub use feed::{CommentAdded, CommentUpdated, FeedMessage, ReactionChanged, SessionId};

mod reaction;
pub use reaction::{Reaction, ReactionChange, ReactionQuery, ReactionSummary};

mod user;
pub use user::{User, UserId, UserSearch};

/// Request payloads that must be checked before they reach the board.
///
/// Deserialization only guarantees the shape of a request; `validate` checks
/// the contents, so that a successfully validated request can never make the
/// board misbehave.
pub trait Validate {
    fn validate(&self) -> Result<(), Error>;
}

pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

/// Serde helper for parent comment references, where the empty string (or
/// an absent field) designates a root comment.
pub(crate) mod root_as_empty {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::CommentId;

    pub fn serialize<S: Serializer>(id: &Option<CommentId>, s: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => s.serialize_str(&id.0),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<CommentId>, D::Error> {
        Ok(Option::<String>::deserialize(d)?
            .filter(|id| !id.is_empty())
            .map(CommentId))
    }
}
