use anyhow::{anyhow, Context};
use serde_json::json;

use crate::{CommentId, UserId};

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Comment not found {0:?}")]
    CommentNotFound(CommentId),

    #[error("User not found {0:?}")]
    UserNotFound(UserId),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Invalid reaction character {0:?}")]
    InvalidReaction(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::UserNotFound(_) => StatusCode::NOT_FOUND,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::InvalidReaction(_) => StatusCode::BAD_REQUEST,
            Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::CommentNotFound(id) => json!({
                "message": "comment not found",
                "type": "comment-not-found",
                "id": id,
            }),
            Error::UserNotFound(id) => json!({
                "message": "user not found",
                "type": "user-not-found",
                "id": id,
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::InvalidReaction(c) => json!({
                "message": "reaction character must not be empty",
                "type": "invalid-reaction",
                "reactionChar": c,
            }),
            Error::MalformedRequest(msg) => json!({
                "message": msg,
                "type": "malformed-request",
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let field = |name: &str| {
            data.get(name)
                .and_then(|f| f.as_str())
                .map(String::from)
                .ok_or_else(|| anyhow!("error contents has no string field {name:?}"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(field("message").unwrap_or_default()),
                "comment-not-found" => Error::CommentNotFound(CommentId(field("id")?)),
                "user-not-found" => Error::UserNotFound(UserId(field("id")?)),
                "null-byte" => Error::NullByteInString(field("string")?),
                "invalid-reaction" => Error::InvalidReaction(field("reactionChar")?),
                "malformed-request" => Error::MalformedRequest(field("message")?),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
