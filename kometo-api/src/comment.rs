use crate::{validate_string, Error, SessionId, Time, UserId, Validate};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn new(id: &str) -> CommentId {
        CommentId(String::from(id))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub author_user_id: UserId,
    pub post_time: Time,
    pub update_time: Time,

    /// None for root comments
    #[serde(default, with = "crate::root_as_empty")]
    pub parent_comment_id: Option<CommentId>,

    pub content: String,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentList {
    /// Always false, the whole list is returned at once
    pub has_more: bool,
    pub comments: Vec<Comment>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    pub author_user_id: UserId,
    #[serde(default, with = "crate::root_as_empty")]
    pub parent_comment_id: Option<CommentId>,
    pub origin_session_id: SessionId,
}

impl Validate for NewComment {
    fn validate(&self) -> Result<(), Error> {
        validate_string(&self.content)?;
        validate_string(&self.author_user_id.0)?;
        if let Some(parent) = &self.parent_comment_id {
            validate_string(&parent.0)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentEdit {
    pub id: CommentId,
    pub content: String,
    pub origin_session_id: SessionId,
}

impl Validate for CommentEdit {
    fn validate(&self) -> Result<(), Error> {
        validate_string(&self.id.0)?;
        validate_string(&self.content)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteComment {
    pub comment_id: CommentId,
    pub origin_session_id: SessionId,
}

impl Validate for DeleteComment {
    fn validate(&self) -> Result<(), Error> {
        validate_string(&self.comment_id.0)
    }
}
