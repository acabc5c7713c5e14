use crate::{validate_string, CommentId, Error, SessionId, UserId, Validate};

/// A single reaction record, identified by the whole triple
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: UserId,
    pub comment_id: CommentId,
    pub reaction_char: String,
}

/// Reactions of one glyph on one comment, as seen by a given viewer
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
    pub reaction_char: String,
    pub count: usize,

    #[serde(rename = "currentUserReacted")]
    pub viewer_reacted: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionQuery {
    pub comment_id: CommentId,
    pub user_id: UserId,
}

impl Validate for ReactionQuery {
    fn validate(&self) -> Result<(), Error> {
        validate_string(&self.comment_id.0)?;
        validate_string(&self.user_id.0)
    }
}

/// Body of a reaction addition, or query string of a reaction removal
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionChange {
    pub user_id: UserId,
    pub comment_id: CommentId,
    pub reaction_char: String,
    pub origin_session_id: SessionId,
}

impl ReactionChange {
    pub fn reaction(&self) -> Reaction {
        Reaction {
            user_id: self.user_id.clone(),
            comment_id: self.comment_id.clone(),
            reaction_char: self.reaction_char.clone(),
        }
    }
}

impl Validate for ReactionChange {
    fn validate(&self) -> Result<(), Error> {
        validate_string(&self.user_id.0)?;
        validate_string(&self.comment_id.0)?;
        validate_string(&self.reaction_char)?;
        if self.reaction_char.is_empty() {
            return Err(Error::InvalidReaction(self.reaction_char.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Uuid;

    fn change(c: &str) -> ReactionChange {
        ReactionChange {
            user_id: UserId::new("0"),
            comment_id: CommentId::new("1"),
            reaction_char: String::from(c),
            origin_session_id: SessionId(Uuid::nil()),
        }
    }

    #[test]
    fn empty_reactions_are_rejected() {
        assert_eq!(change("👍").validate(), Ok(()));
        assert_eq!(
            change("").validate(),
            Err(Error::InvalidReaction(String::new()))
        );
    }

    #[test]
    fn summary_keeps_client_field_names() {
        let s = ReactionSummary {
            reaction_char: String::from("🔥"),
            count: 2,
            viewer_reacted: true,
        };
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            serde_json::json!({
                "reactionChar": "🔥",
                "count": 2,
                "currentUserReacted": true,
            })
        );
    }
}
