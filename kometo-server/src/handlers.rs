use axum::{
    extract::{Path, State, WebSocketUpgrade},
    Json,
};
use futures::StreamExt;
use kometo_api::{
    Comment, CommentAdded, CommentEdit, CommentId, CommentList, CommentUpdated, DeleteComment,
    FeedMessage, NewComment, ReactionChange, ReactionChanged, ReactionQuery, ReactionSummary, User,
    UserId, UserSearch,
};

use crate::{extractors::*, Error, SessionFeeds};

pub async fn fetch_comments(State(board): State<SharedBoard>) -> Json<CommentList> {
    Json(CommentList {
        has_more: false,
        comments: board.read().await.comments().to_vec(),
    })
}

pub async fn create_comment(
    State(board): State<SharedBoard>,
    State(feeds): State<SessionFeeds>,
    ValidJson(data): ValidJson<NewComment>,
) -> Result<Json<Comment>, Error> {
    let (comment, author) = {
        let mut board = board.write().await;
        let comment =
            board.create_comment(data.author_user_id, data.parent_comment_id, data.content);
        let author = board.user(&comment.author_user_id).cloned();
        (comment, author)
    };
    feeds
        .relay(
            data.origin_session_id,
            FeedMessage::CommentAdded(CommentAdded {
                id: comment.id.clone(),
                user_info: author,
                content: comment.content.clone(),
                post_time: comment.post_time,
                update_time: comment.update_time,
                parent_comment_id: comment.parent_comment_id.clone(),
            }),
        )
        .await;
    Ok(Json(comment))
}

pub async fn update_comment(
    State(board): State<SharedBoard>,
    State(feeds): State<SessionFeeds>,
    ValidJson(data): ValidJson<CommentEdit>,
) -> Result<Json<Comment>, Error> {
    let comment = board
        .write()
        .await
        .update_comment(&data.id, data.content)
        .ok_or_else(|| Error::comment_not_found(data.id))?;
    feeds
        .relay(
            data.origin_session_id,
            FeedMessage::CommentUpdated(CommentUpdated {
                id: comment.id.clone(),
                content: comment.content.clone(),
                update_time: comment.update_time,
            }),
        )
        .await;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(board): State<SharedBoard>,
    State(feeds): State<SessionFeeds>,
    ValidQuery(data): ValidQuery<DeleteComment>,
) -> Result<Json<Vec<CommentId>>, Error> {
    let removed = board.write().await.delete_comment_cascade(&data.comment_id);
    if !removed.is_empty() {
        let events = removed
            .iter()
            .map(|id| FeedMessage::CommentDeleted { id: id.clone() })
            .collect();
        feeds.relay_all(data.origin_session_id, events).await;
    }
    Ok(Json(removed))
}

pub async fn fetch_reactions(
    State(board): State<SharedBoard>,
    ValidQuery(q): ValidQuery<ReactionQuery>,
) -> Result<Json<Vec<ReactionSummary>>, Error> {
    Ok(Json(
        board
            .read()
            .await
            .summarize_reactions(&q.comment_id, &q.user_id),
    ))
}

pub async fn add_reaction(
    State(board): State<SharedBoard>,
    State(feeds): State<SessionFeeds>,
    ValidJson(data): ValidJson<ReactionChange>,
) -> Result<Json<bool>, Error> {
    let (added, reaction_info) = {
        let mut board = board.write().await;
        let added = board.add_reaction(data.reaction());
        (
            added,
            board.summarize_reactions(&data.comment_id, &data.user_id),
        )
    };
    if added {
        relay_reactions(&feeds, data, reaction_info).await;
    }
    Ok(Json(added))
}

pub async fn remove_reaction(
    State(board): State<SharedBoard>,
    State(feeds): State<SessionFeeds>,
    ValidQuery(data): ValidQuery<ReactionChange>,
) -> Result<Json<bool>, Error> {
    let (removed, reaction_info) = {
        let mut board = board.write().await;
        let removed = board.remove_reaction(&data.reaction());
        (
            removed,
            board.summarize_reactions(&data.comment_id, &data.user_id),
        )
    };
    relay_reactions(&feeds, data, reaction_info).await;
    Ok(Json(removed))
}

async fn relay_reactions(
    feeds: &SessionFeeds,
    data: ReactionChange,
    reaction_info: Vec<ReactionSummary>,
) {
    feeds
        .relay(
            data.origin_session_id,
            FeedMessage::ReactionChanged(ReactionChanged {
                comment_id: data.comment_id,
                reaction_info,
            }),
        )
        .await;
}

pub async fn fetch_user(
    State(board): State<SharedBoard>,
    Path(id): Path<UserId>,
) -> Result<Json<User>, Error> {
    kometo_api::validate_string(&id.0)?;
    match board.read().await.user(&id) {
        Some(u) => Ok(Json(u.clone())),
        None => Err(Error::user_not_found(id)),
    }
}

pub async fn find_users(
    State(board): State<SharedBoard>,
    ValidQuery(q): ValidQuery<UserSearch>,
) -> Json<Vec<User>> {
    Json(board.read().await.find_users(&q.filter_text))
}

pub async fn session_feed(
    ws: WebSocketUpgrade,
    State(feeds): State<SessionFeeds>,
) -> axum::response::Response {
    ws.on_upgrade(move |sock| async move {
        let (write, read) = sock.split();
        let session = feeds.add_session(write, read).await;
        let sessions = feeds.num_sessions().await;
        tracing::debug!(?session, sessions, "session feed websocket connected");
    })
}
