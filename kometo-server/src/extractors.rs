use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query},
    http::{request, Request},
    Json,
};
use kometo_api::Validate;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{db::Board, Error, SessionFeeds};

#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub board: SharedBoard,
    pub feeds: SessionFeeds,
}

/// The board, shared between all request handlers
///
/// Reads may proceed concurrently, writes are serialized and never observed
/// half-done.
#[derive(Clone, Debug)]
pub struct SharedBoard(Arc<RwLock<Board>>);

impl SharedBoard {
    pub fn new(board: Board) -> SharedBoard {
        SharedBoard(Arc::new(RwLock::new(board)))
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Board> {
        self.0.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Board> {
        self.0.write().await
    }
}

/// JSON body that was successfully validated
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for ValidJson<T>
where
    Json<T>: FromRequest<S, B>,
    <Json<T> as FromRequest<S, B>>::Rejection: std::fmt::Display,
    T: Validate,
    S: Send + Sync,
    B: Send + 'static,
{
    type Rejection = Error;

    async fn from_request(req: Request<B>, state: &S) -> Result<ValidJson<T>, Error> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| Error::malformed_request(e.to_string()))?;
        data.validate()?;
        Ok(ValidJson(data))
    }
}

/// Query string that was successfully validated
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    Query<T>: FromRequestParts<S>,
    <Query<T> as FromRequestParts<S>>::Rejection: std::fmt::Display,
    T: Validate,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &S,
    ) -> Result<ValidQuery<T>, Error> {
        let Query(data) = Query::<T>::from_request_parts(req, state)
            .await
            .map_err(|e| Error::malformed_request(e.to_string()))?;
        data.validate()?;
        Ok(ValidQuery(data))
    }
}
