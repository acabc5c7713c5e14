use kometo_api::{CommentId, Error as ApiError, UserId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn comment_not_found(id: CommentId) -> Error {
        Error::Api(ApiError::CommentNotFound(id))
    }

    pub fn user_not_found(id: UserId) -> Error {
        Error::Api(ApiError::UserNotFound(id))
    }

    pub fn malformed_request(msg: String) -> Error {
        Error::Api(ApiError::MalformedRequest(msg))
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let err = match self {
            Error::Anyhow(err) => {
                tracing::error!(?err, "internal server error");
                #[cfg(not(test))]
                let err =
                    ApiError::Unknown(String::from("Internal server error, see logs for details"));
                #[cfg(test)]
                let err = ApiError::Unknown(format!("Internal server error: {err:?}"));
                err
            }
            Error::Api(err) => {
                tracing::info!("returning error to client: {err}");
                err
            }
        };
        (
            err.status_code(),
            [(
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderValue::from_static("application/json"),
            )],
            err.contents(),
        )
            .into_response()
    }
}
