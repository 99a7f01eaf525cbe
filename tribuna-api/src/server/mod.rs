use axum::{
    Router,
    extract::{
        FromRef, Request,
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use tribuna_common::{
    model::{
        feed::InvalidFeedCursorError,
        post::InvalidPostContentError,
        session::{SessionTokenDecodeError, SessionTokenHashError},
        user::InvalidUserHandleError,
    },
    password::PasswordHashingError,
};
use tribuna_db::client::{DbClient, DbError};

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Multipart form could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Required field {0:?} is missing")]
    MissingField(&'static str),
    #[error(transparent)]
    InvalidContent(#[from] InvalidPostContentError),
    #[error(transparent)]
    InvalidHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    InvalidCursor(#[from] InvalidFeedCursorError),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided session token could not be decoded: {0}")]
    InvalidSessionToken(#[from] SessionTokenDecodeError),
    #[error("The session token could not be hashed: {0}")]
    SessionTokenHash(#[from] SessionTokenHashError),
    #[error("Password hashing failed: {0}")]
    PasswordHashing(#[from] PasswordHashingError),
    #[error("Provided session was unknown or expired")]
    InvalidSession,
    #[error("Invalid handle or password")]
    BadCredentials,
    #[error("This operation requires admin rights")]
    AdminRequired,
    #[error("The handle is already taken")]
    DuplicateHandle,
    #[error("The interaction already exists")]
    DuplicateInteraction,
    #[error("The interaction was not found")]
    InteractionNotFound,
    #[error("The post was not found")]
    PostNotFound,
    #[error("The user was not found")]
    UserNotFound,
    #[error(transparent)]
    Database(DbError),
}

/// `axum_extra`'s typed-path derive requires `Default` on the rejection type
/// for unit path structs; the rejection fires when the path does not match,
/// which is exactly `UnknownRoute`.
impl Default for ServerError {
    fn default() -> Self {
        ServerError::UnknownRoute(Uri::default())
    }
}

impl From<DbError> for ServerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateHandle => ServerError::DuplicateHandle,
            DbError::DuplicateInteraction => ServerError::DuplicateInteraction,
            DbError::InteractionNotFound => ServerError::InteractionNotFound,
            DbError::PostNotFound => ServerError::PostNotFound,
            DbError::UserNotFound => ServerError::UserNotFound,
            err @ (DbError::Data(_) | DbError::Sqlx(_)) => ServerError::Database(err),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::InteractionNotFound
            | ServerError::PostNotFound
            | ServerError::UserNotFound => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidSessionToken(_)
            | ServerError::InvalidSession
            | ServerError::BadCredentials => StatusCode::UNAUTHORIZED,
            ServerError::AdminRequired => StatusCode::FORBIDDEN,
            ServerError::DuplicateInteraction => StatusCode::CONFLICT,
            ServerError::PathRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::Multipart(_)
            | ServerError::MissingField(_)
            | ServerError::InvalidContent(_)
            | ServerError::InvalidHandle(_)
            | ServerError::InvalidCursor(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::DuplicateHandle => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::SessionTokenHash(_)
            | ServerError::PasswordHashing(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        // Store and transport failures only surface as a generic message;
        // the cause stays in the server logs.
        let message = if status.is_server_error() {
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message,
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert_eq!(
            ServerError::InvalidSession.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ServerError::AdminRequired.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ServerError::DuplicateInteraction.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::InteractionNotFound.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ServerError::PostNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServerError::DuplicateHandle.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::MissingField("content").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn store_failures_are_classified() {
        assert_eq!(
            ServerError::from(DbError::DuplicateInteraction).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::from(DbError::PostNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::from(DbError::DuplicateHandle).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(DbError::Sqlx(sqlx::Error::PoolClosed)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
