use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{AuthenticatedUser, PresentedSession},
    json::Json,
    routes::Ack,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tribuna_common::{
    model::{
        session::SessionToken,
        user::{CreateUser, FullName, User, UserHandle},
    },
    password::{Password, verify_password},
};
use tribuna_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
        .typed_get(current_user)
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user: User,
    token: String,
}

async fn open_session(db: &DbClient, user: User) -> Result<SessionResponse> {
    let token = SessionToken::generate_random();
    db.create_session(user.id, &token.hash()?).await?;

    Ok(SessionResponse {
        token: token.as_token_str(),
        user,
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/register", rejection(ServerError))]
struct RegisterPath;

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    handle: UserHandle,
    password: Password,
    full_name: FullName,
}

async fn register(
    _: RegisterPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let password_hash = request.password.hash()?;
    let user = db
        .create_user(&CreateUser {
            handle: request.handle,
            password_hash,
            full_name: request.full_name,
        })
        .await?;

    let response = open_session(&db, user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/login", rejection(ServerError))]
struct LoginPath;

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct LoginRequest {
    handle: String,
    password: String,
}

async fn login(
    _: LoginPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let (user, stored_hash) = db
        .fetch_credentials(&request.handle)
        .await?
        .ok_or(ServerError::BadCredentials)?;

    if !verify_password(&request.password, &stored_hash)? {
        return Err(ServerError::BadCredentials);
    }

    Ok(Json(open_session(&db, user).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/logout", rejection(ServerError))]
struct LogoutPath;

async fn logout(
    _: LogoutPath,
    State(db): State<Arc<DbClient>>,
    PresentedSession(token_hash): PresentedSession,
) -> Result<Json<Ack>> {
    // Revocation is idempotent; an already-deleted session is still a
    // successful logout.
    db.delete_session(&token_hash).await?;

    Ok(Json(Ack { success: true }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/user", rejection(ServerError))]
struct CurrentUserPath;

async fn current_user(
    _: CurrentUserPath,
    State(db): State<Arc<DbClient>>,
    viewer: AuthenticatedUser,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(viewer.user_id())
        .await?
        .ok_or(ServerError::UserNotFound)?;

    Ok(Json(user))
}
