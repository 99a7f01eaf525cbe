use crate::server::{Result, ServerError, ServerRouter, auth::AdminUser, json::Json, routes::Ack};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tribuna_common::{
    model::{
        Id,
        post::PostMarker,
        user::{User, UserMarker},
    },
    password::Password,
};
use tribuna_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_users)
        .typed_delete(delete_tweet)
        .typed_post(reset_password)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/admin/users", rejection(ServerError))]
struct AdminUsersPath;

async fn list_users(
    _: AdminUsersPath,
    State(db): State<Arc<DbClient>>,
    _admin: AdminUser,
) -> Result<Json<Vec<User>>> {
    let users = db.list_all_users().await?;

    Ok(Json(users))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/admin/tweets/{id}", rejection(ServerError))]
struct AdminTweetPath {
    id: Id<PostMarker>,
}

async fn delete_tweet(
    AdminTweetPath { id }: AdminTweetPath,
    State(db): State<Arc<DbClient>>,
    _admin: AdminUser,
) -> Result<Json<Ack>> {
    db.admin_delete_post(id).await?;

    Ok(Json(Ack { success: true }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/admin/users/{id}/reset-password", rejection(ServerError))]
struct ResetPasswordPath {
    id: Id<UserMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    new_password: Password,
}

/// The new secret is supplied by the admin and only its hash is stored; the
/// response never echoes it back.
async fn reset_password(
    ResetPasswordPath { id }: ResetPasswordPath,
    State(db): State<Arc<DbClient>>,
    _admin: AdminUser,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Ack>> {
    let password_hash = request.new_password.hash()?;
    db.reset_password(id, &password_hash).await?;

    Ok(Json(Ack { success: true }))
}
