use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tribuna_common::model::user::User;
use tribuna_db::client::DbClient;

const SUGGESTED_USER_LIMIT: i64 = 4;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_delegates)
        .typed_get(suggested_users)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/delegates", rejection(ServerError))]
struct DelegatesPath;

async fn list_delegates(
    _: DelegatesPath,
    State(db): State<Arc<DbClient>>,
    _viewer: AuthenticatedUser,
) -> Result<Json<Vec<User>>> {
    let delegates = db.list_delegates().await?;

    Ok(Json(delegates))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/suggested", rejection(ServerError))]
struct SuggestedPath;

async fn suggested_users(
    _: SuggestedPath,
    State(db): State<Arc<DbClient>>,
    viewer: AuthenticatedUser,
) -> Result<Json<Vec<User>>> {
    let suggested = db
        .suggest_users(viewer.user_id(), SUGGESTED_USER_LIMIT)
        .await?;

    Ok(Json(suggested))
}
