use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::Json,
    routes::{FeedQuery, parse_cursor, read_data_url},
};
use axum::extract::{Multipart, Query, State};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tribuna_common::model::{
    feed::FeedPage,
    user::{ProfileUpdate, User, UserHandle, UserIdentifier},
};
use tribuna_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_profile)
        .typed_get(get_profile_tweets)
        .typed_post(update_profile)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/profile/{identifier}", rejection(ServerError))]
struct ProfilePath {
    identifier: UserIdentifier,
}

async fn get_profile(
    ProfilePath { identifier }: ProfilePath,
    State(db): State<Arc<DbClient>>,
    _viewer: AuthenticatedUser,
) -> Result<Json<User>> {
    let user = db
        .resolve_user(&identifier)
        .await?
        .ok_or(ServerError::UserNotFound)?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/profile/{identifier}/tweets", rejection(ServerError))]
struct ProfileTweetsPath {
    identifier: UserIdentifier,
}

async fn get_profile_tweets(
    ProfileTweetsPath { identifier }: ProfileTweetsPath,
    State(db): State<Arc<DbClient>>,
    viewer: AuthenticatedUser,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>> {
    let target = db
        .resolve_user(&identifier)
        .await?
        .ok_or(ServerError::UserNotFound)?;

    let cursor = parse_cursor(query.cursor.as_deref())?;
    let page = db
        .profile_timeline(target.id, viewer.user_id(), cursor)
        .await?
        .ok_or(ServerError::UserNotFound)?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/profile/update", rejection(ServerError))]
struct ProfileUpdatePath;

async fn update_profile(
    _: ProfileUpdatePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<User>> {
    let mut handle = None;
    let mut bio = None;
    let mut avatar_image = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some("handle") => handle = Some(field.text().await?),
            Some("bio") => bio = Some(field.text().await?),
            Some("avatar") => avatar_image = Some(read_data_url(field).await?),
            _ => {}
        }
    }

    let handle = UserHandle::new(handle.ok_or(ServerError::MissingField("handle"))?)?;
    let updated = db
        .update_profile(
            user.user_id(),
            &ProfileUpdate {
                handle,
                bio,
                avatar_image,
            },
        )
        .await?;

    Ok(Json(updated))
}
