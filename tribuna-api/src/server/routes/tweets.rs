use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::Json,
    routes::{FeedQuery, parse_cursor, read_data_url},
};
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tribuna_common::model::{
    Id,
    feed::FeedPage,
    post::{CreateComment, CreatePost, Post, PostContent, PostMarker, TimelinePost},
};
use tribuna_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_feed)
        .typed_post(create_tweet)
        .typed_post(create_like)
        .typed_delete(delete_like)
        .typed_post(create_repost)
        .typed_delete(delete_repost)
        .typed_post(create_comment)
        .typed_get(get_comments)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/tweets", rejection(ServerError))]
struct FeedPath;

async fn get_feed(
    _: FeedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>> {
    let cursor = parse_cursor(query.cursor.as_deref())?;
    let page = db.home_timeline(user.user_id(), cursor).await?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/tweets", rejection(ServerError))]
struct ComposePath;

async fn create_tweet(
    _: ComposePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Post>)> {
    let mut content = String::new();
    let mut media_payload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some("content") => content = field.text().await?,
            Some("media") => media_payload = Some(read_data_url(field).await?),
            _ => {}
        }
    }

    let content = PostContent::new(content, media_payload.is_some())?;
    let post = db
        .create_post(&CreatePost {
            author: user.user_id(),
            content,
            media_payload,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/tweets/{id}/like", rejection(ServerError))]
struct LikePath {
    id: Id<PostMarker>,
}

async fn create_like(
    LikePath { id }: LikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.create_like(user.user_id(), id).await?;

    Ok(StatusCode::CREATED)
}

async fn delete_like(
    LikePath { id }: LikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_like(user.user_id(), id).await?;

    Ok(StatusCode::OK)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/tweets/{id}/repost", rejection(ServerError))]
struct RepostPath {
    id: Id<PostMarker>,
}

async fn create_repost(
    RepostPath { id }: RepostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.create_repost(user.user_id(), id).await?;

    Ok(StatusCode::CREATED)
}

async fn delete_repost(
    RepostPath { id }: RepostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_repost(user.user_id(), id).await?;

    Ok(StatusCode::OK)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/tweets/{id}/comments", rejection(ServerError))]
struct CommentsPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct CreateCommentRequest {
    content: String,
}

async fn create_comment(
    CommentsPath { id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Post>)> {
    let content = PostContent::new(request.content, false)?;
    let comment = db
        .create_comment(&CreateComment {
            author: user.user_id(),
            parent: id,
            content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentsResponse {
    success: bool,
    count: usize,
    comments: Vec<TimelinePost>,
}

async fn get_comments(
    CommentsPath { id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<CommentsResponse>> {
    let comments = db
        .fetch_comments(id, viewer.map(AuthenticatedUser::user_id))
        .await?
        .ok_or(ServerError::PostNotFound)?;

    Ok(Json(CommentsResponse {
        success: true,
        count: comments.len(),
        comments,
    }))
}
