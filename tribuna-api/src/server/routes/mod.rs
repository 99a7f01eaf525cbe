use crate::server::{Result, ServerRouter};
use axum::extract::multipart::Field;
use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use tribuna_common::model::feed::FeedCursor;

mod admin;
mod profile;
mod session;
mod tweets;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(tweets::routes())
        .merge(profile::routes())
        .merge(admin::routes())
        .merge(users::routes())
        .merge(session::routes())
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub(crate) struct FeedQuery {
    pub cursor: Option<String>,
}

pub(crate) fn parse_cursor(cursor: Option<&str>) -> Result<Option<FeedCursor>> {
    Ok(cursor.map(str::parse).transpose()?)
}

/// Uploaded files are kept inline as base64 data-URLs, like the rest of the
/// media handling in this service. No filesystem or object storage involved.
pub(crate) async fn read_data_url(field: Field<'_>) -> Result<String> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_owned();
    let bytes = field.bytes().await?;

    Ok(format!(
        "data:{content_type};base64,{}",
        BASE64_STANDARD.encode(&bytes)
    ))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub(crate) struct Ack {
    pub success: bool,
}
