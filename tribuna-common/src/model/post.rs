use crate::model::{
    Id,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_CONTENT_MAX_LEN: usize = 280;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A bare post row. Comments are posts too: they carry a parent reference
/// and are hidden from top-level timelines.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub content: String,
    pub media_payload: Option<String>,
    pub author_id: Id<UserMarker>,
    pub parent_id: Option<Id<PostMarker>>,
    pub is_comment: bool,
    pub like_count: i64,
    pub repost_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A post as assembled for a timeline: author joined in, live comment count,
/// and the viewer-relative interaction flags.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePost {
    pub id: Id<PostMarker>,
    pub content: String,
    pub media_payload: Option<String>,
    pub parent_id: Option<Id<PostMarker>>,
    pub is_comment: bool,
    pub author: User,
    pub like_count: i64,
    pub repost_count: i64,
    pub comment_count: i64,
    pub is_liked: bool,
    pub is_reposted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
    pub media_payload: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateComment {
    pub author: Id<UserMarker>,
    pub parent: Id<PostMarker>,
    pub content: PostContent,
}

/// Validated post body. Empty content is only legal when the post carries a
/// media attachment.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct PostContent(String);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum InvalidPostContentError {
    #[error("Post content is empty and no media is attached")]
    Empty,
    #[error("Post content exceeds {POST_CONTENT_MAX_LEN} characters")]
    TooLong,
}

impl PostContent {
    pub fn new(content: String, has_media: bool) -> Result<Self, InvalidPostContentError> {
        if content.trim().is_empty() && !has_media {
            return Err(InvalidPostContentError::Empty);
        }
        if content.chars().count() > POST_CONTENT_MAX_LEN {
            return Err(InvalidPostContentError::TooLong);
        }
        Ok(PostContent(content))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_requires_text_or_media() {
        assert_eq!(
            PostContent::new(String::new(), false),
            Err(InvalidPostContentError::Empty)
        );
        assert_eq!(
            PostContent::new("   ".to_owned(), false),
            Err(InvalidPostContentError::Empty)
        );
        assert!(PostContent::new(String::new(), true).is_ok());
        assert!(PostContent::new("hello".to_owned(), false).is_ok());
    }

    #[test]
    fn content_length_is_counted_in_chars() {
        assert!(PostContent::new("x".repeat(280), false).is_ok());
        assert!(PostContent::new("x".repeat(281), false).is_err());
        // 280 multi-byte characters are fine even though they exceed 280 bytes.
        assert!(PostContent::new("á".repeat(280), false).is_ok());
    }
}
