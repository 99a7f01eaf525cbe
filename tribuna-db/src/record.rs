use sqlx::FromRow;
use time::OffsetDateTime;
use tribuna_common::model::{
    ModelValidationError,
    post::{Post, TimelinePost},
    session::Session,
    user::{User, UserHandle},
};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub handle: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub avatar_image: Option<String>,
    pub avatar_color: String,
    pub is_admin: bool,
    pub created_at: OffsetDateTime,
}

/// `UserRecord` plus the stored hash, only ever fetched for login checks.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CredentialRecord {
    #[sqlx(flatten)]
    pub user: UserRecord,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_id: i64,
    pub content: String,
    pub media_payload: Option<String>,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub is_comment: bool,
    pub like_count: i64,
    pub repost_count: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct TimelinePostRecord {
    pub post_id: i64,
    pub content: String,
    pub media_payload: Option<String>,
    pub parent_id: Option<i64>,
    pub is_comment: bool,
    pub like_count: i64,
    pub repost_count: i64,
    pub created_at: OffsetDateTime,
    pub author_id: i64,
    pub handle: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub avatar_image: Option<String>,
    pub avatar_color: String,
    pub is_admin: bool,
    pub author_created_at: OffsetDateTime,
    pub comment_count: i64,
    pub is_liked: bool,
    pub is_reposted: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct SessionRecord {
    pub user_id: i64,
    pub is_admin: bool,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            handle: UserHandle::new(value.handle)?,
            full_name: value.full_name,
            bio: value.bio,
            avatar_image: value.avatar_image,
            avatar_color: value.avatar_color,
            is_admin: value.is_admin,
            created_at: value.created_at,
        })
    }
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: value.post_id.into(),
            content: value.content,
            media_payload: value.media_payload,
            author_id: value.author_id.into(),
            parent_id: value.parent_id.map(Into::into),
            is_comment: value.is_comment,
            like_count: value.like_count,
            repost_count: value.repost_count,
            created_at: value.created_at,
        }
    }
}

impl TryFrom<TimelinePostRecord> for TimelinePost {
    type Error = ModelValidationError;

    fn try_from(value: TimelinePostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_id.into(),
            content: value.content,
            media_payload: value.media_payload,
            parent_id: value.parent_id.map(Into::into),
            is_comment: value.is_comment,
            author: User {
                id: value.author_id.into(),
                handle: UserHandle::new(value.handle)?,
                full_name: value.full_name,
                bio: value.bio,
                avatar_image: value.avatar_image,
                avatar_color: value.avatar_color,
                is_admin: value.is_admin,
                created_at: value.author_created_at,
            },
            like_count: value.like_count,
            repost_count: value.repost_count,
            comment_count: value.comment_count,
            is_liked: value.is_liked,
            is_reposted: value.is_reposted,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<SessionRecord> for Session {
    type Error = ModelValidationError;

    fn try_from(value: SessionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            is_admin: value.is_admin,
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_at: value.expires_at,
        })
    }
}
