use crate::record::{
    CredentialRecord, PostRecord, SessionRecord, TimelinePostRecord, UserRecord,
};
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tribuna_common::model::{
    Id, ModelValidationError,
    feed::{FEED_PAGE_SIZE, FeedCursor, FeedPage},
    post::{CreateComment, CreatePost, Post, PostMarker, TimelinePost},
    session::{SESSION_LIFETIME, Session, SessionTokenHash},
    user::{CreateUser, ProfileUpdate, User, UserIdentifier, UserMarker},
};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The handle is already taken")]
    DuplicateHandle,
    #[error("The interaction already exists for this user and post")]
    DuplicateInteraction,
    #[error("The interaction does not exist for this user and post")]
    InteractionNotFound,
    #[error("The post does not exist")]
    PostNotFound,
    #[error("The user does not exist")]
    UserNotFound,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

const USER_COLUMNS: &str = "user_id, handle, full_name, bio, avatar_image, avatar_color, \
     is_admin, created_at";

/// Columns for timeline assembly: the post row, its author, a live reply
/// count, and the viewer-relative interaction flags. `$1` is the viewer
/// (nullable for anonymous reads).
const TIMELINE_COLUMNS: &str = "\
     posts.post_id, posts.content, posts.media_payload, posts.parent_id, \
     posts.is_comment, posts.like_count, posts.repost_count, posts.created_at, \
     users.user_id AS author_id, users.handle, users.full_name, users.bio, \
     users.avatar_image, users.avatar_color, users.is_admin, \
     users.created_at AS author_created_at, \
     (SELECT count(*) FROM posts AS replies \
         WHERE replies.parent_id = posts.post_id) AS comment_count, \
     EXISTS(SELECT 1 FROM likes \
         WHERE likes.post_id = posts.post_id \
         AND likes.user_id = $1) AS is_liked, \
     EXISTS(SELECT 1 FROM reposts \
         WHERE reposts.post_id = posts.post_id \
         AND reposts.user_id = $1) AS is_reposted";

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (handle, password_hash, full_name)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user.handle.get())
            .bind(&user.password_hash)
            .bind(user.full_name.get())
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    DbError::DuplicateHandle
                } else {
                    err.into()
                }
            })?;

        Ok(record.try_into()?)
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(User::try_from).transpose()?)
    }

    pub async fn fetch_user_by_handle(&self, handle: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE handle = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(User::try_from).transpose()?)
    }

    /// Dual-mode lookup: numeric input resolves by id, anything else by
    /// handle. A purely numeric handle is shadowed by id lookup.
    pub async fn resolve_user(&self, identifier: &UserIdentifier) -> Result<Option<User>> {
        match identifier {
            UserIdentifier::Id(id) => self.fetch_user(*id).await,
            UserIdentifier::Handle(handle) => self.fetch_user_by_handle(handle).await,
        }
    }

    pub async fn fetch_credentials(&self, handle: &str) -> Result<Option<(User, String)>> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE handle = $1"
        );
        let record = sqlx::query_as::<_, CredentialRecord>(&sql)
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;

        record
            .map(|record| Ok((record.user.try_into()?, record.password_hash)))
            .transpose()
    }

    pub async fn update_profile(
        &self,
        user_id: Id<UserMarker>,
        update: &ProfileUpdate,
    ) -> Result<User> {
        let sql = format!(
            "UPDATE users
             SET handle = $2,
                 bio = COALESCE($3, bio),
                 avatar_image = COALESCE($4, avatar_image)
             WHERE user_id = $1
             RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id.get())
            .bind(update.handle.get())
            .bind(update.bio.as_deref())
            .bind(update.avatar_image.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    DbError::DuplicateHandle
                } else {
                    err.into()
                }
            })?
            .ok_or(DbError::UserNotFound)?;

        Ok(record.try_into()?)
    }

    pub async fn list_all_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY handle");
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?)
    }

    pub async fn list_delegates(&self) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE NOT is_admin ORDER BY handle"
        );
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?)
    }

    pub async fn suggest_users(
        &self,
        exclude: Id<UserMarker>,
        limit: i64,
    ) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE user_id <> $1 AND NOT is_admin
             ORDER BY random()
             LIMIT $2"
        );
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(exclude.get())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?)
    }

    pub async fn reset_password(
        &self,
        user_id: Id<UserMarker>,
        password_hash: &str,
    ) -> Result<()> {
        let updated = sqlx::query("UPDATE users SET password_hash = $2 WHERE user_id = $1")
            .bind(user_id.get())
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::UserNotFound);
        }

        Ok(())
    }

    pub async fn create_session(
        &self,
        user_id: Id<UserMarker>,
        token_hash: &SessionTokenHash,
    ) -> Result<()> {
        let expires_at = OffsetDateTime::now_utc() + SESSION_LIFETIME;

        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&token_hash.0[..])
        .bind(user_id.get())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_session(
        &self,
        token_hash: &SessionTokenHash,
    ) -> Result<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT sessions.user_id, users.is_admin, sessions.token_hash,
                    sessions.created_at, sessions.expires_at
             FROM sessions JOIN users ON users.user_id = sessions.user_id
             WHERE sessions.token_hash = $1",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Session::try_from).transpose()?)
    }

    pub async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(deleted.rows_affected() > 0)
    }

    pub async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let record = sqlx::query_as::<_, PostRecord>(
            "INSERT INTO posts (content, media_payload, author_id)
             VALUES ($1, $2, $3)
             RETURNING post_id, content, media_payload, author_id, parent_id,
                       is_comment, like_count, repost_count, created_at",
        )
        .bind(post.content.get())
        .bind(post.media_payload.as_deref())
        .bind(post.author.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    pub async fn create_comment(&self, comment: &CreateComment) -> Result<Post> {
        let record = sqlx::query_as::<_, PostRecord>(
            "INSERT INTO posts (content, author_id, parent_id, is_comment)
             SELECT $1, $2, posts.post_id, TRUE
             FROM posts
             WHERE posts.post_id = $3
             RETURNING post_id, content, media_payload, author_id, parent_id,
                       is_comment, like_count, repost_count, created_at",
        )
        .bind(comment.content.get())
        .bind(comment.author.get())
        .bind(comment.parent.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::PostNotFound)?;

        Ok(record.into())
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = sqlx::query_as::<_, PostRecord>(
            "SELECT post_id, content, media_payload, author_id, parent_id,
                    is_comment, like_count, repost_count, created_at
             FROM posts
             WHERE post_id = $1",
        )
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Post::from))
    }

    /// Home timeline: root posts only, newest first, strictly older than the
    /// cursor when one is given. Ties on `created_at` break on id so paging
    /// stays deterministic.
    pub async fn home_timeline(
        &self,
        viewer: Id<UserMarker>,
        cursor: Option<FeedCursor>,
    ) -> Result<FeedPage> {
        let sql = format!(
            "SELECT {TIMELINE_COLUMNS}
             FROM posts JOIN users ON users.user_id = posts.author_id
             WHERE NOT posts.is_comment
                 AND ($2::timestamptz IS NULL OR posts.created_at < $2)
             ORDER BY posts.created_at DESC, posts.post_id DESC
             LIMIT $3"
        );
        let records = sqlx::query_as::<_, TimelinePostRecord>(&sql)
            .bind(viewer.get())
            .bind(cursor.map(|cursor| cursor.0))
            .bind(FEED_PAGE_SIZE as i64)
            .fetch_all(&self.pool)
            .await?;

        let rows = records
            .into_iter()
            .map(TimelinePost::try_from)
            .collect::<Result<_, _>>()?;
        Ok(FeedPage::from_rows(rows))
    }

    /// Profile timeline: the home-timeline shape filtered to one author.
    /// Returns `None` when the author does not exist.
    pub async fn profile_timeline(
        &self,
        author: Id<UserMarker>,
        viewer: Id<UserMarker>,
        cursor: Option<FeedCursor>,
    ) -> Result<Option<FeedPage>> {
        let author_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
                .bind(author.get())
                .fetch_one(&self.pool)
                .await?;
        if !author_exists {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {TIMELINE_COLUMNS}
             FROM posts JOIN users ON users.user_id = posts.author_id
             WHERE NOT posts.is_comment
                 AND posts.author_id = $4
                 AND ($2::timestamptz IS NULL OR posts.created_at < $2)
             ORDER BY posts.created_at DESC, posts.post_id DESC
             LIMIT $3"
        );
        let records = sqlx::query_as::<_, TimelinePostRecord>(&sql)
            .bind(viewer.get())
            .bind(cursor.map(|cursor| cursor.0))
            .bind(FEED_PAGE_SIZE as i64)
            .bind(author.get())
            .fetch_all(&self.pool)
            .await?;

        let rows = records
            .into_iter()
            .map(TimelinePost::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(FeedPage::from_rows(rows)))
    }

    /// Direct comments of a post, oldest first. Returns `None` when the
    /// parent does not exist. The viewer is optional because comment listing
    /// is public; anonymous viewers get `is_liked`/`is_reposted` as false.
    pub async fn fetch_comments(
        &self,
        parent: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Option<Vec<TimelinePost>>> {
        let parent_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM posts WHERE post_id = $1)")
                .bind(parent.get())
                .fetch_one(&self.pool)
                .await?;
        if !parent_exists {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {TIMELINE_COLUMNS}
             FROM posts JOIN users ON users.user_id = posts.author_id
             WHERE posts.parent_id = $2
             ORDER BY posts.created_at, posts.post_id"
        );
        let records = sqlx::query_as::<_, TimelinePostRecord>(&sql)
            .bind(viewer.map(Id::get))
            .bind(parent.get())
            .fetch_all(&self.pool)
            .await?;

        let comments = records
            .into_iter()
            .map(TimelinePost::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Some(comments))
    }

    pub async fn create_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<()> {
        self.create_interaction("likes", "like_count", user_id, post_id)
            .await
    }

    pub async fn delete_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<()> {
        self.delete_interaction("likes", "like_count", user_id, post_id)
            .await
    }

    pub async fn create_repost(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<()> {
        self.create_interaction("reposts", "repost_count", user_id, post_id)
            .await
    }

    pub async fn delete_repost(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<()> {
        self.delete_interaction("reposts", "repost_count", user_id, post_id)
            .await
    }

    /// Inserts the interaction row and bumps the cached counter in one
    /// transaction. The `(user_id, post_id)` uniqueness constraint turns a
    /// duplicate into `DuplicateInteraction` instead of a second row.
    async fn create_interaction(
        &self,
        table: &str,
        counter: &str,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let insert = format!("INSERT INTO {table} (user_id, post_id) VALUES ($1, $2)");
        sqlx::query(&insert)
            .bind(user_id.get())
            .bind(post_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    DbError::DuplicateInteraction
                } else if is_foreign_key_violation(&err) {
                    DbError::PostNotFound
                } else {
                    err.into()
                }
            })?;

        let bump = format!("UPDATE posts SET {counter} = {counter} + 1 WHERE post_id = $1");
        sqlx::query(&bump)
            .bind(post_id.get())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Counterpart of `create_interaction`. Rolls back (by drop) when no row
    /// was deleted, so the counter is never decremented past the row count.
    async fn delete_interaction(
        &self,
        table: &str,
        counter: &str,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let delete = format!("DELETE FROM {table} WHERE user_id = $1 AND post_id = $2");
        let deleted = sqlx::query(&delete)
            .bind(user_id.get())
            .bind(post_id.get())
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(DbError::InteractionNotFound);
        }

        let drop_count = format!("UPDATE posts SET {counter} = {counter} - 1 WHERE post_id = $1");
        sqlx::query(&drop_count)
            .bind(post_id.get())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Admin force-delete: removes the post's interactions, its direct
    /// comments (and their interactions), then the post itself, all in one
    /// transaction. The cascade is deliberately one level deep; replies to
    /// deleted comments are orphaned, not removed.
    pub async fn admin_delete_post(&self, post_id: Id<PostMarker>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for table in ["likes", "reposts"] {
            let sql = format!(
                "DELETE FROM {table}
                 WHERE post_id = $1
                     OR post_id IN (SELECT post_id FROM posts WHERE parent_id = $1)"
            );
            sqlx::query(&sql)
                .bind(post_id.get())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM posts WHERE parent_id = $1")
            .bind(post_id.get())
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id.get())
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(DbError::PostNotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
