use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::OffsetDateTime;
use tribuna_common::model::{
    Id,
    session::{SessionToken, SessionTokenHash},
    user::UserMarker,
};
use tribuna_db::client::DbClient;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The session-backed caller identity, threaded explicitly into handlers
/// instead of living in ambient request state.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
    is_admin: bool,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        self.is_admin
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: SessionToken =
            <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?
                .token()
                .parse()?;

        let token_hash = request_token.hash()?;

        let session = Arc::<DbClient>::from_ref(state)
            .fetch_session(&token_hash)
            .await?
            .ok_or(ServerError::InvalidSession)?;

        if session.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(ServerError::InvalidSession);
        }

        Ok(Self {
            id: session.user,
            is_admin: session.is_admin,
        })
    }
}

/// Anonymous access is allowed on a handful of routes (public comment
/// listing): a missing Authorization header becomes `None`, any other
/// failure still rejects the request.
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <Self as FromRequestParts<S>>::from_request_parts(parts, state).await {
            Ok(user) => Ok(Some(user)),
            Err(ServerError::InvalidAuthorizationHeader(rejection)) if rejection.is_missing() => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// The raw token hash of the presented session, for revocation.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PresentedSession(pub SessionTokenHash);

impl<S> FromRequestParts<S> for PresentedSession
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: SessionToken =
            <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?
                .token()
                .parse()?;

        Ok(Self(request_token.hash()?))
    }
}

/// Admin gate: authentication is checked first, so an unauthenticated caller
/// gets 401 and an authenticated non-admin gets 403.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct AdminUser(pub AuthenticatedUser);

impl AdminUser {
    fn require(user: AuthenticatedUser) -> Result<Self, ServerError> {
        if user.is_admin() {
            Ok(Self(user))
        } else {
            Err(ServerError::AdminRequired)
        }
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user =
            <AuthenticatedUser as FromRequestParts<S>>::from_request_parts(parts, state).await?;

        Self::require(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerState;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;

    fn detached_state() -> ServerState {
        // A lazy pool never connects unless a query runs; the requests in
        // these tests are rejected before any database access.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();

        ServerState {
            db_client: Arc::new(DbClient::new(pool)),
        }
    }

    #[tokio::test]
    async fn missing_session_outranks_missing_admin_rights() {
        let state = detached_state();
        let (mut parts, ()) = Request::builder()
            .uri("/api/admin/users")
            .body(())
            .unwrap()
            .into_parts();

        let rejection = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn authenticated_non_admin_is_forbidden() {
        let delegate = AuthenticatedUser {
            id: Id::new(1),
            is_admin: false,
        };
        let rejection = AdminUser::require(delegate).unwrap_err();
        assert_eq!(rejection.status(), StatusCode::FORBIDDEN);

        let admin = AuthenticatedUser {
            id: Id::new(2),
            is_admin: true,
        };
        assert!(AdminUser::require(admin).is_ok());
    }
}
