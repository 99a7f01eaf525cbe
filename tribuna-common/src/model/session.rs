use crate::model::{Id, user::UserMarker};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use std::{
    fmt::{Debug, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub const SESSION_TOKEN_CORE_LEN: usize = 24;
pub const SESSION_TOKEN_SALT_LEN: usize = 18;
pub const SESSION_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

pub const SESSION_LIFETIME: Duration = Duration::days(30);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing session token failed: {0}")]
pub struct SessionTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SessionTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// A bearer session token as held by the client. The server only ever stores
/// the KDF output, so a database leak does not leak usable tokens.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionToken {
    pub core: [u8; SESSION_TOKEN_CORE_LEN],
    pub salt: [u8; SESSION_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionTokenHash(pub Box<[u8; SESSION_TOKEN_HASH_LEN]>);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Session {
    pub user: Id<UserMarker>,
    pub is_admin: bool,
    pub token_hash: SessionTokenHash,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

impl SessionToken {
    #[must_use]
    pub fn generate_random() -> Self {
        let core = rand::random();
        let salt = rand::random();

        Self { core, salt }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_STANDARD);

        format!("{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<SessionTokenHash, SessionTokenHashError> {
        let argon2 = Argon2::default();

        let mut hash = Box::new([0; SESSION_TOKEN_HASH_LEN]);
        argon2
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(SessionTokenHashError)?;

        Ok(SessionTokenHash(hash))
    }
}

impl FromStr for SessionToken {
    type Err = SessionTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, ':');

        let core_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let salt_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;

        let core = BASE64_STANDARD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt = BASE64_STANDARD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self { core, salt })
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for SessionTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionTokenHash")
            .field(&"[redacted]")
            .finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The session token hash had an invalid length")]
pub struct InvalidSessionTokenHashError;

impl TryFrom<Box<[u8]>> for SessionTokenHash {
    type Error = InvalidSessionTokenHashError;

    fn try_from(value: Box<[u8]>) -> Result<Self, Self::Error> {
        Ok(Self(
            value.try_into().map_err(|_| InvalidSessionTokenHashError)?,
        ))
    }
}

impl TryFrom<Vec<u8>> for SessionTokenHash {
    type Error = InvalidSessionTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.into_boxed_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn token_str_roundtrip() {
        let token = SessionToken::generate_random();
        let parsed: SessionToken = token.as_token_str().parse().unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn token_hash_is_deterministic() {
        let token = SessionToken::generate_random();
        assert_eq!(token.hash().unwrap(), token.hash().unwrap());

        let other = SessionToken::generate_random();
        assert_ne!(token.hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(
            "justonepart".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::NotEnoughParts)
        );
        assert!(matches!(
            "!!!:???".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::Decode(_))
        ));
        // Valid base64, wrong decoded length.
        assert_eq!(
            "YWJj:YWJj".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::InvalidCoreLength)
        );
    }

    #[test]
    fn debug_output_is_redacted() {
        let token = SessionToken::generate_random();
        let debug = format!("{token:?}");
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains(&token.as_token_str()));
    }

    #[test]
    fn session_expiry() {
        let token = SessionToken::generate_random();
        let created_at = datetime!(2025-01-01 00:00 UTC);
        let session = Session {
            user: 1.into(),
            is_admin: false,
            token_hash: token.hash().unwrap(),
            created_at,
            expires_at: created_at + SESSION_LIFETIME,
        };

        assert!(!session.is_expired_at(created_at + Duration::days(29)));
        assert!(session.is_expired_at(created_at + Duration::days(30)));
    }
}
