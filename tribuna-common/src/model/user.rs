use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use time::OffsetDateTime;

pub const USER_HANDLE_MIN_LEN: usize = 3;
pub const USER_HANDLE_MAX_LEN: usize = 50;
pub const FULL_NAME_MIN_LEN: usize = 2;
pub const DEFAULT_AVATAR_COLOR: &str = "#009c3b";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

/// A delegate account as served to clients. The stored password hash is
/// deliberately not part of this type.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id<UserMarker>,
    pub handle: UserHandle,
    pub full_name: String,
    pub bio: Option<String>,
    pub avatar_image: Option<String>,
    pub avatar_color: String,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub handle: UserHandle,
    pub password_hash: String,
    pub full_name: FullName,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct ProfileUpdate {
    pub handle: UserHandle,
    pub bio: Option<String>,
    pub avatar_image: Option<String>,
}

/// The public "delegation name" of an account.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct UserHandle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user handle is invalid: {0:?}")]
pub struct InvalidUserHandleError(String);

impl UserHandle {
    pub fn new(handle: String) -> Result<Self, InvalidUserHandleError> {
        let len = handle.chars().count();
        if (USER_HANDLE_MIN_LEN..=USER_HANDLE_MAX_LEN).contains(&len)
            && handle.trim().len() == handle.len()
        {
            Ok(UserHandle(handle))
        } else {
            Err(InvalidUserHandleError(handle))
        }
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

impl Display for UserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<'de> Deserialize<'de> for UserHandle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserHandle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserHandle"))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct FullName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The full name is invalid: {0:?}")]
pub struct InvalidFullNameError(String);

impl FullName {
    pub fn new(name: String) -> Result<Self, InvalidFullNameError> {
        if name.trim().chars().count() >= FULL_NAME_MIN_LEN {
            Ok(FullName(name))
        } else {
            Err(InvalidFullNameError(name))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for FullName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        FullName::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"FullName"))
    }
}

/// An opaque path segment naming a user. Kept for compatibility with both
/// URL generations of the client: purely numeric input is always treated as
/// an id, so a handle that happens to be a numeral is shadowed by id lookup.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum UserIdentifier {
    Id(Id<UserMarker>),
    Handle(String),
}

impl UserIdentifier {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match Id::from_str(s) {
            Ok(id) => UserIdentifier::Id(id),
            Err(_) => UserIdentifier::Handle(s.to_owned()),
        }
    }
}

impl FromStr for UserIdentifier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Display for UserIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserIdentifier::Id(id) => Display::fmt(id, f),
            UserIdentifier::Handle(handle) => Display::fmt(handle, f),
        }
    }
}

impl<'de> Deserialize<'de> for UserIdentifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Ok(UserIdentifier::parse(&inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_length_bounds() {
        assert!(UserHandle::new("ab".to_owned()).is_err());
        assert!(UserHandle::new("abc".to_owned()).is_ok());
        assert!(UserHandle::new("a".repeat(50)).is_ok());
        assert!(UserHandle::new("a".repeat(51)).is_err());
    }

    #[test]
    fn handle_rejects_surrounding_whitespace() {
        assert!(UserHandle::new(" abc".to_owned()).is_err());
        assert!(UserHandle::new("abc ".to_owned()).is_err());
        assert!(UserHandle::new("a b c".to_owned()).is_ok());
    }

    #[test]
    fn identifier_prefers_numeric_id() {
        assert_eq!(
            "42".parse::<UserIdentifier>().unwrap(),
            UserIdentifier::Id(Id::new(42))
        );
        assert_eq!(
            "brazil".parse::<UserIdentifier>().unwrap(),
            UserIdentifier::Handle("brazil".to_owned())
        );
        // Mixed input is not an id even if it starts with digits.
        assert_eq!(
            "4chan".parse::<UserIdentifier>().unwrap(),
            UserIdentifier::Handle("4chan".to_owned())
        );
    }

    #[test]
    fn full_name_minimum() {
        assert!(FullName::new("A".to_owned()).is_err());
        assert!(FullName::new(" A ".to_owned()).is_err());
        assert!(FullName::new("Ana Souza".to_owned()).is_ok());
    }
}
