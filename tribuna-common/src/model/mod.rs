pub mod feed;
pub mod post;
pub mod session;
pub mod user;

use crate::model::{
    post::InvalidPostContentError,
    session::InvalidSessionTokenHashError,
    user::{InvalidFullNameError, InvalidUserHandleError},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData, num::ParseIntError, str::FromStr};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    FullName(#[from] InvalidFullNameError),
    #[error(transparent)]
    PostContent(#[from] InvalidPostContentError),
    #[error(transparent)]
    TokenHash(#[from] InvalidSessionTokenHashError),
}

/// Database-assigned identifier, tagged with a marker type so that user ids
/// and post ids cannot be mixed up.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(i64, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<i64> for Id<Marker> {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for i64 {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        i64::from_str(s).map(Self::new)
    }
}
