use crate::model::post::TimelinePost;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as DeError};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub const FEED_PAGE_SIZE: usize = 15;

/// Pagination token: the `created_at` of the last item the client has seen.
/// Selection is strictly older than the cursor.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct FeedCursor(pub OffsetDateTime);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("The feed cursor is not an RFC 3339 timestamp: {0:?}")]
pub struct InvalidFeedCursorError(String);

impl FromStr for FeedCursor {
    type Err = InvalidFeedCursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OffsetDateTime::parse(s, &Rfc3339)
            .map(FeedCursor)
            .map_err(|_| InvalidFeedCursorError(s.to_owned()))
    }
}

impl Display for FeedCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| std::fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl Serialize for FeedCursor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FeedCursor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        inner.parse().map_err(DeError::custom)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub data: Vec<TimelinePost>,
    pub next_cursor: Option<FeedCursor>,
}

impl FeedPage {
    /// Builds a page from rows already limited to `FEED_PAGE_SIZE`. A partial
    /// page means the feed is exhausted, so no cursor is handed out.
    #[must_use]
    pub fn from_rows(rows: Vec<TimelinePost>) -> Self {
        let next_cursor = if rows.len() < FEED_PAGE_SIZE {
            None
        } else {
            rows.last().map(|post| FeedCursor(post.created_at))
        };

        Self {
            data: rows,
            next_cursor,
        }
    }
}
