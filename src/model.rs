//! Entity shapes persisted by the backend and held by the client.
//!
//! Field names on the wire follow the `inspirations` and `user_profiles`
//! tables; Rust-side names describe what the field means.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Categories offered by the create form.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["项目点子", "书籍摘录", "技术学习", "生活感悟"];

/// Sentinel category label that selects every item.
pub const ALL_CATEGORIES: &str = "all";

// =============================================================================
// IDENTITY
// =============================================================================

/// Opaque user identifier issued by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// VISIBILITY
// =============================================================================

/// Who may see an inspiration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

// =============================================================================
// PROFILES
// =============================================================================

/// Author fields denormalized onto an inspiration for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A row of `user_profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    #[must_use]
    pub fn author(&self) -> AuthorProfile {
        AuthorProfile {
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

// =============================================================================
// INSPIRATION
// =============================================================================

/// A captured note, link, or image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspiration {
    pub id: String,
    #[serde(rename = "user_id")]
    pub owner_id: UserId,
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "status")]
    pub visibility: Visibility,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Joined client-side from `user_profiles`; never sent to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorProfile>,
}

/// Insert payload for the `inspirations` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewInspiration {
    #[serde(rename = "user_id")]
    pub owner_id: UserId,
    pub content: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    #[serde(rename = "status")]
    pub visibility: Visibility,
    pub image_url: Option<String>,
}

/// Split a comma-separated tag field, trimming and dropping blanks.
#[must_use]
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
