//! Presentation helpers for one inspiration card.
//!
//! Everything here is pure: given an item, the viewer, and the current
//! time, produce the strings and flags a card renders.

use time::OffsetDateTime;

use crate::account::AvatarRef;
use crate::model::{Inspiration, UserId};

pub const CONTENT_PREVIEW_CHARS: usize = 150;
/// Cards with an image leave less room for text.
pub const IMAGE_CONTENT_PREVIEW_CHARS: usize = 60;
pub const DESCRIPTION_PREVIEW_CHARS: usize = 100;
const ELLIPSIS: &str = "...";
const ANONYMOUS: &str = "匿名用户";

/// Links are rendered as clickable, not as prose.
#[must_use]
pub fn is_link(content: &str) -> bool {
    content.starts_with("http://") || content.starts_with("https://")
}

/// First `max` characters plus `...`, or the text unchanged if it fits.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_owned(),
    }
}

/// `刚刚`, `N小时前`, `N天前`, or a `YYYY/M/D` date after a week.
#[must_use]
pub fn relative_time(created_at: OffsetDateTime, now: OffsetDateTime) -> String {
    let hours = (now - created_at).whole_hours();
    if hours < 1 {
        "刚刚".to_owned()
    } else if hours < 24 {
        format!("{hours}小时前")
    } else if hours < 24 * 7 {
        format!("{}天前", hours / 24)
    } else {
        format!("{}/{}/{}", created_at.year(), u8::from(created_at.month()), created_at.day())
    }
}

/// Uppercased first character, empty for an empty name.
#[must_use]
pub fn initial_of(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

/// Author name: username, then full name, then a placeholder.
#[must_use]
pub fn author_name(item: &Inspiration) -> String {
    item.author
        .as_ref()
        .and_then(|a| {
            a.username
                .as_deref()
                .filter(|s| !s.is_empty())
                .or_else(|| a.full_name.as_deref().filter(|s| !s.is_empty()))
        })
        .unwrap_or(ANONYMOUS)
        .to_owned()
}

/// Only the owner may delete.
#[must_use]
pub fn can_delete(item: &Inspiration, viewer: Option<&UserId>) -> bool {
    viewer.is_some_and(|viewer| *viewer == item.owner_id)
}

/// Plain-text export placed on the clipboard.
#[must_use]
pub fn clipboard_text(item: &Inspiration) -> String {
    let description = match item.description.as_deref() {
        Some(d) if !d.is_empty() => format!("{d}\n\n"),
        _ => String::new(),
    };
    format!(
        "{description}{}\n\n标签: {}\n分类: {}",
        item.content,
        item.tags.join(", "),
        item.category
    )
}

/// Everything a card shows, computed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub id: String,
    pub author: String,
    pub initial: String,
    pub avatar: AvatarRef,
    pub is_link: bool,
    pub content: String,
    pub content_truncated: bool,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category: String,
    pub public: bool,
    pub image_url: Option<String>,
    pub posted: String,
    pub can_delete: bool,
}

impl CardView {
    #[must_use]
    pub fn new(item: &Inspiration, viewer: Option<&UserId>, now: OffsetDateTime) -> Self {
        let limit = if item.image_url.is_some() { IMAGE_CONTENT_PREVIEW_CHARS } else { CONTENT_PREVIEW_CHARS };
        let content_truncated = item.content.chars().count() > CONTENT_PREVIEW_CHARS;
        let content = if content_truncated { truncate(&item.content, limit) } else { item.content.clone() };
        let author = author_name(item);
        Self {
            id: item.id.clone(),
            initial: initial_of(&author),
            avatar: AvatarRef::parse(item.author.as_ref().and_then(|a| a.avatar_url.as_deref())),
            author,
            is_link: is_link(&item.content),
            content,
            content_truncated,
            description: item
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .map(|d| truncate(d, DESCRIPTION_PREVIEW_CHARS)),
            tags: item.tags.clone(),
            category: item.category.clone(),
            public: item.visibility == crate::model::Visibility::Public,
            image_url: item.image_url.clone(),
            posted: relative_time(item.created_at, now),
            can_delete: can_delete(item, viewer),
        }
    }
}

#[cfg(test)]
#[path = "card_test.rs"]
mod tests;
