//! JSON shapes exchanged with the comments REST API.

use crate::domain::{Author, AuthorRole, Comment, CommentPage, Origin, PageMetadata, Reply};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct WireAuthor {
    id: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireCount {
    #[serde(default)]
    replies: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireComment {
    id: String,
    content: String,
    #[serde(default)]
    parent_id: Option<String>,
    author: WireAuthor,
    #[serde(default, rename = "_count")]
    count: Option<WireCount>,
}

#[derive(Debug, Deserialize)]
struct WireMetadata {
    #[serde(default)]
    total: u32,
    #[serde(default = "first_page")]
    last_page: u32,
    #[serde(default = "first_page")]
    current_page: u32,
    #[serde(default)]
    per_page: u32,
    #[serde(default)]
    prev_page: Option<u32>,
    #[serde(default)]
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCommentPage {
    data: Vec<WireComment>,
    #[serde(default)]
    metadata: Option<WireMetadata>,
}

/// Request body for creating a comment or reply.
#[derive(Debug, Serialize)]
pub(crate) struct CreateCommentBody<'a> {
    pub content: &'a str,
    /// Empty for a root comment.
    pub parent_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditCommentBody<'a> {
    pub content: &'a str,
}

fn first_page() -> u32 {
    1
}

impl From<WireAuthor> for Author {
    fn from(value: WireAuthor) -> Self {
        Self {
            id: value.id,
            first_name: value.first_name.unwrap_or_default(),
            last_name: value.last_name.unwrap_or_default(),
            role: value
                .role
                .as_deref()
                .map(AuthorRole::parse)
                .unwrap_or_default(),
        }
    }
}

impl From<WireComment> for Comment {
    fn from(value: WireComment) -> Self {
        Self {
            id: value.id,
            content: value.content,
            author: value.author.into(),
            reply_count: value.count.map(|count| count.replies).unwrap_or(0),
            origin: Origin::Confirmed,
        }
    }
}

impl WireComment {
    /// Converts into a reply; a missing parent is filled from `fallback_parent`.
    pub(crate) fn into_reply(self, fallback_parent: &str) -> Reply {
        Reply {
            id: self.id,
            content: self.content,
            author: self.author.into(),
            parent_id: self
                .parent_id
                .filter(|parent| !parent.trim().is_empty())
                .unwrap_or_else(|| fallback_parent.to_owned()),
            origin: Origin::Confirmed,
        }
    }
}

impl WireCommentPage {
    pub(crate) fn into_page(self, requested_page: u32, per_page: u32) -> CommentPage {
        let count = u32::try_from(self.data.len()).unwrap_or(u32::MAX);
        let metadata = match self.metadata {
            Some(raw) => PageMetadata {
                total: raw.total,
                current_page: raw.current_page.max(1),
                last_page: raw.last_page.max(1),
                per_page: if raw.per_page == 0 { per_page } else { raw.per_page },
                prev_page: raw.prev_page,
                next_page: raw.next_page,
            },
            None => PageMetadata {
                total: count,
                current_page: requested_page,
                last_page: requested_page,
                per_page,
                prev_page: None,
                next_page: None,
            },
        };

        CommentPage {
            data: self.data.into_iter().map(Comment::from).collect(),
            metadata,
        }
    }
}
