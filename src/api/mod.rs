//! Comments API collaborators consumed by the sync engine.

pub mod client;
pub mod errors;
pub mod memory;
mod wire;

pub use self::errors::{ApiError, Result};
use crate::domain::{Comment, CommentPage, Reply};
use async_trait::async_trait;

/// The six remote operations the sync engine depends on.
///
/// Transport and authentication belong to the implementation. Every call may
/// fail; the engine does not look past "failed".
#[async_trait]
pub trait CommentsApi: Send + Sync {
    /// Fetches one page of root comments. Page 1 holds the newest comments.
    async fn fetch_comments(&self, thread_id: &str, page: u32, per_page: u32)
    -> Result<CommentPage>;

    /// Fetches replies for a comment. The result may include replies to other
    /// comments; callers filter by `parent_id`.
    async fn fetch_replies(&self, comment_id: &str) -> Result<Vec<Reply>>;

    /// Creates a root comment.
    async fn submit_comment(&self, thread_id: &str, content: &str) -> Result<Comment>;

    /// Creates a reply under `parent_id`.
    async fn reply_to_comment(&self, thread_id: &str, parent_id: &str, content: &str)
    -> Result<Reply>;

    async fn edit_comment(&self, comment_id: &str, content: &str) -> Result<Comment>;

    async fn delete_comment(&self, comment_id: &str) -> Result<()>;
}
