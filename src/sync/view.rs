use crate::domain::{Comment, PageMetadata, Reply};
use crate::sync::replies::ReplyScopeState;

/// Render-ready snapshot of one thread. Nesting stops at replies.
#[derive(Debug, Clone)]
pub struct ThreadView {
    pub thread_id: String,
    /// Server total plus pending comments.
    pub total: usize,
    pub metadata: PageMetadata,
    pub current_page: u32,
    /// Whether any page response has been applied yet.
    pub loaded: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub comment: Comment,
    pub replies: ReplyView,
}

#[derive(Debug, Clone)]
pub struct ReplyView {
    pub state: ReplyScopeState,
    pub expanded: bool,
    pub count: usize,
    pub error: Option<String>,
    /// Merged replies; empty while collapsed.
    pub entries: Vec<Reply>,
}

impl ReplyView {
    pub(crate) fn collapsed(count: usize) -> Self {
        Self {
            state: ReplyScopeState::Collapsed,
            expanded: false,
            count,
            error: None,
            entries: Vec::new(),
        }
    }
}

impl ThreadView {
    pub fn pending_count(&self) -> usize {
        self.comments
            .iter()
            .filter(|view| view.comment.origin.is_pending())
            .count()
    }

    /// Looks up a row by its 1-based position in the rendered list.
    pub fn comment_at(&self, position: usize) -> Option<&CommentView> {
        position
            .checked_sub(1)
            .and_then(|index| self.comments.get(index))
    }
}
