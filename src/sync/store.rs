use crate::domain::{Comment, CommentPage, PageMetadata};
use crate::sync::sequence::RequestSequence;

/// Last authoritative page of root comments for one thread.
#[derive(Debug, Clone)]
pub struct ThreadStore {
    thread_id: String,
    confirmed: Vec<Comment>,
    metadata: PageMetadata,
    current_page: u32,
    sequence: RequestSequence,
    loaded: bool,
    last_error: Option<String>,
}

/// Outcome of feeding a page response into the store.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PageApplied {
    Replaced,
    Stale,
}

impl ThreadStore {
    pub fn new(thread_id: impl Into<String>, per_page: u32) -> Self {
        Self {
            thread_id: thread_id.into(),
            confirmed: Vec::new(),
            metadata: PageMetadata::empty(per_page),
            current_page: 1,
            sequence: RequestSequence::default(),
            loaded: false,
            last_error: None,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn confirmed(&self) -> &[Comment] {
        &self.confirmed
    }

    pub fn metadata(&self) -> &PageMetadata {
        &self.metadata
    }

    /// Page whose comments are currently held.
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn per_page(&self) -> u32 {
        self.metadata.per_page
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_loading(&self) -> bool {
        self.sequence.in_flight()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Issues a request number for a fetch of any page.
    pub(crate) fn begin_fetch(&mut self) -> u64 {
        self.sequence.issue()
    }

    /// Replaces the held page if `seq` is the newest request.
    pub(crate) fn apply_page(&mut self, seq: u64, page: CommentPage) -> PageApplied {
        if !self.sequence.is_current(seq) {
            return PageApplied::Stale;
        }
        self.sequence.settle(seq);

        let mut metadata = page.metadata;
        if metadata.per_page == 0 {
            metadata.per_page = self.metadata.per_page;
        }

        self.current_page = metadata.current_page.max(1);
        self.metadata = metadata;
        self.confirmed = page.data;
        self.loaded = true;
        self.last_error = None;
        PageApplied::Replaced
    }

    /// Records a failed fetch; held data stays as-is.
    pub(crate) fn apply_failure(&mut self, seq: u64, message: String) -> PageApplied {
        if !self.sequence.is_current(seq) {
            return PageApplied::Stale;
        }
        self.sequence.settle(seq);
        self.last_error = Some(message);
        PageApplied::Replaced
    }

    pub fn find(&self, comment_id: &str) -> Option<&Comment> {
        self.confirmed.iter().find(|comment| comment.id == comment_id)
    }

    pub(crate) fn find_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.confirmed
            .iter_mut()
            .find(|comment| comment.id == comment_id)
    }

    /// Drops a deleted comment from the held page.
    pub(crate) fn remove_confirmed(&mut self, comment_id: &str) -> Option<Comment> {
        let index = self
            .confirmed
            .iter()
            .position(|comment| comment.id == comment_id)?;
        self.metadata.total = self.metadata.total.saturating_sub(1);
        Some(self.confirmed.remove(index))
    }
}
