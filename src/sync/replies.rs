use crate::domain::Reply;
use crate::sync::overlay::PendingOverlay;
use crate::sync::reconcile;
use crate::sync::sequence::RequestSequence;

/// Display state of one comment's reply list.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReplyScopeState {
    /// Only the reply-count hint is shown.
    Collapsed,
    Loading,
    Loaded,
    /// The last fetch failed; earlier replies, if any, are still held.
    Error,
}

/// Confirmed replies plus pending overlay for a single root comment.
#[derive(Debug, Clone)]
pub struct ReplyScope {
    comment_id: String,
    reply_count: u32,
    confirmed: Vec<Reply>,
    overlay: PendingOverlay<Reply>,
    sequence: RequestSequence,
    loaded: bool,
    expanded: bool,
    last_error: Option<String>,
}

impl ReplyScope {
    pub fn new(comment_id: impl Into<String>, reply_count: u32) -> Self {
        Self {
            comment_id: comment_id.into(),
            reply_count,
            confirmed: Vec::new(),
            overlay: PendingOverlay::default(),
            sequence: RequestSequence::default(),
            loaded: false,
            expanded: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> ReplyScopeState {
        if self.sequence.in_flight() {
            ReplyScopeState::Loading
        } else if self.last_error.is_some() {
            ReplyScopeState::Error
        } else if self.expanded && (self.loaded || self.reply_count == 0) {
            ReplyScopeState::Loaded
        } else {
            ReplyScopeState::Collapsed
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn confirmed(&self) -> &[Reply] {
        &self.confirmed
    }

    pub fn overlay(&self) -> &PendingOverlay<Reply> {
        &self.overlay
    }

    pub(crate) fn overlay_mut(&mut self) -> &mut PendingOverlay<Reply> {
        &mut self.overlay
    }

    pub(crate) fn set_reply_count(&mut self, reply_count: u32) {
        self.reply_count = reply_count;
    }

    /// Count displayed next to the comment.
    pub fn display_count(&self) -> usize {
        let pending = self.overlay.len();
        if self.loaded {
            self.confirmed.len() + pending
        } else {
            self.reply_count as usize + pending
        }
    }

    /// Expands the list. Returns a request number when replies must be fetched.
    ///
    /// Cached replies are reused, and a comment without replies is never
    /// fetched just for being expanded.
    pub(crate) fn expand(&mut self) -> Option<u64> {
        self.expanded = true;
        if self.loaded || self.sequence.in_flight() || self.reply_count == 0 {
            return None;
        }
        Some(self.sequence.issue())
    }

    pub(crate) fn collapse(&mut self) {
        self.expanded = false;
    }

    /// Forces a fetch regardless of cached data.
    pub(crate) fn begin_refresh(&mut self) -> u64 {
        self.expanded = true;
        self.sequence.issue()
    }

    /// Applies a reply list if `seq` is the newest request. Returns false for stale responses.
    pub(crate) fn apply_replies(&mut self, seq: u64, replies: Vec<Reply>) -> bool {
        if !self.sequence.is_current(seq) {
            return false;
        }
        self.sequence.settle(seq);

        self.confirmed = replies
            .into_iter()
            .filter(|reply| reply.parent_id == self.comment_id)
            .collect();
        self.reply_count = u32::try_from(self.confirmed.len()).unwrap_or(u32::MAX);
        self.loaded = true;
        self.last_error = None;
        reconcile::prune(&self.confirmed, &mut self.overlay);
        true
    }

    pub(crate) fn apply_failure(&mut self, seq: u64, message: String) -> bool {
        if !self.sequence.is_current(seq) {
            return false;
        }
        self.sequence.settle(seq);
        self.last_error = Some(message);
        true
    }

    /// Merged view of pending and confirmed replies.
    pub fn merged(&self) -> Vec<Reply> {
        reconcile::merge(&self.confirmed, &self.overlay, true)
    }

    pub(crate) fn find_mut(&mut self, reply_id: &str) -> Option<&mut Reply> {
        self.confirmed.iter_mut().find(|reply| reply.id == reply_id)
    }

    pub fn find(&self, reply_id: &str) -> Option<&Reply> {
        self.confirmed.iter().find(|reply| reply.id == reply_id)
    }

    pub(crate) fn remove_confirmed(&mut self, reply_id: &str) -> Option<Reply> {
        let index = self.confirmed.iter().position(|reply| reply.id == reply_id)?;
        self.reply_count = self.reply_count.saturating_sub(1);
        Some(self.confirmed.remove(index))
    }
}
