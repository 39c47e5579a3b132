//! Optimistic comment thread synchronization.
//!
//! [`ThreadSync`] owns every scope of one thread: the confirmed page, the
//! thread-level pending overlay, and one [`ReplyScope`] per expanded comment.
//! It performs no IO. Operations hand back [`FetchRequest`] and
//! [`Mutation`] values describing the network work; results are fed back
//! through [`ThreadSync::apply_fetch`] and [`ThreadSync::complete_mutation`].

pub mod coordinator;
pub mod errors;
pub mod overlay;
pub mod reconcile;
pub mod replies;
pub mod sequence;
pub mod store;
pub mod view;

pub use self::coordinator::{
    Mutation, MutationId, MutationKind, MutationOutcome, MutationPhase, MutationRequest,
};
pub use self::errors::{Result, SyncError, ValidationError};
pub use self::overlay::PendingOverlay;
pub use self::replies::{ReplyScope, ReplyScopeState};
pub use self::store::{PageApplied, ThreadStore};
pub use self::view::{CommentView, ReplyView, ThreadView};

use crate::api::ApiError;
use crate::api::errors::format_api_error;
use crate::domain::{Comment, CommentPage, Reply};
use self::coordinator::InFlight;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Default page size of the root comment list.
pub const DEFAULT_PER_PAGE: u32 = 10;
/// Default maximum comment length, in characters.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 280;

/// Tunables for one thread engine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SyncSettings {
    pub per_page: u32,
    pub max_content_length: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }
}

/// A fetch the caller must perform and feed back via [`ThreadSync::apply_fetch`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FetchRequest {
    Page {
        thread_id: String,
        page: u32,
        per_page: u32,
        seq: u64,
    },
    Replies {
        comment_id: String,
        seq: u64,
    },
}

impl FetchRequest {
    /// Short label used in logs and error messages.
    pub fn scope_label(&self) -> String {
        match self {
            Self::Page { page, .. } => format!("page {page}"),
            Self::Replies { comment_id, .. } => format!("replies of {comment_id}"),
        }
    }
}

/// Successful fetch response.
#[derive(Debug, Clone)]
pub enum FetchPayload {
    Page(CommentPage),
    Replies(Vec<Reply>),
}

/// What happened to a fetch response.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FetchApplied {
    Applied,
    /// A newer request for the same scope was issued; the response was dropped.
    Stale,
    /// The scope is no longer live; the response was dropped.
    Orphaned,
}

/// Synchronization engine for a single thread.
#[derive(Debug, Clone)]
pub struct ThreadSync {
    settings: SyncSettings,
    store: ThreadStore,
    overlay: PendingOverlay<Comment>,
    replies: HashMap<String, ReplyScope>,
    next_client_id: u64,
    next_mutation_id: u64,
    in_flight: HashMap<MutationId, InFlight>,
    phases: HashMap<MutationId, MutationPhase>,
}

impl ThreadSync {
    pub fn new(thread_id: impl Into<String>, settings: SyncSettings) -> Self {
        Self {
            settings,
            store: ThreadStore::new(thread_id, settings.per_page),
            overlay: PendingOverlay::default(),
            replies: HashMap::new(),
            next_client_id: 1,
            next_mutation_id: 1,
            in_flight: HashMap::new(),
            phases: HashMap::new(),
        }
    }

    pub fn thread_id(&self) -> &str {
        self.store.thread_id()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn store(&self) -> &ThreadStore {
        &self.store
    }

    pub fn overlay(&self) -> &PendingOverlay<Comment> {
        &self.overlay
    }

    pub fn reply_scope(&self, comment_id: &str) -> Option<&ReplyScope> {
        self.replies.get(comment_id)
    }

    /// Total shown in the thread header: server total plus pending comments.
    pub fn display_total(&self) -> usize {
        self.store.metadata().total as usize + self.overlay.len()
    }

    /// Requests `page` of the root comment list.
    ///
    /// Pending comments are only ever shown on page 1, so moving to any other
    /// page discards them.
    pub fn fetch_page(&mut self, page: u32) -> FetchRequest {
        let page = page.max(1);
        if page != 1 && !self.overlay.is_empty() {
            debug!(
                thread = self.thread_id(),
                dropped = self.overlay.len(),
                page,
                "leaving page 1; clearing pending comments"
            );
            self.overlay.clear();
        }

        FetchRequest::Page {
            thread_id: self.thread_id().to_owned(),
            page,
            per_page: self.store.per_page(),
            seq: self.store.begin_fetch(),
        }
    }

    /// Re-requests the currently held page.
    pub fn refresh(&mut self) -> FetchRequest {
        self.fetch_page(self.store.current_page())
    }

    /// Expands a comment's replies, returning a fetch when nothing is cached.
    pub fn expand_replies(&mut self, comment_id: &str) -> Result<Option<FetchRequest>> {
        let scope = self.live_scope_mut(comment_id)?;
        Ok(scope.expand().map(|seq| FetchRequest::Replies {
            comment_id: comment_id.to_owned(),
            seq,
        }))
    }

    pub fn collapse_replies(&mut self, comment_id: &str) {
        if let Some(scope) = self.replies.get_mut(comment_id) {
            scope.collapse();
        }
    }

    /// Feeds a fetch result back into the scope that requested it.
    ///
    /// Failures keep the previously held data, record an inline error on the
    /// scope, and are returned as [`SyncError::FetchFailed`].
    pub fn apply_fetch(
        &mut self,
        request: &FetchRequest,
        result: std::result::Result<FetchPayload, ApiError>,
    ) -> Result<FetchApplied> {
        match (request, result) {
            (FetchRequest::Page { thread_id, seq, .. }, result) => {
                if thread_id != self.thread_id() {
                    return Ok(FetchApplied::Orphaned);
                }

                match result {
                    Ok(FetchPayload::Page(page)) => Ok(self.apply_page(*seq, page)),
                    Ok(FetchPayload::Replies(_)) => {
                        warn!(thread = %thread_id, "page request answered with replies; ignoring");
                        Ok(FetchApplied::Orphaned)
                    }
                    Err(source) => {
                        let applied = self.store.apply_failure(*seq, format_api_error(&source));
                        if applied == PageApplied::Stale {
                            return Ok(FetchApplied::Stale);
                        }
                        warn!(thread = %thread_id, error = %source, "comment page fetch failed");
                        Err(SyncError::FetchFailed {
                            scope: request.scope_label(),
                            source,
                        })
                    }
                }
            }
            (FetchRequest::Replies { comment_id, seq }, result) => {
                let Some(scope) = self.replies.get_mut(comment_id) else {
                    debug!(comment = %comment_id, "reply scope no longer live; dropping response");
                    return Ok(FetchApplied::Orphaned);
                };

                match result {
                    Ok(FetchPayload::Replies(replies)) => {
                        if scope.apply_replies(*seq, replies) {
                            Ok(FetchApplied::Applied)
                        } else {
                            debug!(comment = %comment_id, seq, "dropping stale reply response");
                            Ok(FetchApplied::Stale)
                        }
                    }
                    Ok(FetchPayload::Page(_)) => {
                        warn!(comment = %comment_id, "reply request answered with a page; ignoring");
                        Ok(FetchApplied::Orphaned)
                    }
                    Err(source) => {
                        if !scope.apply_failure(*seq, format_api_error(&source)) {
                            return Ok(FetchApplied::Stale);
                        }
                        warn!(comment = %comment_id, error = %source, "reply fetch failed");
                        Err(SyncError::FetchFailed {
                            scope: request.scope_label(),
                            source,
                        })
                    }
                }
            }
        }
    }

    /// Merged root comment list: pending first on page 1, confirmed only elsewhere.
    pub fn comments_view(&self) -> Vec<Comment> {
        let include_pending = self.store.current_page() == 1;
        reconcile::merge(self.store.confirmed(), &self.overlay, include_pending)
    }

    /// Merged reply list of one comment. Empty when the scope does not exist.
    pub fn replies_view(&self, comment_id: &str) -> Vec<Reply> {
        self.replies
            .get(comment_id)
            .map(ReplyScope::merged)
            .unwrap_or_default()
    }

    /// Builds the full one-level view of the thread.
    pub fn view(&self) -> ThreadView {
        let comments = self.comments_view();
        let comments = comments
            .into_iter()
            .map(|comment| {
                let replies = match self.replies.get(&comment.id) {
                    Some(scope) => ReplyView {
                        state: scope.state(),
                        expanded: scope.is_expanded(),
                        count: scope.display_count(),
                        error: scope.last_error().map(str::to_owned),
                        entries: if scope.is_expanded() {
                            scope.merged()
                        } else {
                            Vec::new()
                        },
                    },
                    None => ReplyView::collapsed(comment.reply_count as usize),
                };
                CommentView { comment, replies }
            })
            .collect();

        ThreadView {
            thread_id: self.thread_id().to_owned(),
            total: self.display_total(),
            metadata: *self.store.metadata(),
            current_page: self.store.current_page(),
            loaded: self.store.is_loaded(),
            loading: self.store.is_loading(),
            error: self.store.last_error().map(str::to_owned),
            comments,
        }
    }

    pub fn mutation_phase(&self, id: MutationId) -> MutationPhase {
        self.phases.get(&id).copied().unwrap_or(MutationPhase::Idle)
    }

    fn apply_page(&mut self, seq: u64, page: CommentPage) -> FetchApplied {
        if self.store.apply_page(seq, page) == PageApplied::Stale {
            debug!(thread = self.thread_id(), seq, "dropping stale page response");
            return FetchApplied::Stale;
        }

        if self.store.current_page() == 1 {
            let pruned = reconcile::prune(self.store.confirmed(), &mut self.overlay);
            if pruned > 0 {
                debug!(thread = self.thread_id(), pruned, "pending comments confirmed");
            }
        } else {
            self.overlay.clear();
        }

        let confirmed = self.store.confirmed();
        self.replies.retain(|comment_id, scope| {
            let Some(comment) = confirmed.iter().find(|comment| &comment.id == comment_id) else {
                return false;
            };
            if !scope.is_loaded() {
                scope.set_reply_count(comment.reply_count);
            }
            true
        });

        FetchApplied::Applied
    }

    /// Returns the reply scope of a confirmed comment on the held page, creating it on demand.
    fn live_scope_mut(&mut self, comment_id: &str) -> Result<&mut ReplyScope> {
        let Some(comment) = self.store.find(comment_id) else {
            return Err(self.missing_target(comment_id).into());
        };
        let reply_count = comment.reply_count;

        Ok(self
            .replies
            .entry(comment_id.to_owned())
            .or_insert_with(|| ReplyScope::new(comment_id, reply_count)))
    }

    fn missing_target(&self, id: &str) -> ValidationError {
        let pending_comment = self.overlay.entries().iter().any(|comment| comment.id == id);
        let pending_reply = self
            .replies
            .values()
            .any(|scope| scope.overlay().entries().iter().any(|reply| reply.id == id));

        if pending_comment || pending_reply {
            ValidationError::PendingTarget(id.to_owned())
        } else {
            ValidationError::UnknownEntity(id.to_owned())
        }
    }

    fn allocate_client_id(&mut self) -> crate::domain::ClientId {
        let id = crate::domain::ClientId(self.next_client_id);
        self.next_client_id += 1;
        id
    }

    fn allocate_mutation_id(&mut self) -> MutationId {
        let id = MutationId(self.next_mutation_id);
        self.next_mutation_id += 1;
        id
    }
}
