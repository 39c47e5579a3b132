//! Async driver that runs a [`ThreadSync`] against a [`CommentsApi`].

use crate::api::{ApiError, CommentsApi};
use crate::domain::Identity;
use crate::sync::{
    FetchApplied, FetchPayload, FetchRequest, Mutation, MutationOutcome, MutationRequest, Result,
    SyncSettings, ThreadSync, ThreadView,
};
use std::sync::Arc;
use tracing::warn;

/// Performs the network call behind a [`FetchRequest`].
pub async fn perform_fetch(
    api: &dyn CommentsApi,
    request: &FetchRequest,
) -> std::result::Result<FetchPayload, ApiError> {
    match request {
        FetchRequest::Page {
            thread_id,
            page,
            per_page,
            ..
        } => api
            .fetch_comments(thread_id, *page, *per_page)
            .await
            .map(FetchPayload::Page),
        FetchRequest::Replies { comment_id, .. } => api
            .fetch_replies(comment_id)
            .await
            .map(FetchPayload::Replies),
    }
}

/// Performs the network call behind a [`MutationRequest`].
pub async fn perform_mutation(
    api: &dyn CommentsApi,
    request: &MutationRequest,
) -> std::result::Result<MutationOutcome, ApiError> {
    match request {
        MutationRequest::SubmitComment { thread_id, content } => api
            .submit_comment(thread_id, content)
            .await
            .map(MutationOutcome::Created),
        MutationRequest::ReplyToComment {
            thread_id,
            parent_id,
            content,
        } => api
            .reply_to_comment(thread_id, parent_id, content)
            .await
            .map(MutationOutcome::Replied),
        MutationRequest::EditComment {
            comment_id,
            content,
        } => api
            .edit_comment(comment_id, content)
            .await
            .map(MutationOutcome::Edited),
        MutationRequest::DeleteComment { comment_id } => api
            .delete_comment(comment_id)
            .await
            .map(|()| MutationOutcome::Deleted),
    }
}

/// One thread engine bound to an API and the signed-in identity.
///
/// Each call awaits its network work before returning, so callers see the
/// settled state. The interactive app drives [`ThreadSync`] directly instead
/// to keep optimistic state visible while requests run.
pub struct ThreadSession {
    api: Arc<dyn CommentsApi>,
    sync: ThreadSync,
    identity: Option<Identity>,
}

impl ThreadSession {
    pub fn new(
        api: Arc<dyn CommentsApi>,
        thread_id: impl Into<String>,
        settings: SyncSettings,
        identity: Option<Identity>,
    ) -> Self {
        Self {
            api,
            sync: ThreadSync::new(thread_id, settings),
            identity,
        }
    }

    pub fn sync(&self) -> &ThreadSync {
        &self.sync
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    pub fn view(&self) -> ThreadView {
        self.sync.view()
    }

    pub async fn load_page(&mut self, page: u32) -> Result<FetchApplied> {
        let request = self.sync.fetch_page(page);
        self.run_fetch(&request).await
    }

    pub async fn expand_replies(&mut self, comment_id: &str) -> Result<()> {
        if let Some(request) = self.sync.expand_replies(comment_id)? {
            self.run_fetch(&request).await?;
        }
        Ok(())
    }

    pub fn collapse_replies(&mut self, comment_id: &str) {
        self.sync.collapse_replies(comment_id);
    }

    pub async fn submit_comment(&mut self, content: &str) -> Result<()> {
        let mutation = self.sync.submit_comment(self.identity.as_ref(), content)?;
        self.run_mutation(mutation).await
    }

    pub async fn reply_to_comment(&mut self, parent_id: &str, content: &str) -> Result<()> {
        let mutation = self
            .sync
            .reply_to_comment(self.identity.as_ref(), parent_id, content)?;
        self.run_mutation(mutation).await
    }

    pub async fn edit_comment(&mut self, comment_id: &str, content: &str) -> Result<()> {
        let mutation = self
            .sync
            .edit_comment(self.identity.as_ref(), comment_id, content)?;
        self.run_mutation(mutation).await
    }

    pub async fn delete_comment(&mut self, comment_id: &str) -> Result<()> {
        let mutation = self.sync.delete_comment(self.identity.as_ref(), comment_id)?;
        self.run_mutation(mutation).await
    }

    async fn run_fetch(&mut self, request: &FetchRequest) -> Result<FetchApplied> {
        let result = perform_fetch(self.api.as_ref(), request).await;
        self.sync.apply_fetch(request, result)
    }

    async fn run_mutation(&mut self, mutation: Mutation) -> Result<()> {
        let api = self.api.as_ref();
        let (prefetched, outcome) = match &mutation.prefetch {
            Some(prefetch) => {
                let (fetched, outcome) = tokio::join!(
                    perform_fetch(api, prefetch),
                    perform_mutation(api, &mutation.request)
                );
                (Some((prefetch, fetched)), outcome)
            }
            None => (None, perform_mutation(api, &mutation.request).await),
        };

        if let Some((prefetch, fetched)) = prefetched
            && let Err(err) = self.sync.apply_fetch(prefetch, fetched)
        {
            warn!(error = %err, "reply prefetch failed");
        }

        let follow_ups = self.sync.complete_mutation(mutation.id, outcome)?;
        for request in follow_ups {
            // The mutation itself went through; a failed refresh only marks its scope.
            if let Err(err) = self.run_fetch(&request).await {
                warn!(scope = %request.scope_label(), error = %err, "refresh after mutation failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ThreadSession;
    use crate::api::memory::{ApiOperation, InMemoryCommentsApi};
    use crate::domain::{Author, AuthorRole};
    use crate::sync::{ReplyScopeState, SyncError, SyncSettings};
    use std::sync::Arc;

    fn author(id: &str) -> Author {
        Author {
            id: id.to_owned(),
            first_name: "Sam".to_owned(),
            last_name: id.to_owned(),
            role: AuthorRole::Member,
        }
    }

    fn seeded_api() -> Arc<InMemoryCommentsApi> {
        let api = Arc::new(InMemoryCommentsApi::new(author("u1")));
        for index in 0..12 {
            api.seed_comment("t1", &format!("comment {index}"), author("u2"));
        }
        api
    }

    fn session(api: &Arc<InMemoryCommentsApi>) -> ThreadSession {
        ThreadSession::new(api.clone(), "t1", SyncSettings::default(), Some(author("u1")))
    }

    #[tokio::test]
    async fn submitted_comment_converges_to_single_confirmed_entry() {
        let api = seeded_api();
        let mut session = session(&api);
        session.load_page(1).await.expect("page 1");

        session.submit_comment("gm").await.expect("posted");

        let view = session.view();
        assert_eq!(view.comments.len(), 10);
        assert_eq!(view.pending_count(), 0);
        assert_eq!(view.total, 13);
        assert_eq!(view.comments[0].comment.content, "gm");
        assert_eq!(api.calls(ApiOperation::FetchComments), 2);
    }

    #[tokio::test]
    async fn identical_submissions_stay_distinct() {
        let api = seeded_api();
        let mut session = session(&api);
        session.load_page(1).await.expect("page 1");

        session.submit_comment("gm").await.expect("first");
        session.submit_comment("gm").await.expect("second");

        let view = session.view();
        let count = view
            .comments
            .iter()
            .filter(|entry| entry.comment.content == "gm")
            .count();
        assert_eq!(count, 2);
        assert_eq!(view.pending_count(), 0);
    }

    #[tokio::test]
    async fn rejected_submission_is_rolled_back() {
        let api = seeded_api();
        let mut session = session(&api);
        session.load_page(1).await.expect("page 1");
        api.fail_next(ApiOperation::SubmitComment, "server down");

        let err = session.submit_comment("gm").await.expect_err("rejected");
        assert!(matches!(err, SyncError::MutationFailed { .. }));
        assert!(session.sync().overlay().is_empty());
        assert_eq!(session.view().comments.len(), 10);
    }

    #[tokio::test]
    async fn signed_out_session_cannot_post() {
        let api = seeded_api();
        let mut session = session(&api);
        session.set_identity(None);
        session.load_page(1).await.expect("page 1");

        let err = session.submit_comment("gm").await.expect_err("signed out");
        assert!(err.is_auth_required());
        assert_eq!(api.calls(ApiOperation::SubmitComment), 0);
    }

    #[tokio::test]
    async fn replies_load_only_on_demand() {
        let api = seeded_api();
        let mut session = session(&api);
        session.load_page(1).await.expect("page 1");
        let comment_id = session.view().comments[0].comment.id.clone();

        session.expand_replies(&comment_id).await.expect("expand");
        assert_eq!(api.calls(ApiOperation::FetchReplies), 0);

        session
            .reply_to_comment(&comment_id, "first!")
            .await
            .expect("reply");
        assert_eq!(api.calls(ApiOperation::FetchReplies), 1);

        let view = session.view();
        let replies = &view.comments[0].replies;
        assert_eq!(replies.state, ReplyScopeState::Loaded);
        assert_eq!(replies.entries.len(), 1);
        assert!(!replies.entries[0].origin.is_pending());
    }

    #[tokio::test]
    async fn expanding_comment_with_replies_fetches_once() {
        let api = seeded_api();
        let parent = api.seed_comment("t1", "root", author("u2"));
        api.seed_reply(&parent, "child", author("u3"));
        let mut session = session(&api);
        session.load_page(1).await.expect("page 1");

        session.expand_replies(&parent).await.expect("expand");
        session.collapse_replies(&parent);
        session.expand_replies(&parent).await.expect("re-expand");

        assert_eq!(api.calls(ApiOperation::FetchReplies), 1);
        assert_eq!(session.view().comments[0].replies.entries.len(), 1);
    }

    #[tokio::test]
    async fn failed_edit_restores_content() {
        let api = seeded_api();
        api.seed_comment("t1", "A", author("u1"));
        let mut session = session(&api);
        session.load_page(1).await.expect("page 1");
        let comment_id = session.view().comments[0].comment.id.clone();
        api.fail_next(ApiOperation::EditComment, "conflict");

        session
            .edit_comment(&comment_id, "B")
            .await
            .expect_err("rejected");
        assert_eq!(session.view().comments[0].comment.content, "A");
    }

    #[tokio::test]
    async fn delete_removes_comment_after_success() {
        let api = seeded_api();
        api.seed_comment("t1", "mine", author("u1"));
        let mut session = session(&api);
        session.load_page(1).await.expect("page 1");
        let comment_id = session.view().comments[0].comment.id.clone();

        session.delete_comment(&comment_id).await.expect("deleted");
        let view = session.view();
        assert!(view.comments.iter().all(|entry| entry.comment.id != comment_id));
        assert_eq!(view.total, 12);
    }
}
