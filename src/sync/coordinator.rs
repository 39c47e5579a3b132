//! Create, edit, and delete orchestration with optimistic state and rollback.

use crate::api::ApiError;
use crate::domain::{ClientId, Comment, Identity, Origin, Reply};
use crate::sync::{FetchRequest, Result, SyncError, ThreadSync, ValidationError};
use std::fmt;
use tracing::{debug, warn};

/// Identifier of one submitted mutation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MutationId(pub u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a single mutation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MutationPhase {
    Idle,
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MutationKind {
    SubmitComment,
    ReplyToComment,
    EditComment,
    DeleteComment,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubmitComment => write!(f, "posting comment"),
            Self::ReplyToComment => write!(f, "posting reply"),
            Self::EditComment => write!(f, "editing comment"),
            Self::DeleteComment => write!(f, "deleting comment"),
        }
    }
}

/// The API call a mutation needs.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MutationRequest {
    SubmitComment {
        thread_id: String,
        content: String,
    },
    ReplyToComment {
        thread_id: String,
        parent_id: String,
        content: String,
    },
    EditComment {
        comment_id: String,
        content: String,
    },
    DeleteComment {
        comment_id: String,
    },
}

impl MutationRequest {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::SubmitComment { .. } => MutationKind::SubmitComment,
            Self::ReplyToComment { .. } => MutationKind::ReplyToComment,
            Self::EditComment { .. } => MutationKind::EditComment,
            Self::DeleteComment { .. } => MutationKind::DeleteComment,
        }
    }
}

/// A mutation accepted by the engine, with any optimistic state already applied.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub id: MutationId,
    pub request: MutationRequest,
    /// Fetch to start alongside the mutation (replies of a collapsed comment).
    pub prefetch: Option<FetchRequest>,
}

/// Successful API result of a mutation.
#[derive(Debug, Clone)]
pub enum MutationOutcome {
    Created(Comment),
    Replied(Reply),
    Edited(Comment),
    Deleted,
}

/// Where an existing confirmed entity lives.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum EntityTarget {
    Comment(String),
    Reply { parent_id: String, reply_id: String },
}

/// Bookkeeping needed to settle or roll back an in-flight mutation.
#[derive(Debug, Clone)]
pub(crate) enum InFlight {
    Comment {
        client_id: ClientId,
    },
    Reply {
        parent_id: String,
        client_id: ClientId,
    },
    Edit {
        target: EntityTarget,
        previous: String,
        applied: String,
    },
    Delete {
        target: EntityTarget,
    },
}

impl InFlight {
    fn kind(&self) -> MutationKind {
        match self {
            Self::Comment { .. } => MutationKind::SubmitComment,
            Self::Reply { .. } => MutationKind::ReplyToComment,
            Self::Edit { .. } => MutationKind::EditComment,
            Self::Delete { .. } => MutationKind::DeleteComment,
        }
    }
}

impl ThreadSync {
    /// Posts a root comment optimistically.
    ///
    /// The pending comment is visible in [`ThreadSync::comments_view`] as soon
    /// as this returns. Rejected input or a missing identity leaves no trace.
    pub fn submit_comment(&mut self, identity: Option<&Identity>, content: &str) -> Result<Mutation> {
        let author = identity.ok_or(SyncError::AuthRequired)?.clone();
        let content = self.validate_content(content)?;

        let client_id = self.allocate_client_id();
        self.overlay.add(Comment {
            id: client_id.display_id(),
            content: content.clone(),
            author,
            reply_count: 0,
            origin: Origin::pending(client_id),
        });

        let request = MutationRequest::SubmitComment {
            thread_id: self.thread_id().to_owned(),
            content,
        };
        Ok(self.register(InFlight::Comment { client_id }, request, None))
    }

    /// Posts a reply under a confirmed comment optimistically.
    ///
    /// Replying expands the comment. When its replies have never been
    /// fetched, the returned mutation carries a prefetch for them.
    pub fn reply_to_comment(
        &mut self,
        identity: Option<&Identity>,
        parent_id: &str,
        content: &str,
    ) -> Result<Mutation> {
        let author = identity.ok_or(SyncError::AuthRequired)?.clone();
        let content = self.validate_content(content)?;

        let client_id = self.allocate_client_id();
        let scope = self.live_scope_mut(parent_id)?;
        scope.overlay_mut().add(Reply {
            id: client_id.display_id(),
            content: content.clone(),
            author,
            parent_id: parent_id.to_owned(),
            origin: Origin::pending(client_id),
        });
        let prefetch = scope.expand().map(|seq| FetchRequest::Replies {
            comment_id: parent_id.to_owned(),
            seq,
        });

        let request = MutationRequest::ReplyToComment {
            thread_id: self.thread_id().to_owned(),
            parent_id: parent_id.to_owned(),
            content,
        };
        Ok(self.register(
            InFlight::Reply {
                parent_id: parent_id.to_owned(),
                client_id,
            },
            request,
            prefetch,
        ))
    }

    /// Replaces a confirmed comment's or reply's content in place.
    pub fn edit_comment(
        &mut self,
        identity: Option<&Identity>,
        comment_id: &str,
        content: &str,
    ) -> Result<Mutation> {
        let identity = identity.ok_or(SyncError::AuthRequired)?;
        let content = self.validate_content(content)?;
        let target = self.locate_owned(identity, comment_id)?;

        let previous = self.replace_content(&target, content.clone()).unwrap_or_default();
        let request = MutationRequest::EditComment {
            comment_id: comment_id.to_owned(),
            content: content.clone(),
        };
        Ok(self.register(
            InFlight::Edit {
                target,
                previous,
                applied: content,
            },
            request,
            None,
        ))
    }

    /// Deletes a confirmed comment or reply. Nothing changes until the call succeeds.
    pub fn delete_comment(&mut self, identity: Option<&Identity>, comment_id: &str) -> Result<Mutation> {
        let identity = identity.ok_or(SyncError::AuthRequired)?;
        let target = self.locate_owned(identity, comment_id)?;

        let request = MutationRequest::DeleteComment {
            comment_id: comment_id.to_owned(),
        };
        Ok(self.register(InFlight::Delete { target }, request, None))
    }

    /// Settles a mutation with its API result.
    ///
    /// On success returns the fetches that bring confirmed data up to date.
    /// On failure rolls back exactly the state this mutation changed and
    /// returns [`SyncError::MutationFailed`].
    pub fn complete_mutation(
        &mut self,
        id: MutationId,
        result: std::result::Result<MutationOutcome, ApiError>,
    ) -> Result<Vec<FetchRequest>> {
        let Some(in_flight) = self.in_flight.remove(&id) else {
            warn!(mutation = %id, "completion for unknown mutation");
            return Ok(Vec::new());
        };
        let kind = in_flight.kind();

        match result {
            Ok(outcome) => {
                self.phases.insert(id, MutationPhase::Confirmed);
                debug!(mutation = %id, %kind, "mutation confirmed");
                Ok(self.settle_success(in_flight, outcome))
            }
            Err(source) => {
                self.phases.insert(id, MutationPhase::Failed);
                warn!(mutation = %id, %kind, error = %source, "mutation failed; rolling back");
                self.roll_back(in_flight);
                Err(SyncError::MutationFailed { kind, source })
            }
        }
    }

    /// Number of mutations awaiting a result.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn register(
        &mut self,
        in_flight: InFlight,
        request: MutationRequest,
        prefetch: Option<FetchRequest>,
    ) -> Mutation {
        let id = self.allocate_mutation_id();
        debug!(mutation = %id, kind = %request.kind(), "mutation pending");
        self.in_flight.insert(id, in_flight);
        self.phases.insert(id, MutationPhase::Pending);
        Mutation {
            id,
            request,
            prefetch,
        }
    }

    fn validate_content(&self, content: &str) -> Result<String> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }

        let length = content.chars().count();
        let max = self.settings.max_content_length;
        if length > max {
            return Err(ValidationError::TooLong { length, max }.into());
        }

        Ok(content.to_owned())
    }

    /// Finds a confirmed comment or reply and checks that `identity` wrote it.
    fn locate_owned(&self, identity: &Identity, id: &str) -> Result<EntityTarget> {
        let (target, author_id) = if let Some(comment) = self.store.find(id) {
            (EntityTarget::Comment(id.to_owned()), comment.author.id.as_str())
        } else if let Some((parent_id, reply)) = self
            .replies
            .iter()
            .find_map(|(parent_id, scope)| scope.find(id).map(|reply| (parent_id, reply)))
        {
            (
                EntityTarget::Reply {
                    parent_id: parent_id.clone(),
                    reply_id: id.to_owned(),
                },
                reply.author.id.as_str(),
            )
        } else {
            return Err(self.missing_target(id).into());
        };

        if author_id != identity.id {
            return Err(ValidationError::NotAuthor(id.to_owned()).into());
        }
        Ok(target)
    }

    /// Swaps in new content, returning the old content.
    fn replace_content(&mut self, target: &EntityTarget, content: String) -> Option<String> {
        match target {
            EntityTarget::Comment(id) => self
                .store
                .find_mut(id)
                .map(|comment| std::mem::replace(&mut comment.content, content)),
            EntityTarget::Reply {
                parent_id,
                reply_id,
            } => self
                .replies
                .get_mut(parent_id)
                .and_then(|scope| scope.find_mut(reply_id))
                .map(|reply| std::mem::replace(&mut reply.content, content)),
        }
    }

    fn current_content(&self, target: &EntityTarget) -> Option<&str> {
        match target {
            EntityTarget::Comment(id) => self.store.find(id).map(|comment| comment.content.as_str()),
            EntityTarget::Reply {
                parent_id,
                reply_id,
            } => self
                .replies
                .get(parent_id)
                .and_then(|scope| scope.find(reply_id))
                .map(|reply| reply.content.as_str()),
        }
    }

    fn settle_success(&mut self, in_flight: InFlight, outcome: MutationOutcome) -> Vec<FetchRequest> {
        match in_flight {
            InFlight::Comment { client_id } => {
                if let MutationOutcome::Created(created) = &outcome {
                    self.overlay.tag_server_id(client_id, &created.id);
                }
                // New comments land on page 1.
                vec![self.fetch_page(1)]
            }
            InFlight::Reply {
                parent_id,
                client_id,
            } => {
                let Some(scope) = self.replies.get_mut(&parent_id) else {
                    debug!(comment = %parent_id, "reply confirmed for a scope that is gone");
                    return Vec::new();
                };
                if let MutationOutcome::Replied(created) = &outcome {
                    scope.overlay_mut().tag_server_id(client_id, &created.id);
                }
                let seq = scope.begin_refresh();
                vec![FetchRequest::Replies {
                    comment_id: parent_id,
                    seq,
                }]
            }
            InFlight::Edit { target, .. } => {
                // A later edit of the same entity settles the content itself.
                let superseded = self.in_flight.values().any(|other| {
                    matches!(other, InFlight::Edit { target: later, .. } if *later == target)
                });
                match outcome {
                    MutationOutcome::Edited(updated) if !superseded => {
                        self.replace_content(&target, updated.content);
                    }
                    _ => {}
                }
                Vec::new()
            }
            InFlight::Delete { target } => {
                match target {
                    EntityTarget::Comment(id) => {
                        self.store.remove_confirmed(&id);
                        self.replies.remove(&id);
                    }
                    EntityTarget::Reply {
                        parent_id,
                        reply_id,
                    } => {
                        if let Some(scope) = self.replies.get_mut(&parent_id) {
                            scope.remove_confirmed(&reply_id);
                        }
                        if let Some(parent) = self.store.find_mut(&parent_id) {
                            parent.reply_count = parent.reply_count.saturating_sub(1);
                        }
                    }
                }
                Vec::new()
            }
        }
    }

    fn roll_back(&mut self, in_flight: InFlight) {
        match in_flight {
            InFlight::Comment { client_id } => {
                self.overlay.remove_by_client_id(client_id);
            }
            InFlight::Reply {
                parent_id,
                client_id,
            } => {
                if let Some(scope) = self.replies.get_mut(&parent_id) {
                    scope.overlay_mut().remove_by_client_id(client_id);
                }
            }
            InFlight::Edit {
                target,
                previous,
                applied,
            } => {
                // A later edit of the same entity owns the content now.
                if self.current_content(&target) == Some(applied.as_str()) {
                    self.replace_content(&target, previous);
                }
            }
            InFlight::Delete { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MutationOutcome, MutationPhase, MutationRequest};
    use crate::api::ApiError;
    use crate::domain::{Author, AuthorRole, Comment, CommentPage, Origin, PageMetadata, Reply};
    use crate::sync::{
        FetchApplied, FetchPayload, FetchRequest, ReplyScopeState, SyncError, SyncSettings,
        ThreadSync, ValidationError,
    };

    fn author(id: &str) -> Author {
        Author {
            id: id.to_owned(),
            first_name: "Ada".to_owned(),
            last_name: "Park".to_owned(),
            role: AuthorRole::Member,
        }
    }

    fn comment(id: &str, content: &str, author_id: &str) -> Comment {
        Comment {
            id: id.to_owned(),
            content: content.to_owned(),
            author: author(author_id),
            reply_count: 0,
            origin: Origin::Confirmed,
        }
    }

    fn reply(id: &str, parent_id: &str, content: &str, author_id: &str) -> Reply {
        Reply {
            id: id.to_owned(),
            content: content.to_owned(),
            author: author(author_id),
            parent_id: parent_id.to_owned(),
            origin: Origin::Confirmed,
        }
    }

    fn page_of(page: u32, total: u32, data: Vec<Comment>) -> FetchPayload {
        FetchPayload::Page(CommentPage {
            data,
            metadata: PageMetadata {
                total,
                current_page: page,
                last_page: 2,
                per_page: 10,
                prev_page: page.checked_sub(1).filter(|prev| *prev > 0),
                next_page: (page < 2).then_some(page + 1),
            },
        })
    }

    fn ten_comments() -> Vec<Comment> {
        (1..=10)
            .map(|n| comment(&format!("c{n}"), &format!("comment {n}"), "u9"))
            .collect()
    }

    fn loaded_thread(data: Vec<Comment>) -> ThreadSync {
        let mut sync = ThreadSync::new("t1", SyncSettings::default());
        let request = sync.fetch_page(1);
        let applied = sync
            .apply_fetch(&request, Ok(page_of(1, 12, data)))
            .expect("page applies");
        assert_eq!(applied, FetchApplied::Applied);
        sync
    }

    fn failure() -> ApiError {
        ApiError::Status {
            status: 500,
            message: "boom".to_owned(),
        }
    }

    #[test]
    fn scenario_pending_comment_settles_into_refetched_page() {
        let mut sync = loaded_thread(ten_comments());
        let me = author("u1");

        let mutation = sync.submit_comment(Some(&me), "gm").expect("accepted");
        assert_eq!(sync.mutation_phase(mutation.id), MutationPhase::Pending);
        assert_eq!(
            mutation.request,
            MutationRequest::SubmitComment {
                thread_id: "t1".to_owned(),
                content: "gm".to_owned(),
            }
        );

        let view = sync.comments_view();
        assert_eq!(view.len(), 11);
        assert_eq!(view[0].content, "gm");
        assert!(view[0].origin.is_pending());
        assert_eq!(sync.display_total(), 13);

        let created = comment("c-new", "gm", "u1");
        let follow_up = sync
            .complete_mutation(mutation.id, Ok(MutationOutcome::Created(created.clone())))
            .expect("success settles");
        assert_eq!(sync.mutation_phase(mutation.id), MutationPhase::Confirmed);
        assert_eq!(follow_up.len(), 1);
        assert!(matches!(follow_up[0], FetchRequest::Page { page: 1, .. }));

        let mut refreshed = vec![created];
        refreshed.extend(ten_comments());
        sync.apply_fetch(&follow_up[0], Ok(page_of(1, 13, refreshed)))
            .expect("refetch applies");

        let view = sync.comments_view();
        assert_eq!(view.len(), 11);
        assert!(sync.overlay().is_empty());
        assert_eq!(view.iter().filter(|entry| entry.content == "gm").count(), 1);
    }

    #[test]
    fn key_match_prunes_untagged_pending_comment() {
        let mut sync = loaded_thread(ten_comments());
        sync.submit_comment(Some(&author("u1")), "gm").expect("accepted");

        let mut refreshed = vec![comment("c-new", "gm", "u1")];
        refreshed.extend(ten_comments());
        let request = sync.refresh();
        sync.apply_fetch(&request, Ok(page_of(1, 13, refreshed)))
            .expect("refetch applies");

        assert!(sync.overlay().is_empty());
        assert_eq!(sync.comments_view().len(), 11);
    }

    #[test]
    fn failed_create_leaves_no_pending_entry() {
        let mut sync = loaded_thread(ten_comments());
        let mutation = sync.submit_comment(Some(&author("u1")), "gm").expect("accepted");

        let err = sync
            .complete_mutation(mutation.id, Err(failure()))
            .expect_err("failure surfaces");
        assert!(matches!(err, SyncError::MutationFailed { .. }));
        assert!(sync.overlay().is_empty());
        assert_eq!(sync.mutation_phase(mutation.id), MutationPhase::Failed);
        assert_eq!(sync.comments_view().len(), 10);
    }

    #[test]
    fn failed_create_only_removes_its_own_entry() {
        let mut sync = loaded_thread(ten_comments());
        let me = author("u1");
        let first = sync.submit_comment(Some(&me), "one").expect("accepted");
        sync.submit_comment(Some(&me), "two").expect("accepted");

        sync.complete_mutation(first.id, Err(failure())).expect_err("fails");
        let pending: Vec<_> = sync
            .overlay()
            .entries()
            .iter()
            .map(|entry| entry.content.clone())
            .collect();
        assert_eq!(pending, vec!["two".to_owned()]);
    }

    #[test]
    fn invalid_input_creates_no_state() {
        let mut sync = loaded_thread(ten_comments());

        let err = sync.submit_comment(None, "gm").expect_err("needs identity");
        assert!(err.is_auth_required());

        let err = sync
            .submit_comment(Some(&author("u1")), "   ")
            .expect_err("empty");
        assert!(matches!(err, SyncError::Validation(ValidationError::EmptyContent)));

        let long = "x".repeat(281);
        let err = sync
            .submit_comment(Some(&author("u1")), &long)
            .expect_err("too long");
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::TooLong { length: 281, max: 280 })
        ));

        assert!(sync.overlay().is_empty());
        assert_eq!(sync.in_flight_count(), 0);
    }

    #[test]
    fn navigating_away_from_page_one_clears_pending() {
        let mut sync = loaded_thread(ten_comments());
        let me = author("u1");
        sync.submit_comment(Some(&me), "one").expect("accepted");
        sync.submit_comment(Some(&me), "two").expect("accepted");
        assert_eq!(sync.overlay().len(), 2);

        let request = sync.fetch_page(2);
        assert!(sync.overlay().is_empty());

        sync.apply_fetch(&request, Ok(page_of(2, 12, vec![comment("c11", "old", "u9")])))
            .expect("page 2 applies");
        assert_eq!(sync.comments_view().len(), 1);
    }

    #[test]
    fn stale_page_response_is_discarded() {
        let mut sync = loaded_thread(ten_comments());
        let older = sync.fetch_page(2);
        let newer = sync.fetch_page(1);

        let applied = sync
            .apply_fetch(&newer, Ok(page_of(1, 12, ten_comments())))
            .expect("newest applies");
        assert_eq!(applied, FetchApplied::Applied);

        let applied = sync
            .apply_fetch(&older, Ok(page_of(2, 12, vec![comment("c11", "old", "u9")])))
            .expect("stale is not an error");
        assert_eq!(applied, FetchApplied::Stale);
        assert_eq!(sync.store().current_page(), 1);
        assert_eq!(sync.store().confirmed().len(), 10);
    }

    #[test]
    fn edit_failure_restores_previous_content() {
        let mut sync = loaded_thread(vec![comment("c1", "A", "u1")]);
        let me = author("u1");

        let mutation = sync.edit_comment(Some(&me), "c1", "B").expect("accepted");
        assert_eq!(sync.comments_view()[0].content, "B");

        sync.complete_mutation(mutation.id, Err(failure()))
            .expect_err("failure surfaces");
        assert_eq!(sync.comments_view()[0].content, "A");
    }

    #[test]
    fn edit_failure_does_not_clobber_a_later_edit() {
        let mut sync = loaded_thread(vec![comment("c1", "A", "u1")]);
        let me = author("u1");

        let first = sync.edit_comment(Some(&me), "c1", "B").expect("accepted");
        sync.edit_comment(Some(&me), "c1", "C").expect("accepted");
        sync.complete_mutation(first.id, Err(failure())).expect_err("fails");

        assert_eq!(sync.comments_view()[0].content, "C");
    }

    #[test]
    fn edit_success_restores_server_content_after_a_stale_refresh() {
        let mut sync = loaded_thread(vec![comment("c1", "A", "u1")]);
        let me = author("u1");

        let mutation = sync.edit_comment(Some(&me), "c1", "B").expect("accepted");
        let refresh = sync.refresh();
        sync.apply_fetch(&refresh, Ok(page_of(1, 12, vec![comment("c1", "A", "u1")])))
            .expect("refresh applies");
        assert_eq!(sync.comments_view()[0].content, "A");

        let follow_up = sync
            .complete_mutation(mutation.id, Ok(MutationOutcome::Edited(comment("c1", "B", "u1"))))
            .expect("settles");
        assert!(follow_up.is_empty());
        assert_eq!(sync.comments_view()[0].content, "B");
    }

    #[test]
    fn edit_success_updates_a_refreshed_reply() {
        let mut parent = comment("c1", "A", "u9");
        parent.reply_count = 1;
        let mut sync = loaded_thread(vec![parent]);
        let me = author("u1");

        let request = sync.expand_replies("c1").expect("live").expect("fetch");
        sync.apply_fetch(&request, Ok(FetchPayload::Replies(vec![reply("r1", "c1", "old", "u1")])))
            .expect("replies apply");

        let edit = sync.edit_comment(Some(&me), "r1", "new").expect("accepted");
        let post = sync.reply_to_comment(Some(&me), "c1", "also").expect("accepted");
        let follow_up = sync
            .complete_mutation(post.id, Ok(MutationOutcome::Replied(reply("r2", "c1", "also", "u1"))))
            .expect("settles");
        sync.apply_fetch(
            &follow_up[0],
            Ok(FetchPayload::Replies(vec![
                reply("r1", "c1", "old", "u1"),
                reply("r2", "c1", "also", "u1"),
            ])),
        )
        .expect("refresh applies");
        assert_eq!(sync.replies_view("c1")[0].content, "old");

        sync.complete_mutation(edit.id, Ok(MutationOutcome::Edited(comment("r1", "new", "u1"))))
            .expect("settles");
        let replies = sync.replies_view("c1");
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].content, "new");
    }

    #[test]
    fn earlier_edit_success_leaves_a_later_edit_visible() {
        let mut sync = loaded_thread(vec![comment("c1", "A", "u1")]);
        let me = author("u1");

        let first = sync.edit_comment(Some(&me), "c1", "B").expect("accepted");
        let second = sync.edit_comment(Some(&me), "c1", "C").expect("accepted");
        sync.complete_mutation(first.id, Ok(MutationOutcome::Edited(comment("c1", "B", "u1"))))
            .expect("settles");
        assert_eq!(sync.comments_view()[0].content, "C");

        sync.complete_mutation(second.id, Ok(MutationOutcome::Edited(comment("c1", "C", "u1"))))
            .expect("settles");
        assert_eq!(sync.comments_view()[0].content, "C");
    }

    #[test]
    fn pending_duplicate_of_a_held_comment_stays_until_refresh() {
        let mut sync = loaded_thread(vec![comment("c1", "gm", "u1")]);
        let me = author("u1");

        let mutation = sync.submit_comment(Some(&me), "gm").expect("accepted");
        for _ in 0..2 {
            let view = sync.comments_view();
            assert_eq!(view.len(), 2);
            assert!(view[0].origin.is_pending());
        }
        assert_eq!(sync.overlay().len(), 1);
        assert_eq!(sync.display_total(), 13);
        assert_eq!(sync.view().comments.len(), 2);

        let follow_up = sync
            .complete_mutation(mutation.id, Ok(MutationOutcome::Created(comment("c2", "gm", "u1"))))
            .expect("settles");
        assert_eq!(sync.comments_view().len(), 2);

        sync.apply_fetch(
            &follow_up[0],
            Ok(page_of(
                1,
                13,
                vec![comment("c2", "gm", "u1"), comment("c1", "gm", "u1")],
            )),
        )
        .expect("refresh applies");

        let view = sync.comments_view();
        assert_eq!(view.len(), 2);
        assert!(view.iter().all(|entry| entry.content == "gm" && !entry.origin.is_pending()));
        assert!(sync.overlay().is_empty());
    }

    #[test]
    fn only_the_author_can_edit_or_delete() {
        let mut sync = loaded_thread(vec![comment("c1", "A", "u9")]);
        let me = author("u1");

        let err = sync.edit_comment(Some(&me), "c1", "B").expect_err("not mine");
        assert!(matches!(err, SyncError::Validation(ValidationError::NotAuthor(_))));
        let err = sync.delete_comment(Some(&me), "c1").expect_err("not mine");
        assert!(matches!(err, SyncError::Validation(ValidationError::NotAuthor(_))));
        assert_eq!(sync.comments_view()[0].content, "A");
    }

    #[test]
    fn pending_entries_cannot_be_edited() {
        let mut sync = loaded_thread(ten_comments());
        let me = author("u1");
        sync.submit_comment(Some(&me), "gm").expect("accepted");

        let pending_id = sync.overlay().entries()[0].id.clone();
        let err = sync.edit_comment(Some(&me), &pending_id, "gn").expect_err("pending");
        assert!(matches!(err, SyncError::Validation(ValidationError::PendingTarget(_))));
    }

    #[test]
    fn delete_waits_for_confirmation() {
        let mut sync = loaded_thread(vec![comment("c1", "A", "u1"), comment("c2", "B", "u9")]);
        let me = author("u1");

        let mutation = sync.delete_comment(Some(&me), "c1").expect("accepted");
        assert_eq!(sync.comments_view().len(), 2);

        sync.complete_mutation(mutation.id, Ok(MutationOutcome::Deleted))
            .expect("settles");
        let view = sync.comments_view();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, "c2");
        assert_eq!(sync.store().metadata().total, 11);
    }

    #[test]
    fn failed_delete_keeps_the_comment() {
        let mut sync = loaded_thread(vec![comment("c1", "A", "u1")]);
        let mutation = sync.delete_comment(Some(&author("u1")), "c1").expect("accepted");

        sync.complete_mutation(mutation.id, Err(failure())).expect_err("fails");
        assert_eq!(sync.comments_view().len(), 1);
    }

    #[test]
    fn reply_to_unloaded_comment_prefetches_and_expands() {
        let mut parent = comment("c1", "A", "u9");
        parent.reply_count = 2;
        let mut sync = loaded_thread(vec![parent]);
        let me = author("u1");

        let mutation = sync
            .reply_to_comment(Some(&me), "c1", "agreed")
            .expect("accepted");
        let prefetch = mutation.prefetch.clone().expect("replies not loaded yet");
        assert!(matches!(&prefetch, FetchRequest::Replies { comment_id, .. } if comment_id == "c1"));

        let scope = sync.reply_scope("c1").expect("scope created");
        assert!(scope.is_expanded());
        assert_eq!(scope.state(), ReplyScopeState::Loading);
        assert_eq!(scope.display_count(), 3);

        sync.apply_fetch(
            &prefetch,
            Ok(FetchPayload::Replies(vec![
                reply("r1", "c1", "first", "u9"),
                reply("r2", "c1", "second", "u9"),
                reply("r9", "c7", "elsewhere", "u9"),
            ])),
        )
        .expect("replies apply");

        let merged = sync.replies_view("c1");
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].content, "agreed");
        assert!(merged[0].origin.is_pending());

        let follow_up = sync
            .complete_mutation(
                mutation.id,
                Ok(MutationOutcome::Replied(reply("r3", "c1", "agreed", "u1"))),
            )
            .expect("settles");
        assert_eq!(follow_up.len(), 1);

        sync.apply_fetch(
            &follow_up[0],
            Ok(FetchPayload::Replies(vec![
                reply("r1", "c1", "first", "u9"),
                reply("r2", "c1", "second", "u9"),
                reply("r3", "c1", "agreed", "u1"),
            ])),
        )
        .expect("refresh applies");

        let merged = sync.replies_view("c1");
        assert_eq!(merged.len(), 3);
        assert!(merged.iter().all(|entry| !entry.origin.is_pending()));
    }

    #[test]
    fn reply_to_empty_comment_loads_after_success() {
        let mut sync = loaded_thread(vec![comment("c1", "A", "u9")]);
        let mutation = sync
            .reply_to_comment(Some(&author("u1")), "c1", "first!")
            .expect("accepted");
        assert!(mutation.prefetch.is_none());

        let follow_up = sync
            .complete_mutation(
                mutation.id,
                Ok(MutationOutcome::Replied(reply("r1", "c1", "first!", "u1"))),
            )
            .expect("settles");
        assert!(matches!(&follow_up[..], [FetchRequest::Replies { .. }]));
    }

    #[test]
    fn failed_reply_is_rolled_back() {
        let mut sync = loaded_thread(vec![comment("c1", "A", "u9")]);
        let mutation = sync
            .reply_to_comment(Some(&author("u1")), "c1", "first!")
            .expect("accepted");

        sync.complete_mutation(mutation.id, Err(failure())).expect_err("fails");
        assert!(sync.replies_view("c1").is_empty());
    }

    #[test]
    fn reply_response_for_comment_no_longer_on_page_is_orphaned() {
        let mut parent = comment("c1", "A", "u9");
        parent.reply_count = 1;
        let mut sync = loaded_thread(vec![parent]);
        let request = sync.expand_replies("c1").expect("live").expect("fetches");

        let next = sync.fetch_page(2);
        sync.apply_fetch(&next, Ok(page_of(2, 12, vec![comment("c11", "old", "u9")])))
            .expect("page applies");

        let applied = sync
            .apply_fetch(&request, Ok(FetchPayload::Replies(vec![reply("r1", "c1", "x", "u9")])))
            .expect("orphan is not an error");
        assert_eq!(applied, FetchApplied::Orphaned);
        assert!(sync.reply_scope("c1").is_none());
    }

    #[test]
    fn failed_page_fetch_keeps_confirmed_data() {
        let mut sync = loaded_thread(ten_comments());
        let request = sync.refresh();

        let err = sync
            .apply_fetch(&request, Err(failure()))
            .expect_err("failure surfaces");
        assert!(matches!(err, SyncError::FetchFailed { .. }));

        let view = sync.view();
        assert_eq!(view.comments.len(), 10);
        assert!(view.error.is_some());
        assert!(!view.loading);
    }
}
