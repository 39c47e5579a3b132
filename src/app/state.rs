//! Application state and command handling for the interactive session.

use crate::app::commands::{Command, PageMove, Target};
use crate::app::events::WorkerMessage;
use crate::domain::Identity;
use crate::sync::{
    FetchApplied, FetchRequest, Mutation, MutationId, MutationKind, SyncError, ThreadSync,
    ThreadView,
};
use std::collections::HashMap;
use tracing::debug;

/// Network work the event loop must start.
#[derive(Debug, Clone)]
pub enum Work {
    Fetch(FetchRequest),
    Mutate(Mutation),
}

/// Text of a create the user may want to resend.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Draft {
    pub parent_id: Option<String>,
    pub content: String,
}

/// Ids a command target resolved to.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResolvedTarget {
    /// The entity itself.
    pub id: String,
    /// The root comment it belongs to; equal to `id` for root comments.
    pub comment_id: String,
}

/// Top-level mutable application state.
#[derive(Debug)]
pub struct AppState {
    pub sync: ThreadSync,
    pub identity: Option<Identity>,
    pub should_quit: bool,
    pub error_message: Option<String>,
    pub status_message: Option<String>,
    drafts: HashMap<MutationId, Draft>,
    failed_draft: Option<Draft>,
}

impl AppState {
    pub fn new(sync: ThreadSync, identity: Option<Identity>) -> Self {
        Self {
            sync,
            identity,
            should_quit: false,
            error_message: None,
            status_message: None,
            drafts: HashMap::new(),
            failed_draft: None,
        }
    }

    pub fn view(&self) -> ThreadView {
        self.sync.view()
    }

    /// Draft kept from the last failed post, if any.
    pub fn failed_draft(&self) -> Option<&Draft> {
        self.failed_draft.as_ref()
    }

    /// Maps a command target onto the loaded view.
    pub fn resolve(&self, target: &Target) -> Result<ResolvedTarget, String> {
        match target {
            Target::Id(id) => {
                let view = self.sync.view();
                let parent = view.comments.iter().find_map(|row| {
                    row.replies
                        .entries
                        .iter()
                        .any(|reply| &reply.id == id)
                        .then(|| row.comment.id.clone())
                });
                Ok(ResolvedTarget {
                    id: id.clone(),
                    comment_id: parent.unwrap_or_else(|| id.clone()),
                })
            }
            Target::Comment(position) => {
                let view = self.sync.view();
                let row = view
                    .comment_at(*position)
                    .ok_or_else(|| format!("no comment #{position} on this page"))?;
                Ok(ResolvedTarget {
                    id: row.comment.id.clone(),
                    comment_id: row.comment.id.clone(),
                })
            }
            Target::Reply { comment, reply } => {
                let view = self.sync.view();
                let row = view
                    .comment_at(*comment)
                    .ok_or_else(|| format!("no comment #{comment} on this page"))?;
                let entry = reply
                    .checked_sub(1)
                    .and_then(|index| row.replies.entries.get(index))
                    .ok_or_else(|| {
                        format!("no reply #{comment}.{reply}; expand the comment first")
                    })?;
                Ok(ResolvedTarget {
                    id: entry.id.clone(),
                    comment_id: row.comment.id.clone(),
                })
            }
        }
    }

    /// Applies one command and returns the network work it needs.
    ///
    /// `compose` and text-less `edit` must be turned into `post`, `reply`, or
    /// `edit TEXT` by the caller first; they are rejected here.
    pub fn execute(&mut self, command: Command) -> Vec<Work> {
        self.error_message = None;
        self.status_message = None;

        match self.try_execute(command) {
            Ok(work) => work,
            Err(message) => {
                self.error_message = Some(message);
                Vec::new()
            }
        }
    }

    fn try_execute(&mut self, command: Command) -> Result<Vec<Work>, String> {
        match command {
            Command::Post(content) => self.create(None, content),
            Command::Reply { target, content } => {
                let target = self.resolve(&target)?;
                self.create(Some(target.comment_id), content)
            }
            Command::Edit {
                target,
                content: Some(content),
            } => {
                let target = self.resolve(&target)?;
                let mutation = self
                    .sync
                    .edit_comment(self.identity.as_ref(), &target.id, &content)
                    .map_err(|err| describe_error(&err))?;
                Ok(vec![Work::Mutate(mutation)])
            }
            Command::Delete(target) => {
                let target = self.resolve(&target)?;
                let mutation = self
                    .sync
                    .delete_comment(self.identity.as_ref(), &target.id)
                    .map_err(|err| describe_error(&err))?;
                self.status_message = Some(format!("deleting {}", target.id));
                Ok(vec![Work::Mutate(mutation)])
            }
            Command::Expand(target) => {
                let target = self.resolve(&target)?;
                let request = self
                    .sync
                    .expand_replies(&target.comment_id)
                    .map_err(|err| describe_error(&err))?;
                Ok(request.into_iter().map(Work::Fetch).collect())
            }
            Command::Collapse(target) => {
                let target = self.resolve(&target)?;
                self.sync.collapse_replies(&target.comment_id);
                Ok(Vec::new())
            }
            Command::Page(movement) => {
                let metadata = *self.sync.store().metadata();
                let current = self.sync.store().current_page();
                let page = match movement {
                    PageMove::To(page) => page,
                    PageMove::Next => metadata.next_page.ok_or("already on the last page")?,
                    PageMove::Prev => metadata.prev_page.ok_or("already on the first page")?,
                };
                if page == 0 || (metadata.last_page > 0 && page > metadata.last_page) {
                    return Err(format!("page {page} is out of range 1..={}", metadata.last_page.max(1)));
                }
                if page == current {
                    return Ok(vec![Work::Fetch(self.sync.refresh())]);
                }
                Ok(vec![Work::Fetch(self.sync.fetch_page(page))])
            }
            Command::Refresh => Ok(vec![Work::Fetch(self.sync.refresh())]),
            Command::Retry => {
                let draft = self
                    .failed_draft
                    .take()
                    .ok_or("nothing to retry")?;
                self.create(draft.parent_id, draft.content)
            }
            Command::Help => Ok(Vec::new()),
            Command::Quit => {
                self.should_quit = true;
                Ok(Vec::new())
            }
            Command::Compose(_) | Command::Edit { content: None, .. } => {
                Err("this command needs an editor".to_owned())
            }
        }
    }

    fn create(&mut self, parent_id: Option<String>, content: String) -> Result<Vec<Work>, String> {
        let identity = self.identity.as_ref();
        let result = match &parent_id {
            Some(parent_id) => self.sync.reply_to_comment(identity, parent_id, &content),
            None => self.sync.submit_comment(identity, &content),
        };

        match result {
            Ok(mutation) => {
                self.drafts.insert(mutation.id, Draft { parent_id, content });
                let mut work = Vec::with_capacity(2);
                if let Some(prefetch) = mutation.prefetch.clone() {
                    work.push(Work::Fetch(prefetch));
                }
                work.push(Work::Mutate(mutation));
                Ok(work)
            }
            Err(err) => {
                // Validation and sign-in failures keep the text around for `retry`.
                self.failed_draft = Some(Draft { parent_id, content });
                Err(describe_error(&err))
            }
        }
    }

    /// Feeds a worker result into the engine and returns any follow-up fetches.
    pub fn process_worker_message(&mut self, message: WorkerMessage) -> Vec<Work> {
        match message {
            WorkerMessage::FetchCompleted { request, result } => {
                match self.sync.apply_fetch(&request, result) {
                    Ok(FetchApplied::Applied) => {}
                    Ok(outcome) => {
                        debug!(scope = %request.scope_label(), ?outcome, "fetch result dropped");
                    }
                    Err(err) => self.error_message = Some(describe_error(&err)),
                }
                Vec::new()
            }
            WorkerMessage::MutationCompleted { id, result } => {
                let draft = self.drafts.remove(&id);
                match self.sync.complete_mutation(id, result) {
                    Ok(follow_ups) => {
                        self.status_message = None;
                        follow_ups.into_iter().map(Work::Fetch).collect()
                    }
                    Err(err) => {
                        if let SyncError::MutationFailed {
                            kind: MutationKind::SubmitComment | MutationKind::ReplyToComment,
                            ..
                        } = &err
                        {
                            self.failed_draft = draft;
                        }
                        let mut message = describe_error(&err);
                        if self.failed_draft.is_some() {
                            message.push_str(" (type `retry` to resend)");
                        }
                        self.error_message = Some(message);
                        Vec::new()
                    }
                }
            }
        }
    }
}

/// User-facing text for an engine error.
pub fn describe_error(err: &SyncError) -> String {
    if matches!(err, SyncError::AuthRequired) {
        return "sign in to post: set the API token and restart".to_owned();
    }
    if err.is_auth_required() {
        return format!("{err} (is the API token still valid?)");
    }
    err.to_string()
}
