//! In-process comments API used by demo mode and tests.

use crate::api::{ApiError, CommentsApi, Result};
use crate::domain::{Author, Comment, CommentPage, Origin, PageMetadata, Reply};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Operation selector for failure injection and call counting.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ApiOperation {
    FetchComments,
    FetchReplies,
    SubmitComment,
    ReplyToComment,
    EditComment,
    DeleteComment,
}

#[derive(Debug, Default)]
struct Store {
    /// Root comments per thread, newest first.
    threads: HashMap<String, Vec<Comment>>,
    /// Replies per thread, oldest first.
    replies: HashMap<String, Vec<Reply>>,
    next_id: u64,
    failures: HashMap<ApiOperation, VecDeque<String>>,
    calls: HashMap<ApiOperation, usize>,
}

/// Thread-safe in-memory comments backend.
///
/// `fetch_replies` returns every reply in the owning thread, mirroring
/// servers that do not filter by parent.
#[derive(Debug)]
pub struct InMemoryCommentsApi {
    author: Author,
    store: Mutex<Store>,
}

impl InMemoryCommentsApi {
    /// Creates an empty backend whose mutations are attributed to `author`.
    pub fn new(author: Author) -> Self {
        Self {
            author,
            store: Mutex::new(Store {
                next_id: 1,
                ..Store::default()
            }),
        }
    }

    /// Seeds a confirmed root comment at the front of `thread_id`.
    pub fn seed_comment(&self, thread_id: &str, content: &str, author: Author) -> String {
        self.with_store(|store| {
            let id = store.allocate_id("c");
            store.threads.entry(thread_id.to_owned()).or_default().insert(
                0,
                Comment {
                    id: id.clone(),
                    content: content.to_owned(),
                    author,
                    reply_count: 0,
                    origin: Origin::Confirmed,
                },
            );
            id
        })
    }

    /// Seeds a confirmed reply and bumps the parent's reply count.
    pub fn seed_reply(&self, parent_id: &str, content: &str, author: Author) -> Option<String> {
        self.with_store(|store| store.insert_reply(parent_id, content, author))
    }

    /// Makes the next call to `operation` fail with `message`.
    pub fn fail_next(&self, operation: ApiOperation, message: &str) {
        self.with_store(|store| {
            store
                .failures
                .entry(operation)
                .or_default()
                .push_back(message.to_owned());
        });
    }

    /// Number of calls made to `operation` so far, including failed ones.
    pub fn calls(&self, operation: ApiOperation) -> usize {
        self.with_store(|store| store.calls.get(&operation).copied().unwrap_or(0))
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        let mut guard = match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn begin(&self, operation: ApiOperation) -> Result<()> {
        self.with_store(|store| {
            *store.calls.entry(operation).or_default() += 1;
            match store
                .failures
                .get_mut(&operation)
                .and_then(VecDeque::pop_front)
            {
                Some(message) => Err(ApiError::Rejected(message)),
                None => Ok(()),
            }
        })
    }
}

impl Store {
    fn allocate_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}{}", self.next_id);
        self.next_id += 1;
        id
    }

    fn thread_of(&self, comment_id: &str) -> Option<String> {
        self.threads
            .iter()
            .find(|(_, comments)| comments.iter().any(|comment| comment.id == comment_id))
            .map(|(thread_id, _)| thread_id.clone())
    }

    fn insert_reply(&mut self, parent_id: &str, content: &str, author: Author) -> Option<String> {
        let thread_id = self.thread_of(parent_id)?;
        let id = self.allocate_id("r");

        if let Some(parent) = self
            .threads
            .get_mut(&thread_id)
            .and_then(|comments| comments.iter_mut().find(|comment| comment.id == parent_id))
        {
            parent.reply_count += 1;
        }

        self.replies.entry(thread_id).or_default().push(Reply {
            id: id.clone(),
            content: content.to_owned(),
            author,
            parent_id: parent_id.to_owned(),
            origin: Origin::Confirmed,
        });
        Some(id)
    }
}

fn not_found(kind: &str, id: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("{kind} {id} not found"),
    }
}

#[async_trait]
impl CommentsApi for InMemoryCommentsApi {
    async fn fetch_comments(
        &self,
        thread_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<CommentPage> {
        self.begin(ApiOperation::FetchComments)?;
        let per_page = per_page.max(1);

        Ok(self.with_store(|store| {
            let comments = store.threads.get(thread_id).cloned().unwrap_or_default();
            let total = u32::try_from(comments.len()).unwrap_or(u32::MAX);
            let last_page = total.div_ceil(per_page).max(1);
            let page = page.max(1);
            let start = usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);

            CommentPage {
                data: comments
                    .into_iter()
                    .skip(start)
                    .take(per_page as usize)
                    .collect(),
                metadata: PageMetadata {
                    total,
                    current_page: page,
                    last_page,
                    per_page,
                    prev_page: (page > 1).then(|| page - 1),
                    next_page: (page < last_page).then(|| page + 1),
                },
            }
        }))
    }

    async fn fetch_replies(&self, comment_id: &str) -> Result<Vec<Reply>> {
        self.begin(ApiOperation::FetchReplies)?;

        self.with_store(|store| {
            let thread_id = store
                .thread_of(comment_id)
                .ok_or_else(|| not_found("comment", comment_id))?;
            Ok(store.replies.get(&thread_id).cloned().unwrap_or_default())
        })
    }

    async fn submit_comment(&self, thread_id: &str, content: &str) -> Result<Comment> {
        self.begin(ApiOperation::SubmitComment)?;
        let id = self.seed_comment(thread_id, content, self.author.clone());

        Ok(Comment {
            id,
            content: content.to_owned(),
            author: self.author.clone(),
            reply_count: 0,
            origin: Origin::Confirmed,
        })
    }

    async fn reply_to_comment(
        &self,
        _thread_id: &str,
        parent_id: &str,
        content: &str,
    ) -> Result<Reply> {
        self.begin(ApiOperation::ReplyToComment)?;
        let id = self
            .seed_reply(parent_id, content, self.author.clone())
            .ok_or_else(|| not_found("comment", parent_id))?;

        Ok(Reply {
            id,
            content: content.to_owned(),
            author: self.author.clone(),
            parent_id: parent_id.to_owned(),
            origin: Origin::Confirmed,
        })
    }

    async fn edit_comment(&self, comment_id: &str, content: &str) -> Result<Comment> {
        self.begin(ApiOperation::EditComment)?;

        self.with_store(|store| {
            for comments in store.threads.values_mut() {
                if let Some(comment) = comments.iter_mut().find(|c| c.id == comment_id) {
                    comment.content = content.to_owned();
                    return Ok(comment.clone());
                }
            }

            for replies in store.replies.values_mut() {
                if let Some(reply) = replies.iter_mut().find(|r| r.id == comment_id) {
                    reply.content = content.to_owned();
                    return Ok(Comment {
                        id: reply.id.clone(),
                        content: reply.content.clone(),
                        author: reply.author.clone(),
                        reply_count: 0,
                        origin: Origin::Confirmed,
                    });
                }
            }

            Err(not_found("comment", comment_id))
        })
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        self.begin(ApiOperation::DeleteComment)?;

        self.with_store(|store| {
            if let Some(thread_id) = store.thread_of(comment_id) {
                if let Some(comments) = store.threads.get_mut(&thread_id) {
                    comments.retain(|comment| comment.id != comment_id);
                }
                if let Some(replies) = store.replies.get_mut(&thread_id) {
                    replies.retain(|reply| reply.parent_id != comment_id);
                }
                return Ok(());
            }

            let mut parent = None;
            for replies in store.replies.values_mut() {
                if let Some(index) = replies.iter().position(|reply| reply.id == comment_id) {
                    parent = Some(replies.remove(index).parent_id);
                    break;
                }
            }

            let parent_id = parent.ok_or_else(|| not_found("comment", comment_id))?;
            for comments in store.threads.values_mut() {
                if let Some(comment) = comments.iter_mut().find(|c| c.id == parent_id) {
                    comment.reply_count = comment.reply_count.saturating_sub(1);
                }
            }
            Ok(())
        })
    }
}
