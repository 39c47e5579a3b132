use crate::api::ApiError;
use crate::sync::coordinator::MutationKind;
use thiserror::Error;

/// Result type for sync engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Input problems caught before any state changes.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ValidationError {
    #[error("content is empty")]
    EmptyContent,
    #[error("content is {length} characters; the limit is {max}")]
    TooLong { length: usize, max: usize },
    #[error("only the author can change comment {0}")]
    NotAuthor(String),
    #[error("comment {0} is not loaded")]
    UnknownEntity(String),
    #[error("comment {0} is still being posted")]
    PendingTarget(String),
}

/// Errors surfaced by the sync engine. None of them leave partial state behind.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("sign in to post or change comments")]
    AuthRequired,
    #[error("{kind} failed: {source}")]
    MutationFailed { kind: MutationKind, source: ApiError },
    #[error("loading {scope} failed: {source}")]
    FetchFailed { scope: String, source: ApiError },
}

impl SyncError {
    pub fn is_auth_required(&self) -> bool {
        match self {
            Self::AuthRequired => true,
            Self::MutationFailed { source, .. } | Self::FetchFailed { source, .. } => {
                source.is_unauthorized()
            }
            Self::Validation(_) => false,
        }
    }
}
