//! Comment and reply models shared across the sync engine, API, and render layers.

use std::fmt;

/// Ephemeral identifier assigned to an optimistic entity at submit time.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ClientId(pub u64);

impl ClientId {
    /// Display id used for a pending entity until the server assigns one.
    pub fn display_id(self) -> String {
        format!("optimistic-{}", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether an entity came from an authoritative fetch or a local submission.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Origin {
    Confirmed,
    Pending {
        client_id: ClientId,
        /// Set once the create call has returned the authoritative record.
        server_id: Option<String>,
    },
}

impl Origin {
    pub fn pending(client_id: ClientId) -> Self {
        Self::Pending {
            client_id,
            server_id: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn client_id(&self) -> Option<ClientId> {
        match self {
            Self::Confirmed => None,
            Self::Pending { client_id, .. } => Some(*client_id),
        }
    }

    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::Confirmed => None,
            Self::Pending { server_id, .. } => server_id.as_deref(),
        }
    }
}

/// Permission level reported for an author.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum AuthorRole {
    #[default]
    Member,
    Admin,
    SuperAdmin,
}

impl AuthorRole {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Self::Admin,
            "SUPER_ADMIN" => Self::SuperAdmin,
            _ => Self::Member,
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

/// Author snapshot captured when the entity was created.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub role: AuthorRole,
}

impl Author {
    /// Returns the name shown next to a comment.
    pub fn display_name(&self) -> String {
        if self.role.is_admin() {
            return "Admin".to_owned();
        }

        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            "You".to_owned()
        } else {
            name.to_owned()
        }
    }
}

/// The authenticated session user, if any.
pub type Identity = Author;

/// A root comment in a thread.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub author: Author,
    pub reply_count: u32,
    pub origin: Origin,
}

/// A reply to a root comment. Replies never nest further.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Reply {
    pub id: String,
    pub content: String,
    pub author: Author,
    pub parent_id: String,
    pub origin: Origin,
}

/// Key used to match a pending entity against freshly fetched confirmed data.
///
/// Two real submissions with the same content and author (and parent, for
/// replies) produce the same key and cannot be told apart by it.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DedupKey {
    pub content: String,
    pub author_id: String,
    pub parent_id: Option<String>,
}

/// Behavior shared by comments and replies inside a reconciliation scope.
pub trait ThreadEntity: Clone {
    fn id(&self) -> &str;
    fn content(&self) -> &str;
    fn set_content(&mut self, content: String);
    fn author(&self) -> &Author;
    fn origin(&self) -> &Origin;
    fn origin_mut(&mut self) -> &mut Origin;
    fn dedup_key(&self) -> DedupKey;
}

impl ThreadEntity for Comment {
    fn id(&self) -> &str {
        &self.id
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
    }

    fn author(&self) -> &Author {
        &self.author
    }

    fn origin(&self) -> &Origin {
        &self.origin
    }

    fn origin_mut(&mut self) -> &mut Origin {
        &mut self.origin
    }

    fn dedup_key(&self) -> DedupKey {
        DedupKey {
            content: self.content.clone(),
            author_id: self.author.id.clone(),
            parent_id: None,
        }
    }
}

impl ThreadEntity for Reply {
    fn id(&self) -> &str {
        &self.id
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
    }

    fn author(&self) -> &Author {
        &self.author
    }

    fn origin(&self) -> &Origin {
        &self.origin
    }

    fn origin_mut(&mut self) -> &mut Origin {
        &mut self.origin
    }

    fn dedup_key(&self) -> DedupKey {
        DedupKey {
            content: self.content.clone(),
            author_id: self.author.id.clone(),
            parent_id: Some(self.parent_id.clone()),
        }
    }
}

/// Returns the dedup key of any thread entity.
pub fn dedup_key<E: ThreadEntity>(entity: &E) -> DedupKey {
    entity.dedup_key()
}

/// Returns whether two entities refer to the same comment or reply.
///
/// Confirmed entities compare by server id. A pending entity that already
/// knows its server id compares by that id; otherwise entities fall back to
/// their dedup keys.
pub fn is_same_entity<E: ThreadEntity>(a: &E, b: &E) -> bool {
    match (a.origin(), b.origin()) {
        (Origin::Confirmed, Origin::Confirmed) => a.id() == b.id(),
        (Origin::Pending { client_id: left, .. }, Origin::Pending { client_id: right, .. })
            if left == right =>
        {
            true
        }
        _ => match (known_server_id(a), known_server_id(b)) {
            (Some(left), Some(right)) => left == right,
            _ => a.dedup_key() == b.dedup_key(),
        },
    }
}

fn known_server_id<E: ThreadEntity>(entity: &E) -> Option<&str> {
    match entity.origin() {
        Origin::Confirmed => Some(entity.id()),
        Origin::Pending { server_id, .. } => server_id.as_deref(),
    }
}

/// Pagination window of the confirmed comment list.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PageMetadata {
    pub total: u32,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl PageMetadata {
    /// Metadata for a thread that has not been fetched yet.
    pub fn empty(per_page: u32) -> Self {
        Self {
            total: 0,
            current_page: 1,
            last_page: 1,
            per_page,
            prev_page: None,
            next_page: None,
        }
    }
}

/// One page of confirmed comments as returned by the comments API.
#[derive(Debug, Clone)]
pub struct CommentPage {
    pub data: Vec<Comment>,
    pub metadata: PageMetadata,
}
