//! Deterministic fixture data for demo mode and harness rendering.

use crate::api::memory::InMemoryCommentsApi;
use crate::domain::{Author, AuthorRole, Identity};

/// Thread every demo session opens.
pub const DEMO_THREAD_ID: &str = "demo-thread";

const DEMO_COMMENTS: [(&str, usize); 12] = [
    ("Is the venue confirmed for Saturday?", 1),
    ("Parking opens at 7am, bring cash.", 2),
    ("Anyone carpooling from the north side?", 3),
    ("Updated the schedule, see pinned post.", 4),
    ("gm all", 1),
    ("Will there be vegetarian options?", 2),
    ("Slides from last week are up.", 0),
    ("Can we push the start by 30 minutes?", 3),
    ("Reminder: RSVP closes Friday.", 4),
    ("Thanks for organizing this!", 2),
    ("Weather looks clear so far.", 1),
    ("First time here, excited to join.", 3),
];

/// The signed-in user of demo mode.
pub fn demo_identity() -> Identity {
    author("u1", "Ada", "Lovelace", AuthorRole::Member)
}

fn demo_authors() -> [Author; 5] {
    [
        demo_identity(),
        author("u2", "Grace", "Hopper", AuthorRole::Member),
        author("u3", "Linus", "", AuthorRole::Member),
        author("u4", "Site", "Staff", AuthorRole::Admin),
        author("u5", "", "", AuthorRole::Member),
    ]
}

fn author(id: &str, first_name: &str, last_name: &str, role: AuthorRole) -> Author {
    Author {
        id: id.to_owned(),
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        role,
    }
}

/// Builds an in-memory API holding two pages of demo comments with a few replies.
pub fn demo_api() -> InMemoryCommentsApi {
    let authors = demo_authors();
    let api = InMemoryCommentsApi::new(demo_identity());

    let mut ids = Vec::with_capacity(DEMO_COMMENTS.len());
    for (content, author_index) in DEMO_COMMENTS {
        let author = authors[author_index % authors.len()].clone();
        ids.push(api.seed_comment(DEMO_THREAD_ID, content, author));
    }

    // Newest comments were seeded last.
    if let Some(newest) = ids.last() {
        api.seed_reply(newest, "Welcome aboard!", authors[1].clone());
        api.seed_reply(newest, "Glad you made it.", authors[3].clone());
    }
    if let Some(schedule) = ids.get(3) {
        api.seed_reply(schedule, "Thanks, looks good.", authors[0].clone());
    }

    api
}
