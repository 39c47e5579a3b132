//! Plain-text renderer for the merged thread view.

use crate::domain::{Author, Identity, Origin};
use crate::sync::{CommentView, ReplyScopeState, ReplyView, ThreadView};

const RULE_WIDTH: usize = 48;

/// Renders the whole thread, one output line per element.
///
/// Rows are numbered so commands can address them (`3`, `3.1`).
pub fn render_thread(view: &ThreadView, identity: Option<&Identity>) -> Vec<String> {
    let mut out = Vec::new();

    let last_page = view.metadata.last_page.max(1);
    let noun = if view.total == 1 { "comment" } else { "comments" };
    let mut header = format!(
        "Thread {}  {} {noun}  page {}/{last_page}",
        view.thread_id, view.total, view.current_page
    );
    if view.loading {
        header.push_str("  (loading)");
    }
    out.push(header);
    out.push(horizontal_rule());

    if let Some(error) = &view.error {
        out.push(format!("! could not load comments: {error}"));
    }

    if view.comments.is_empty() && view.loaded && !view.loading {
        out.push("  no comments yet".to_owned());
    }

    for (index, row) in view.comments.iter().enumerate() {
        render_comment(&mut out, index + 1, row, identity);
    }

    out.push(horizontal_rule());
    out
}

fn render_comment(out: &mut Vec<String>, position: usize, row: &CommentView, identity: Option<&Identity>) {
    let comment = &row.comment;
    out.push(format!(
        "{position:>2}. {}",
        byline(&comment.author, &comment.origin, identity)
    ));
    out.extend(body_lines(&comment.content, "    "));
    render_replies(out, position, &row.replies, identity);
}

fn render_replies(out: &mut Vec<String>, position: usize, replies: &ReplyView, identity: Option<&Identity>) {
    match replies.state {
        ReplyScopeState::Loading => out.push("    ~ loading replies".to_owned()),
        ReplyScopeState::Error => out.push(format!(
            "    ! replies failed: {}",
            replies.error.as_deref().unwrap_or("unknown error")
        )),
        ReplyScopeState::Collapsed | ReplyScopeState::Loaded => {}
    }

    if !replies.expanded {
        if replies.count > 0 {
            out.push(format!("    [{}] (expand {position})", reply_count_label(replies.count)));
        }
        return;
    }

    for (index, reply) in replies.entries.iter().enumerate() {
        out.push(format!(
            "    {position}.{} {}",
            index + 1,
            byline(&reply.author, &reply.origin, identity)
        ));
        out.extend(body_lines(&reply.content, "        "));
    }
}

fn byline(author: &Author, origin: &Origin, identity: Option<&Identity>) -> String {
    let mut line = author.display_name();
    if identity.is_some_and(|identity| identity.id == author.id) {
        line.push_str(" (you)");
    }
    if origin.is_pending() {
        line.push_str("  [sending]");
    }
    line
}

fn body_lines(content: &str, indent: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| format!("{indent}{line}"))
        .collect()
}

/// `1 reply`, `3 replies`.
pub fn reply_count_label(count: usize) -> String {
    if count == 1 {
        "1 reply".to_owned()
    } else {
        format!("{count} replies")
    }
}

fn horizontal_rule() -> String {
    "-".repeat(RULE_WIDTH)
}
