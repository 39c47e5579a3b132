//! Parsing of interactive command lines.

use thiserror::Error;

/// A comment or reply addressed from the command line.
///
/// `3` is the third comment row, `3.2` the second reply under it, and
/// anything else is taken as a server id.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Target {
    Comment(usize),
    Reply { comment: usize, reply: usize },
    Id(String),
}

impl Target {
    fn parse(raw: &str) -> Self {
        if let Ok(comment) = raw.parse::<usize>() {
            return Self::Comment(comment);
        }
        if let Some((comment, reply)) = raw.split_once('.')
            && let (Ok(comment), Ok(reply)) = (comment.parse(), reply.parse())
        {
            return Self::Reply { comment, reply };
        }
        Self::Id(raw.to_owned())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PageMove {
    To(u32),
    Next,
    Prev,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
    Post(String),
    /// Writes a comment, or a reply to `Some(target)`, in `$EDITOR`.
    Compose(Option<Target>),
    Reply { target: Target, content: String },
    /// Without content the current text opens in `$EDITOR`.
    Edit { target: Target, content: Option<String> },
    Delete(Target),
    Expand(Target),
    Collapse(Target),
    Page(PageMove),
    Refresh,
    Retry,
    Help,
    Quit,
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum CommandError {
    #[error("unbalanced quotes")]
    Unbalanced,
    #[error("unknown command `{0}`; try `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
commands:
  post TEXT              post a comment
  compose [TARGET]       write a comment (or a reply to TARGET) in $EDITOR
  reply TARGET TEXT      reply to a comment
  edit TARGET [TEXT]     change your comment or reply
  delete TARGET          delete your comment or reply
  expand TARGET          show replies
  collapse TARGET        hide replies
  page N|next|prev       change page
  refresh                reload the current page
  retry                  resend the last failed post
  help                   show this text
  quit                   exit
targets: 3 (third comment), 3.2 (its second reply), or a comment id";

/// Parses one input line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let words = shlex::split(line).ok_or(CommandError::Unbalanced)?;
    let Some((name, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match name.as_str() {
        "post" | "p" => Command::Post(text(args).ok_or(CommandError::Usage("post TEXT"))?),
        "compose" | "c" => Command::Compose(args.first().map(|raw| Target::parse(raw))),
        "reply" | "r" => {
            let (target, rest) = args
                .split_first()
                .ok_or(CommandError::Usage("reply TARGET TEXT"))?;
            Command::Reply {
                target: Target::parse(target),
                content: text(rest).ok_or(CommandError::Usage("reply TARGET TEXT"))?,
            }
        }
        "edit" | "e" => {
            let (target, rest) = args
                .split_first()
                .ok_or(CommandError::Usage("edit TARGET [TEXT]"))?;
            Command::Edit {
                target: Target::parse(target),
                content: text(rest),
            }
        }
        "delete" | "d" => Command::Delete(single_target(args, "delete TARGET")?),
        "expand" | "x" => Command::Expand(single_target(args, "expand TARGET")?),
        "collapse" => Command::Collapse(single_target(args, "collapse TARGET")?),
        "page" => {
            let usage = CommandError::Usage("page N|next|prev");
            let movement = match args {
                [arg] if arg == "next" || arg == "n" => PageMove::Next,
                [arg] if arg == "prev" || arg == "p" => PageMove::Prev,
                [arg] => PageMove::To(arg.parse().map_err(|_| usage)?),
                _ => return Err(usage),
            };
            Command::Page(movement)
        }
        "next" => Command::Page(PageMove::Next),
        "prev" => Command::Page(PageMove::Prev),
        "refresh" => Command::Refresh,
        "retry" => Command::Retry,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_owned())),
    };
    Ok(Some(command))
}

fn text(words: &[String]) -> Option<String> {
    let joined = words.join(" ");
    (!joined.trim().is_empty()).then_some(joined)
}

fn single_target(args: &[String], usage: &'static str) -> Result<Target, CommandError> {
    match args {
        [target] => Ok(Target::parse(target)),
        _ => Err(CommandError::Usage(usage)),
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, CommandError, PageMove, Target, parse_command};

    #[test]
    fn quoted_text_is_kept_whole() {
        let command = parse_command(r#"post "hello  there""#).expect("parses");
        assert_eq!(command, Some(Command::Post("hello  there".to_owned())));
    }

    #[test]
    fn unquoted_words_are_joined() {
        let command = parse_command("reply 2 nice work").expect("parses");
        assert_eq!(
            command,
            Some(Command::Reply {
                target: Target::Comment(2),
                content: "nice work".to_owned(),
            })
        );
    }

    #[test]
    fn reply_positions_and_ids_are_targets() {
        assert_eq!(
            parse_command("delete 3.2").expect("parses"),
            Some(Command::Delete(Target::Reply {
                comment: 3,
                reply: 2
            }))
        );
        assert_eq!(
            parse_command("expand c17").expect("parses"),
            Some(Command::Expand(Target::Id("c17".to_owned())))
        );
    }

    #[test]
    fn edit_without_text_opens_editor() {
        assert_eq!(
            parse_command("edit 1").expect("parses"),
            Some(Command::Edit {
                target: Target::Comment(1),
                content: None,
            })
        );
    }

    #[test]
    fn page_accepts_numbers_and_directions() {
        assert_eq!(
            parse_command("page 2").expect("parses"),
            Some(Command::Page(PageMove::To(2)))
        );
        assert_eq!(
            parse_command("next").expect("parses"),
            Some(Command::Page(PageMove::Next))
        );
        assert_eq!(
            parse_command("page two"),
            Err(CommandError::Usage("page N|next|prev"))
        );
    }

    #[test]
    fn blank_and_bad_lines() {
        assert_eq!(parse_command("   ").expect("parses"), None);
        assert_eq!(parse_command("post 'oops"), Err(CommandError::Unbalanced));
        assert_eq!(
            parse_command("frobnicate"),
            Err(CommandError::Unknown("frobnicate".to_owned()))
        );
        assert_eq!(parse_command("post"), Err(CommandError::Usage("post TEXT")));
    }
}
