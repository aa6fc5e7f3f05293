//! Slash commands understood by the bot.

use crate::model::{Role, Status};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Search,
    Approved { region: String, category: String },
    Requests,
    Users,
    Export,
    Role { chat_id: i64, role: Role },
    Status {
        id: i64,
        status: Status,
        reason: Option<String>,
    },
    Rename { id: i64, name: String },
    Move {
        id: i64,
        category: String,
        region: String,
    },
    Remove { id: i64 },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("unknown command /{0}")]
    Unknown(String),
}

const APPROVED_USAGE: &str = "/approved <region>, <category>";
const ROLE_USAGE: &str = "/role <chat_id> <moderator|observer|user>";
const STATUS_USAGE: &str = "/status <id> <approved|forbidden> [reason]";
const RENAME_USAGE: &str = "/rename <id> <name>";
const MOVE_USAGE: &str = "/move <id> <category>, <region>";
const REMOVE_USAGE: &str = "/remove <id>";

/// Parse a message. Returns `None` when the text is not a command.
pub fn parse(text: &str) -> Option<Result<Command, CommandError>> {
    let text = text.trim();
    let body = text.strip_prefix('/')?;
    let (head, args) = match body.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (body, ""),
    };
    // Group chats address commands as /cmd@botname.
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    Some(parse_command(&name, args))
}

fn parse_command(name: &str, args: &str) -> Result<Command, CommandError> {
    match name {
        "start" => Ok(Command::Start),
        "help" => Ok(Command::Help),
        "search" => Ok(Command::Search),
        "requests" => Ok(Command::Requests),
        "users" => Ok(Command::Users),
        "export" => Ok(Command::Export),
        "approved" => {
            let (region, category) =
                two_fields(args).ok_or(CommandError::Usage(APPROVED_USAGE))?;
            Ok(Command::Approved { region, category })
        }
        "role" => {
            let mut it = args.split_whitespace();
            let chat_id = it
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or(CommandError::Usage(ROLE_USAGE))?;
            let role = it
                .next()
                .and_then(Role::parse_role)
                .ok_or(CommandError::Usage(ROLE_USAGE))?;
            if it.next().is_some() {
                return Err(CommandError::Usage(ROLE_USAGE));
            }
            Ok(Command::Role { chat_id, role })
        }
        "status" => {
            let (id, rest) = leading_id(args).ok_or(CommandError::Usage(STATUS_USAGE))?;
            let (status, reason) = match rest.split_once(char::is_whitespace) {
                Some((status, reason)) => (status, Some(reason.trim().to_string())),
                None => (rest, None),
            };
            let status = Status::parse_status(status).ok_or(CommandError::Usage(STATUS_USAGE))?;
            Ok(Command::Status {
                id,
                status,
                reason: reason.filter(|r| !r.is_empty()),
            })
        }
        "rename" => {
            let (id, name) = leading_id(args).ok_or(CommandError::Usage(RENAME_USAGE))?;
            if name.is_empty() {
                return Err(CommandError::Usage(RENAME_USAGE));
            }
            Ok(Command::Rename {
                id,
                name: name.to_string(),
            })
        }
        "move" => {
            let (id, rest) = leading_id(args).ok_or(CommandError::Usage(MOVE_USAGE))?;
            let (category, region) = two_fields(rest).ok_or(CommandError::Usage(MOVE_USAGE))?;
            Ok(Command::Move {
                id,
                category,
                region,
            })
        }
        "remove" => {
            let (id, rest) = leading_id(args).ok_or(CommandError::Usage(REMOVE_USAGE))?;
            if !rest.is_empty() {
                return Err(CommandError::Usage(REMOVE_USAGE));
            }
            Ok(Command::Remove { id })
        }
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn leading_id(args: &str) -> Option<(i64, &str)> {
    let (id, rest) = match args.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, rest.trim()),
        None => (args, ""),
    };
    let id = id.trim_start_matches('#').parse().ok()?;
    Some((id, rest))
}

fn two_fields(args: &str) -> Option<(String, String)> {
    let (a, b) = args.split_once(',')?;
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() || b.contains(',') {
        return None;
    }
    Some((a.to_string(), b.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse("Anna Smith, beauty, italy"), None);
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse("/start"), Some(Ok(Command::Start)));
        assert_eq!(parse("/help@celeb_bot"), Some(Ok(Command::Help)));
        assert_eq!(parse(" /Requests "), Some(Ok(Command::Requests)));
        assert_eq!(parse("/export"), Some(Ok(Command::Export)));
        assert_eq!(
            parse("/nope"),
            Some(Err(CommandError::Unknown("nope".into())))
        );
    }

    #[test]
    fn approved_takes_region_and_category() {
        assert_eq!(
            parse("/approved Italy, beauty"),
            Some(Ok(Command::Approved {
                region: "Italy".into(),
                category: "beauty".into()
            }))
        );
        assert_eq!(
            parse("/approved italy"),
            Some(Err(CommandError::Usage(APPROVED_USAGE)))
        );
    }

    #[test]
    fn status_with_optional_reason() {
        assert_eq!(
            parse("/status 12 forbidden paid promotion scandal"),
            Some(Ok(Command::Status {
                id: 12,
                status: Status::Forbidden,
                reason: Some("paid promotion scandal".into())
            }))
        );
        assert_eq!(
            parse("/status #3 approved"),
            Some(Ok(Command::Status {
                id: 3,
                status: Status::Approved,
                reason: None
            }))
        );
        assert!(matches!(parse("/status 3 maybe"), Some(Err(_))));
        assert!(matches!(parse("/status x approved"), Some(Err(_))));
    }

    #[test]
    fn edit_commands() {
        assert_eq!(
            parse("/rename 4 Jhon Doe"),
            Some(Ok(Command::Rename {
                id: 4,
                name: "Jhon Doe".into()
            }))
        );
        assert_eq!(
            parse("/move 4 finance, spain"),
            Some(Ok(Command::Move {
                id: 4,
                category: "finance".into(),
                region: "spain".into()
            }))
        );
        assert_eq!(parse("/remove 4"), Some(Ok(Command::Remove { id: 4 })));
        assert!(matches!(parse("/rename 4"), Some(Err(_))));
    }

    #[test]
    fn role_command() {
        assert_eq!(
            parse("/role 555 moderator"),
            Some(Ok(Command::Role {
                chat_id: 555,
                role: Role::Moderator
            }))
        );
        assert!(matches!(parse("/role 555 king"), Some(Err(_))));
        assert!(matches!(parse("/role moderator"), Some(Err(_))));
    }
}
