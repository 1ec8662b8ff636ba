//! Slash command parsing for the chat REPL.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage sessions without sending messages to the
//! backend.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Start a new session, optionally titled.
    New(Option<String>),

    /// List local sessions.
    Sessions,

    /// Make another session active.
    Switch(String),

    /// Search sessions by title and message text.
    Search(String),

    /// Toggle the archived flag of the active session.
    Archive,

    /// Delete the active session.
    Delete,

    /// Replace local sessions with the backend's listing.
    Sync,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent to the backend as a message.
///
/// # Examples
///
/// ```
/// # use parlance::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/search drums").is_some());
/// assert!(parse_command("Find my drum loops").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::New(argument.map(|s| s.to_string())),
        "sessions" | "ls" => ChatCommand::Sessions,
        "switch" => match argument {
            Some(id) => ChatCommand::Switch(id.to_string()),
            None => ChatCommand::Invalid("/switch requires a session id".to_string()),
        },
        "search" => match argument {
            Some(query) => ChatCommand::Search(query.to_string()),
            None => ChatCommand::Invalid("/search requires a query".to_string()),
        },
        "archive" => ChatCommand::Archive,
        "delete" => ChatCommand::Delete,
        "sync" => ChatCommand::Sync,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        other => ChatCommand::Invalid(format!("Unknown command: /{other}")),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new [title]           Start a new session
  /sessions              List sessions (* marks the active one)
  /switch <id>           Make another session active
  /search <query>        Find sessions by title or message text
  /archive               Archive or unarchive the active session
  /delete                Delete the active session
  /sync                  Replace local sessions with the backend's list
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl-C while a reply is streaming to stop it."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_new() {
        assert_eq!(parse_command("/new"), Some(ChatCommand::New(None)));
        assert_eq!(
            parse_command("/NEW  Mixdown notes "),
            Some(ChatCommand::New(Some("Mixdown notes".to_string())))
        );
    }

    #[test]
    fn parse_switch_and_search_need_arguments() {
        assert_eq!(
            parse_command("/switch 1712345678901"),
            Some(ChatCommand::Switch("1712345678901".to_string()))
        );
        assert_eq!(
            parse_command("/switch"),
            Some(ChatCommand::Invalid(
                "/switch requires a session id".to_string()
            ))
        );
        assert_eq!(
            parse_command("/search hello world"),
            Some(ChatCommand::Search("hello world".to_string()))
        );
        assert!(matches!(
            parse_command("/search   "),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_session_management() {
        assert_eq!(parse_command("/sessions"), Some(ChatCommand::Sessions));
        assert_eq!(parse_command("/ls"), Some(ChatCommand::Sessions));
        assert_eq!(parse_command("/archive"), Some(ChatCommand::Archive));
        assert_eq!(parse_command("/delete"), Some(ChatCommand::Delete));
        assert_eq!(parse_command("/sync"), Some(ChatCommand::Sync));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid("Unknown command: /frobnicate".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("what does /new do?"), None);
    }

    #[test]
    fn help_text_not_empty() {
        assert!(help_text().contains("/search"));
    }
}
