//! Stdin command parsing.
//!
//! Lines starting with `/` are commands; anything else is a chat message.

use lectern_types::{CurrentView, VideoId};
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  /watch <id>        mark a video watched
  /fav <id>          toggle a favorite
  /open <view>       main | favorites | chats | community | category <key> | video <id>
  /history           reload chat history
  /clear             clear chat history
  /reconnect         reconnect push streams
  /progress          refresh progress from the server
  /help              show this help
  /quit              exit
Any other line is sent as a chat message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Watch(VideoId),
    Favorite(VideoId),
    Open(CurrentView),
    History,
    Clear,
    Reconnect,
    Progress,
    Help,
    Quit,
    Chat(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("unknown view '{0}' (try /help)")]
    UnknownView(String),
    #[error("unknown command /{0} (try /help)")]
    UnknownCommand(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<Command, CommandError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Ok(Command::Chat(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let command = match name.to_ascii_lowercase().as_str() {
        "watch" => video_arg("watch", arg).map(Command::Watch),
        "fav" | "favorite" => video_arg("fav", arg).map(Command::Favorite),
        "open" => {
            if arg.is_empty() {
                Err(CommandError::MissingArgument("open"))
            } else {
                CurrentView::parse(arg)
                    .map(Command::Open)
                    .ok_or_else(|| CommandError::UnknownView(arg.to_string()))
            }
        }
        "history" => Ok(Command::History),
        "clear" => Ok(Command::Clear),
        "reconnect" => Ok(Command::Reconnect),
        "progress" => Ok(Command::Progress),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::UnknownCommand(other.to_string())),
    };
    Some(command)
}

fn video_arg(command: &'static str, arg: &str) -> Result<VideoId, CommandError> {
    match arg.split_whitespace().next() {
        Some(id) => Ok(VideoId::from(id)),
        None => Err(CommandError::MissingArgument(command)),
    }
}

#[cfg(test)]
mod tests {
    use lectern_types::Category;

    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(
            parse("  how do closures work? "),
            Some(Ok(Command::Chat("how do closures work?".to_string())))
        );
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(
            parse("/watch 12"),
            Some(Ok(Command::Watch(VideoId::from("12"))))
        );
        assert_eq!(
            parse("/FAV 3"),
            Some(Ok(Command::Favorite(VideoId::from("3"))))
        );
        assert_eq!(
            parse("/open category php"),
            Some(Ok(Command::Open(CurrentView::Category(Category::from("php")))))
        );
    }

    #[test]
    fn argument_errors() {
        assert_eq!(
            parse("/watch"),
            Some(Err(CommandError::MissingArgument("watch")))
        );
        assert_eq!(
            parse("/open nowhere"),
            Some(Err(CommandError::UnknownView("nowhere".to_string())))
        );
        assert_eq!(
            parse("/dance"),
            Some(Err(CommandError::UnknownCommand("dance".to_string())))
        );
    }

    #[test]
    fn bare_commands() {
        assert_eq!(parse("/quit"), Some(Ok(Command::Quit)));
        assert_eq!(parse("/exit"), Some(Ok(Command::Quit)));
        assert_eq!(parse("/reconnect"), Some(Ok(Command::Reconnect)));
    }
}
