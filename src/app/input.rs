//! app::input
//!
//! Operator command line parsing and the stdin reader task.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedSender;

use super::events::{UiEvent, UserCommand};
use crate::daemon::{ApplicationAction, ApplicationRequest};
use crate::view::ViewState;

/// Help text listing every command.
pub const HELP: &str = "\
commands:
  show <static|browser|application|work>   switch view
  update                                   update repositories
  install <package>                        install an application
  remove <package>                         remove an application
  upgrade                                  upgrade the system
  fingerprint                              print repository fingerprints
  clear-cache                              wipe the local cache
  status                                   print view and activity
  help                                     this text
  quit                                     close pkgfront";

/// Parse one input line.
///
/// # Example
///
/// ```
/// use pkgfront::app::{parse_command, UserCommand};
/// use pkgfront::view::ViewState;
///
/// assert_eq!(parse_command("show work"), Ok(UserCommand::Show(ViewState::Work)));
/// assert!(parse_command("dance").is_err());
/// ```
pub fn parse_command(line: &str) -> Result<UserCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments to '{verb}'"));
    }

    let command = match (verb, arg) {
        ("show", Some(state)) => UserCommand::Show(parse_view(state)?),
        ("update", None) => UserCommand::Update,
        ("install", Some(package)) => manage(package, ApplicationAction::Install),
        ("remove", Some(package)) => manage(package, ApplicationAction::Remove),
        ("upgrade", None) => UserCommand::Upgrade,
        ("fingerprint", None) => UserCommand::Fingerprint,
        ("clear-cache", None) => UserCommand::ClearCache,
        ("status", None) => UserCommand::Status,
        ("help", None) => UserCommand::Help,
        ("quit" | "exit", None) => UserCommand::Quit,
        ("show" | "install" | "remove", None) => {
            return Err(format!("'{verb}' needs an argument"))
        }
        (_, Some(_)) if is_known(verb) => return Err(format!("'{verb}' takes no argument")),
        _ => return Err(format!("unknown command '{verb}'")),
    };
    Ok(command)
}

fn is_known(verb: &str) -> bool {
    matches!(
        verb,
        "update" | "upgrade" | "fingerprint" | "clear-cache" | "status" | "help" | "quit" | "exit"
    )
}

fn manage(package: &str, action: ApplicationAction) -> UserCommand {
    UserCommand::Manage(ApplicationRequest {
        package: package.to_string(),
        action,
    })
}

fn parse_view(name: &str) -> Result<ViewState, String> {
    ViewState::ALL
        .into_iter()
        .find(|state| state.to_string() == name)
        .ok_or_else(|| format!("unknown view '{name}'"))
}

/// Read commands until end of input.
///
/// Unparseable lines are reported and followed by the help text. End of
/// input posts [`UiEvent::InputClosed`].
pub async fn read_commands<R>(input: R, events: UnboundedSender<UiEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read operator input");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_command(&line) {
            Ok(command) => UiEvent::Command(command),
            Err(e) => {
                crate::ui::output::error(&e);
                UiEvent::Command(UserCommand::Help)
            }
        };
        if events.send(event).is_err() {
            return;
        }
    }
    let _ = events.send(UiEvent::InputClosed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn parses_every_command() {
        assert_eq!(parse_command("update"), Ok(UserCommand::Update));
        assert_eq!(parse_command(" upgrade "), Ok(UserCommand::Upgrade));
        assert_eq!(parse_command("fingerprint"), Ok(UserCommand::Fingerprint));
        assert_eq!(parse_command("clear-cache"), Ok(UserCommand::ClearCache));
        assert_eq!(parse_command("status"), Ok(UserCommand::Status));
        assert_eq!(parse_command("help"), Ok(UserCommand::Help));
        assert_eq!(parse_command("exit"), Ok(UserCommand::Quit));
        assert_eq!(
            parse_command("remove app-misc/foo"),
            Ok(UserCommand::Manage(ApplicationRequest {
                package: "app-misc/foo".into(),
                action: ApplicationAction::Remove,
            }))
        );
    }

    #[test]
    fn argument_errors() {
        assert!(parse_command("").is_err());
        assert!(parse_command("install").unwrap_err().contains("needs an argument"));
        assert!(parse_command("update now").unwrap_err().contains("takes no argument"));
        assert!(parse_command("show nowhere").unwrap_err().contains("unknown view"));
        assert!(parse_command("install a b").unwrap_err().contains("too many"));
    }

    #[tokio::test]
    async fn reader_posts_commands_then_closes() {
        let (tx, mut rx) = unbounded_channel();
        let input: &[u8] = b"status\n\nbogus\n";
        read_commands(input, tx).await;

        assert!(matches!(rx.recv().await, Some(UiEvent::Command(UserCommand::Status))));
        assert!(matches!(rx.recv().await, Some(UiEvent::Command(UserCommand::Help))));
        assert!(matches!(rx.recv().await, Some(UiEvent::InputClosed)));
    }
}
