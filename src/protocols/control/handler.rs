//! Control protocol handler.

use super::parser::{self, Command};
use crate::runtime::ReadInterest;
use tracing::{debug, info};

/// Reply sent for any input that is not a known command.
pub const HELP: &[u8] = b"Supported commands:\nstop-read\nstart-read\n";

/// What the reactor must do after a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Set read interest for every connection in the echo group.
    SetEchoInterest(ReadInterest),
    /// Write these bytes back to the calling connection.
    Reply(&'static [u8]),
}

/// Interpret one control message.
pub fn handle(message: &[u8]) -> ControlAction {
    match parser::parse(message) {
        Command::StopRead => {
            info!("Handle stop-read");
            ControlAction::SetEchoInterest(ReadInterest::Disabled)
        }
        Command::StartRead => {
            info!("Handle start-read");
            ControlAction::SetEchoInterest(ReadInterest::Enabled)
        }
        Command::Unknown(text) => {
            debug!(command = %text, "Unknown command");
            ControlAction::Reply(HELP)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions() {
        assert_eq!(
            handle(b"Stop-Read\n"),
            ControlAction::SetEchoInterest(ReadInterest::Disabled)
        );
        assert_eq!(
            handle(b"start-read"),
            ControlAction::SetEchoInterest(ReadInterest::Enabled)
        );
        assert_eq!(handle(b"garbage"), ControlAction::Reply(HELP));
    }

    #[test]
    fn test_help_lists_both_commands() {
        let text = std::str::from_utf8(HELP).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["Supported commands:", parser::STOP_READ, parser::START_READ]);
    }
}
