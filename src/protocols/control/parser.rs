//! Control protocol parser.

/// Token that disables reads on the echo port.
pub const STOP_READ: &str = "stop-read";

/// Token that re-enables reads on the echo port.
pub const START_READ: &str = "start-read";

/// Parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StopRead,
    StartRead,
    /// Anything else, kept for logging.
    Unknown(String),
}

/// Parse one control message.
///
/// Leading and trailing characters up to and including space are dropped,
/// which covers ASCII control bytes such as NUL as well as whitespace.
/// Invalid UTF-8 is decoded lossily; the replacement characters can never
/// match a command, so such input is reported as unknown.
pub fn parse(input: &[u8]) -> Command {
    let text = String::from_utf8_lossy(input);
    let trimmed = text.trim_matches(|c: char| c <= ' ');

    if trimmed.eq_ignore_ascii_case(STOP_READ) {
        Command::StopRead
    } else if trimmed.eq_ignore_ascii_case(START_READ) {
        Command::StartRead
    } else {
        Command::Unknown(trimmed.to_string())
    }
}
