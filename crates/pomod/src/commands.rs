//! Stdin command parsing

use std::fmt;

/// One line typed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Start,
    Pause,
    Resume,
    Skip,
    Reset,
    Finish,
    Stop,
    SetRemaining(u64),
    CancelAutoStart,
    Status,
    Logout,
    /// Simulate the client going to the background
    Hide,
    Show,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const HELP: &str = "\
commands:
  start | resume     start or resume the countdown
  pause              pause the countdown
  skip               jump to the next phase
  reset              back to a fresh focus phase
  finish             complete the session
  stop               abandon the session
  set <seconds>      set the remaining time (not started or paused only)
  cancel             cancel a pending auto-start
  status             print the timer
  hide | show        simulate losing or regaining visibility
  logout             drop queued notifications
  quit";

impl UserCommand {
    /// Parse a line. Returns `Ok(None)` for blank input.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Ok(None);
        };

        let cmd = match word.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "skip" => Self::Skip,
            "reset" => Self::Reset,
            "finish" => Self::Finish,
            "stop" => Self::Stop,
            "set" => {
                let arg = words
                    .next()
                    .ok_or_else(|| ParseError("usage: set <seconds>".into()))?;
                let secs = arg
                    .parse::<u64>()
                    .map_err(|_| ParseError(format!("not a number of seconds: {}", arg)))?;
                Self::SetRemaining(secs)
            }
            "cancel" => Self::CancelAutoStart,
            "status" => Self::Status,
            "logout" => Self::Logout,
            "hide" => Self::Hide,
            "show" => Self::Show,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError(format!("unknown command: {}", other))),
        };

        if words.next().is_some() {
            return Err(ParseError(format!("too many arguments for {}", word)));
        }
        Ok(Some(cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_words() {
        assert_eq!(UserCommand::parse("start").unwrap(), Some(UserCommand::Start));
        assert_eq!(UserCommand::parse("  PAUSE ").unwrap(), Some(UserCommand::Pause));
        assert_eq!(UserCommand::parse("cancel").unwrap(), Some(UserCommand::CancelAutoStart));
        assert_eq!(UserCommand::parse("exit").unwrap(), Some(UserCommand::Quit));
        assert_eq!(UserCommand::parse("").unwrap(), None);
    }

    #[test]
    fn test_parse_set() {
        assert_eq!(
            UserCommand::parse("set 90").unwrap(),
            Some(UserCommand::SetRemaining(90))
        );
        assert!(UserCommand::parse("set").is_err());
        assert!(UserCommand::parse("set soon").is_err());
        assert!(UserCommand::parse("set -5").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(UserCommand::parse("launch").is_err());
        assert!(UserCommand::parse("pause now").is_err());
    }
}
