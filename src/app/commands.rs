//! Inbound commands to the control service.
//!
//! These represent actions requested by the outside world (front-panel
//! buttons, web UI) that the
//! [`ControlService`](super::service::ControlService) interprets and acts
//! upon.

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Begin a fresh run from cycle 1.
    Start,

    /// Abort the run and enter the mandatory cooldown.
    Stop,

    /// Return an `Off` controller to `Idle`.
    Reset,

    /// Change the heating target; takes effect on the next evaluation.
    SetTopSetpoint(f32),

    /// Change the cooling target; takes effect on the next evaluation.
    SetBottomSetpoint(f32),

    /// Change the cycle limit (0 = unlimited).
    SetMaxCycles(u16),
}

/// Outcome of [`ControlService::handle_command`](super::service::ControlService::handle_command).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    /// The command is not valid in the current state; nothing changed.
    Ignored,
    /// Start while the apparatus is still in its safety cooldown.
    RejectedCoolingDown,
}

impl Command {
    /// Parse one line of the bench console: `start`, `stop`, `reset`,
    /// `top <°C>`, `bottom <°C>`, `cycles <n>`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let arg = words.next();
        if words.next().is_some() {
            return None;
        }
        match (verb.to_ascii_lowercase().as_str(), arg) {
            ("start", None) => Some(Self::Start),
            ("stop", None) => Some(Self::Stop),
            ("reset", None) => Some(Self::Reset),
            ("top", Some(v)) => v.parse().ok().filter(|c: &f32| c.is_finite()).map(Self::SetTopSetpoint),
            ("bottom", Some(v)) => v.parse().ok().filter(|c: &f32| c.is_finite()).map(Self::SetBottomSetpoint),
            ("cycles", Some(v)) => v.parse().ok().map(Self::SetMaxCycles),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_lines() {
        assert_eq!(Command::parse("start"), Some(Command::Start));
        assert_eq!(Command::parse("  STOP \n"), Some(Command::Stop));
        assert_eq!(Command::parse("top 92.5"), Some(Command::SetTopSetpoint(92.5)));
        assert_eq!(Command::parse("cycles 30"), Some(Command::SetMaxCycles(30)));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("top"), None);
        assert_eq!(Command::parse("top NaN"), None);
        assert_eq!(Command::parse("cycles -1"), None);
        assert_eq!(Command::parse("start now"), None);
    }
}
