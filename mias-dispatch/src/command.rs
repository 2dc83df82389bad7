use core::{fmt, str::FromStr};

/// Payloads longer than this are never inspected.
pub const MAX_REQUEST_LEN: usize = 40;

/// A recognized text command. Matching is exact and case-sensitive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    /// Echo link telemetry back to the sender.
    Ping,
    /// Read every configured temperature sensor.
    Temp,
    /// List the commands.
    Help,
}

impl Command {
    /// Every command, in the order they are listed by `help`.
    pub const ALL: [Command; 3] = [Command::Ping, Command::Temp, Command::Help];

    /// The command word.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Temp => "temp",
            Command::Help => "help",
        }
    }

    /// Match a raw payload.
    ///
    /// The payload ends at the first NUL byte, must be UTF-8, and is compared after trimming
    /// surrounding ASCII whitespace. Payloads over [`MAX_REQUEST_LEN`] bytes are rejected before
    /// any of that.
    pub fn parse(payload: &[u8]) -> Option<Command> {
        if payload.len() > MAX_REQUEST_LEN {
            return None;
        }
        let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
        core::str::from_utf8(&payload[..end])
            .ok()?
            .trim_ascii()
            .parse()
            .ok()
    }
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
