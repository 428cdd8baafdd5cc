//! Named POSIX signals understood by the supervisor.
//!
//! The core crate never delivers signals itself; it only names them so that
//! settings, events and ports can refer to them without pulling in an OS
//! binding. The runtime maps each variant onto the platform signal number.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A signal the master accepts or delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Signal {
    /// `SIGINT` (Ctrl-C in a terminal).
    Interrupt,
    /// `SIGHUP`.
    HangUp,
    /// `SIGTERM`.
    Terminate,
    /// `SIGQUIT`.
    Quit,
    /// `SIGKILL`, only ever used for operator escalation.
    Kill,
    /// `SIGUSR1`.
    User1,
    /// `SIGUSR2`, the default reload signal.
    User2,
}

impl Signal {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Interrupt,
        Self::HangUp,
        Self::Terminate,
        Self::Quit,
        Self::Kill,
        Self::User1,
        Self::User2,
    ];

    /// Conventional upper-case name, e.g. `SIGTERM`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::HangUp => "SIGHUP",
            Self::Terminate => "SIGTERM",
            Self::Quit => "SIGQUIT",
            Self::Kill => "SIGKILL",
            Self::User1 => "SIGUSR1",
            Self::User2 => "SIGUSR2",
        }
    }

    /// Whether a process can install a handler for this signal.
    #[must_use]
    pub const fn is_catchable(self) -> bool {
        !matches!(self, Self::Kill)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a signal name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown signal name: {0}")]
pub struct ParseSignalError(pub String);

impl FromStr for Signal {
    type Err = ParseSignalError;

    /// Accepts `SIGTERM`, `TERM` and `term` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);

        Self::ALL
            .into_iter()
            .find(|signal| &signal.name()[3..] == bare)
            .ok_or_else(|| ParseSignalError(s.to_string()))
    }
}

impl TryFrom<String> for Signal {
    type Error = ParseSignalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signal> for String {
    fn from(signal: Signal) -> Self {
        signal.name().to_string()
    }
}
