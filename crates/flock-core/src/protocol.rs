//! Master/worker wire protocol.
//!
//! One JSON object per line, tagged by `act`:
//!
//! ```text
//! master -> worker   {"act":"shutdown"}
//! worker -> master   {"act":"online"}
//!                    {"act":"listening","address":"127.0.0.1:4000"}
//!                    {"act":"shutdown_ack"}
//! ```
//!
//! Lines that do not parse as a message are ordinary worker output.

use serde::{Deserialize, Serialize};

/// Environment variable that tells a process it is a worker.
pub const ROLE_ENV: &str = "FLOCK_ROLE";

/// Value of [`ROLE_ENV`] for workers.
pub const WORKER_ROLE: &str = "worker";

/// Environment variable carrying the worker's id.
pub const WORKER_ID_ENV: &str = "FLOCK_WORKER_ID";

/// A message exchanged between master and worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "act", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Master asks the worker to shut down gracefully.
    Shutdown,
    /// Worker confirms it received `Shutdown` and is draining.
    ShutdownAck,
    /// Worker finished starting up.
    Online,
    /// Worker bound a socket.
    Listening { address: String },
}

impl ControlMessage {
    /// Encode as a single newline-terminated line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one line. `None` for anything that is not a protocol message.
    pub fn parse_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            return None;
        }
        serde_json::from_str(trimmed).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_wire_format() {
        let line = ControlMessage::Shutdown.to_line().unwrap();
        assert_eq!(line, "{\"act\":\"shutdown\"}\n");
    }

    #[test]
    fn listening_carries_address() {
        let msg = ControlMessage::parse_line(r#"{"act":"listening","address":"127.0.0.1:9"}"#);
        assert_eq!(
            msg,
            Some(ControlMessage::Listening {
                address: "127.0.0.1:9".to_string()
            })
        );
    }

    #[test]
    fn plain_output_is_not_a_message() {
        assert_eq!(ControlMessage::parse_line("hello from worker"), None);
        assert_eq!(ControlMessage::parse_line(r#"{"act":"dance"}"#), None);
        assert_eq!(ControlMessage::parse_line(""), None);
    }
}
