//! Error taxonomy for the RCON client.

use rcon_shared::{FrameError, Generation};
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RconError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("server rejected the RCON password")]
    Auth,

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("server returned status {code}: {message}")]
    Protocol { code: i32, message: String },

    #[error("server refused `{command}`: {reply}")]
    Rejected { command: String, reply: String },

    #[error("malformed wire data: {0}")]
    Frame(#[from] FrameError),

    #[error("invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not parse {what}: {input:?}")]
    Parse { what: &'static str, input: String },

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("socket {0} deadline exceeded")]
    SocketTimeout(&'static str),

    #[error("`{command}` is not supported by protocol {generation}")]
    NotSupported {
        command: &'static str,
        generation: Generation,
    },

    #[error("client is shut down")]
    Closed,
}

impl RconError {
    pub fn parse(what: &'static str, input: impl Into<String>) -> Self {
        RconError::Parse {
            what,
            input: input.into(),
        }
    }

    /// True for failures of the connection itself, which a reconnect may
    /// cure. Command-level refusals are answered by a healthy connection and
    /// are not worth a reconnect.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RconError::Connect { .. }
                | RconError::Handshake(_)
                | RconError::ConnectionClosed
                | RconError::Io(_)
                | RconError::Frame(_)
                | RconError::Json(_)
                | RconError::SocketTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(RconError::ConnectionClosed.is_transport());
        assert!(RconError::SocketTimeout("read").is_transport());
        assert!(RconError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_transport());

        assert!(!RconError::Auth.is_transport());
        assert!(!RconError::Timeout(Duration::from_secs(30)).is_transport());
        assert!(!RconError::Protocol {
            code: 400,
            message: "Bad Request".to_string()
        }
        .is_transport());
        assert!(!RconError::NotSupported {
            command: "slots",
            generation: Generation::V2
        }
        .is_transport());
    }

    #[test]
    fn test_messages() {
        let err = RconError::Protocol {
            code: 404,
            message: "Unknown command".to_string(),
        };
        assert_eq!(err.to_string(), "server returned status 404: Unknown command");
        assert_eq!(
            RconError::NotSupported {
                command: "slots",
                generation: Generation::V2
            }
            .to_string(),
            "`slots` is not supported by protocol v2"
        );
    }
}
