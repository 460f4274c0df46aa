//! # RCON Shared Protocol Library
//!
//! Wire formats and data model shared by the RCON client and the mock game
//! server. Nothing in this crate performs I/O; it only encodes, decodes and
//! describes what travels over the socket.
//!
//! ## Protocol generations
//!
//! ### Generation 1 (`legacy`)
//! XOR-enciphered ASCII. The server sends a 4-byte key right after accepting
//! the socket. Replies are sentinels (`SUCCESS`, `FAIL`, `EMPTY`), direct
//! values, tab-delimited indexed lists with a leading count, or unindexed
//! newline-delimited text with no declared length.
//!
//! ### Generation 2 (`frame`)
//! Binary frames with an 8-byte header (request id, little-endian payload
//! length) carrying a JSON envelope. A `ServerConnect` exchange hands out a
//! base64 session key, `Login` hands out an auth token echoed on every
//! later request.
//!
//! Both generations encipher payloads with the same cycling XOR stream
//! (`cipher`).
//!
//! ## Data model
//! - `snapshot`: player roster and game state snapshots, decodable from
//!   either generation
//! - `event`: typed events derived from logs and snapshot diffs

pub mod cipher;
pub mod error;
pub mod event;
pub mod frame;
pub mod legacy;
pub mod snapshot;

pub use cipher::{xor_cipher, xor_copy};
pub use error::FrameError;
pub use event::{Event, EventKind, PlayerTag, TypedEvent};
pub use legacy::ResponseFormat;
pub use snapshot::{GameState, PlayerInfo, PlayerRef, Position, Score, Slots, Team};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 7779;

/// Protocol generation spoken on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Generation {
    #[default]
    V1,
    V2,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::V1 => f.write_str("v1"),
            Generation::V2 => f.write_str("v2"),
        }
    }
}

impl FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(Generation::V1),
            "2" | "v2" => Ok(Generation::V2),
            other => Err(format!("unknown protocol generation: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_parse() {
        assert_eq!("v1".parse::<Generation>().unwrap(), Generation::V1);
        assert_eq!("2".parse::<Generation>().unwrap(), Generation::V2);
        assert_eq!("V2".parse::<Generation>().unwrap(), Generation::V2);
        assert!("v3".parse::<Generation>().is_err());
        assert_eq!(Generation::V2.to_string(), "v2");
    }
}
