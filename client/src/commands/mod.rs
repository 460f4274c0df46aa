//! Typed requests and responses.
//!
//! A `Request` knows how to phrase itself for each protocol generation; its
//! `Response` knows how to decode the reply payload and whether it may be
//! cached. Requests a generation cannot express return
//! `RconError::NotSupported` instead of guessing at a wire form.

mod logs;
mod maps;
mod moderation;
mod players;
mod server;

pub use logs::{LogText, ShowLog};
pub use maps::{
    AddToRotation, CurrentMap, MapName, RemoveFromRotation, Rotation, RotationQuery, SwitchMap,
};
pub use moderation::{Broadcast, Kick, MessagePlayer, PermaBan, Punish, RemoveTempBan, TempBan};
pub use players::{
    DetailedPlayers, GameStateQuery, PlayerIds, PlayerIdsQuery, PlayerInfoQuery, PlayerNames,
    PlayerNamesQuery, RosterQuery,
};
pub use server::{
    ServerName, ServerNameQuery, SetAutobalance, SetIdleKick, SetMaxQueuedPlayers, SlotsQuery,
};

use rcon_shared::{legacy, GameState, Generation, PlayerInfo, ResponseFormat, Slots};
use serde::Serialize;
use std::time::Duration;

use crate::error::RconError;

/// One wire command: the unit of work a worker executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub body: String,
    pub format: ResponseFormat,
}

impl Command {
    pub fn new(name: impl Into<String>, body: impl Into<String>, format: ResponseFormat) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            format,
        }
    }

    /// A generation 1 command line with no arguments.
    pub fn legacy(name: impl Into<String>, format: ResponseFormat) -> Self {
        Self::new(name, "", format)
    }

    /// A generation 2 command whose `ContentBody` is `body` as JSON.
    pub fn json<T: Serialize>(name: &str, body: &T) -> Result<Self, RconError> {
        Ok(Self::new(
            name,
            serde_json::to_string(body)?,
            ResponseFormat::Direct,
        ))
    }

    /// The generation 1 line sent on the wire.
    pub fn line(&self) -> String {
        if self.body.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.body)
        }
    }

    /// Canonical cache key: name and body separated by a tab.
    pub fn cache_key(&self) -> String {
        format!("{}\t{}", self.name, self.body)
    }
}

pub trait Request {
    type Response: Response;

    fn command(&self, generation: Generation) -> Result<Command, RconError>;
}

pub trait Response: Sized + Clone + Send + Sync + 'static {
    /// How long a decoded value may be served from the cache. Zero disables
    /// caching for the type.
    const CACHE_TTL: Duration = Duration::ZERO;

    fn decode(payload: String, generation: Generation) -> Result<Self, RconError>;
}

/// Raw text: the payload verbatim.
impl Response for String {
    fn decode(payload: String, _generation: Generation) -> Result<Self, RconError> {
        Ok(payload)
    }
}

/// Acknowledgement of an administrative action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

impl Response for Ack {
    fn decode(payload: String, generation: Generation) -> Result<Self, RconError> {
        match generation {
            // Generation 2 reports failures through the status code.
            Generation::V2 => Ok(Ack),
            Generation::V1 => legacy::ack(&payload).map(|_| Ack).map_err(|reply| {
                RconError::Rejected {
                    command: "action".to_string(),
                    reply,
                }
            }),
        }
    }
}

impl Response for PlayerInfo {
    fn decode(payload: String, generation: Generation) -> Result<Self, RconError> {
        Ok(match generation {
            Generation::V1 => PlayerInfo::from_legacy_text(&payload)?,
            Generation::V2 => PlayerInfo::from_json(&payload)?,
        })
    }
}

impl Response for GameState {
    fn decode(payload: String, generation: Generation) -> Result<Self, RconError> {
        Ok(match generation {
            Generation::V1 => GameState::from_legacy_text(&payload)?,
            Generation::V2 => GameState::from_json(&payload)?,
        })
    }
}

impl Response for Slots {
    const CACHE_TTL: Duration = Duration::from_secs(5);

    fn decode(payload: String, _generation: Generation) -> Result<Self, RconError> {
        Ok(Slots::from_legacy_text(&payload)?)
    }
}

/// Generation 2 `GetServerInformation` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InformationQuery<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

pub(crate) const GET_SERVER_INFORMATION: &str = "GetServerInformation";

pub(crate) fn information(name: &str, value: &str) -> Result<Command, RconError> {
    Command::json(GET_SERVER_INFORMATION, &InformationQuery { name, value })
}

pub(crate) fn not_supported(command: &'static str, generation: Generation) -> RconError {
    RconError::NotSupported {
        command,
        generation,
    }
}
