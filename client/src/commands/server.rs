use rcon_shared::{Generation, ResponseFormat, Slots};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::moderation::action;
use super::{information, not_supported, Ack, Command, Request, Response};
use crate::error::RconError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ServerNameQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerName(pub String);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireServerConfig {
    server_name: String,
}

impl Request for ServerNameQuery {
    type Response = ServerName;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(Command::legacy("get name", ResponseFormat::Direct)),
            Generation::V2 => information("serverconfig", ""),
        }
    }
}

impl Response for ServerName {
    const CACHE_TTL: Duration = Duration::from_secs(60);

    fn decode(payload: String, generation: Generation) -> Result<Self, RconError> {
        match generation {
            Generation::V1 => Ok(ServerName(payload.trim().to_string())),
            Generation::V2 => {
                let wire: WireServerConfig = serde_json::from_str(&payload)?;
                Ok(ServerName(wire.server_name))
            }
        }
    }
}

/// Used and maximum player slots. Generation 1 only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotsQuery;

impl Request for SlotsQuery {
    type Response = Slots;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(Command::legacy("get slots", ResponseFormat::Direct)),
            Generation::V2 => Err(not_supported("slots", generation)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetAutobalance {
    pub enabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AutoBalanceBody {
    enable_auto_balance: bool,
}

impl Request for SetAutobalance {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action(
                "setautobalanceenabled",
                &[if self.enabled { "on" } else { "off" }],
            )),
            Generation::V2 => Command::json(
                "SetAutoBalance",
                &AutoBalanceBody {
                    enable_auto_balance: self.enabled,
                },
            ),
        }
    }
}

/// Idle kick threshold in minutes; zero disables idle kicks.
#[derive(Debug, Clone, Copy)]
pub struct SetIdleKick {
    pub minutes: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct IdleKickBody {
    idle_timeout_minutes: u32,
}

impl Request for SetIdleKick {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("setkickidletime", &[&self.minutes.to_string()])),
            Generation::V2 => Command::json(
                "SetIdleKickDuration",
                &IdleKickBody {
                    idle_timeout_minutes: self.minutes,
                },
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetMaxQueuedPlayers {
    pub count: u32,
}

impl Request for SetMaxQueuedPlayers {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("setmaxqueuedplayers", &[&self.count.to_string()])),
            Generation::V2 => Err(not_supported("set_max_queued_players", generation)),
        }
    }
}
