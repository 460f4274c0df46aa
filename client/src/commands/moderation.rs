use rcon_shared::{Generation, ResponseFormat};
use serde::Serialize;

use super::{not_supported, Ack, Command, Request};
use crate::error::RconError;

/// Generation 1 identifies players by name, generation 2 by id; callers pass
/// whichever their server speaks.
#[derive(Debug, Clone)]
pub struct Kick {
    pub player: String,
    pub reason: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PlayerReason<'a> {
    player_id: &'a str,
    reason: &'a str,
}

impl Request for Kick {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("kick", &[&self.player, &self.reason])),
            Generation::V2 => Command::json(
                "KickPlayer",
                &PlayerReason {
                    player_id: &self.player,
                    reason: &self.reason,
                },
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Punish {
    pub player: String,
    pub reason: String,
}

impl Request for Punish {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("punish", &[&self.player, &self.reason])),
            Generation::V2 => Command::json(
                "PunishPlayer",
                &PlayerReason {
                    player_id: &self.player,
                    reason: &self.reason,
                },
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TempBan {
    pub player: String,
    pub hours: u32,
    pub reason: String,
    pub admin: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TempBanBody<'a> {
    player_id: &'a str,
    duration: u32,
    reason: &'a str,
    admin_name: &'a str,
}

impl Request for TempBan {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action(
                "tempban",
                &[
                    &self.player,
                    &self.hours.to_string(),
                    &self.reason,
                    &self.admin,
                ],
            )),
            Generation::V2 => Command::json(
                "TemporaryBanPlayer",
                &TempBanBody {
                    player_id: &self.player,
                    duration: self.hours,
                    reason: &self.reason,
                    admin_name: &self.admin,
                },
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PermaBan {
    pub player: String,
    pub reason: String,
    pub admin: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PermaBanBody<'a> {
    player_id: &'a str,
    reason: &'a str,
    admin_name: &'a str,
}

impl Request for PermaBan {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action(
                "permaban",
                &[&self.player, &self.reason, &self.admin],
            )),
            Generation::V2 => Command::json(
                "PermanentBanPlayer",
                &PermaBanBody {
                    player_id: &self.player,
                    reason: &self.reason,
                    admin_name: &self.admin,
                },
            ),
        }
    }
}

/// Lifts a temporary ban. Generation 2 has no equivalent.
#[derive(Debug, Clone)]
pub struct RemoveTempBan {
    pub ban_entry: String,
}

impl Request for RemoveTempBan {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("pardontempban", &[&self.ban_entry])),
            Generation::V2 => Err(not_supported("remove_temp_ban", generation)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessagePlayer {
    pub player: String,
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MessageBody<'a> {
    player_id: &'a str,
    message: &'a str,
}

impl Request for MessagePlayer {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("message", &[&self.player, &self.message])),
            Generation::V2 => Command::json(
                "MessagePlayer",
                &MessageBody {
                    player_id: &self.player,
                    message: &self.message,
                },
            ),
        }
    }
}

/// Sets the server-wide broadcast banner.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct BroadcastBody<'a> {
    message: &'a str,
}

impl Request for Broadcast {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("say", &[&self.message])),
            Generation::V2 => Command::json(
                "ServerBroadcast",
                &BroadcastBody {
                    message: &self.message,
                },
            ),
        }
    }
}

/// Generation 1 quotes arguments that contain spaces.
pub(super) fn action(verb: &str, args: &[&str]) -> Command {
    let body = args
        .iter()
        .map(|arg| {
            if arg.contains(' ') {
                format!("\"{}\"", arg)
            } else {
                arg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Command::new(verb, body, ResponseFormat::Direct)
}
