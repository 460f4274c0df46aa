use rcon_shared::{legacy, GameState, Generation, ResponseFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::moderation::action;
use super::{information, Ack, Command, Request, Response};
use crate::error::RconError;

#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentMap;

/// Name of the map being played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapName(pub String);

impl Request for CurrentMap {
    type Response = MapName;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(Command::legacy("get map", ResponseFormat::Direct)),
            Generation::V2 => information("session", ""),
        }
    }
}

impl Response for MapName {
    fn decode(payload: String, generation: Generation) -> Result<Self, RconError> {
        match generation {
            Generation::V1 => Ok(MapName(payload.trim().to_string())),
            Generation::V2 => Ok(MapName(GameState::from_json(&payload)?.map)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RotationQuery;

/// Maps in rotation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation(pub Vec<String>);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRotation {
    #[serde(default)]
    maps: Vec<WireMap>,
}

#[derive(Deserialize)]
struct WireMap {
    #[serde(alias = "iD", alias = "id")]
    name: String,
}

impl Request for RotationQuery {
    type Response = Rotation;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(Command::legacy(
                "get mapsforrotation",
                ResponseFormat::IndexedList,
            )),
            Generation::V2 => information("maprotation", ""),
        }
    }
}

impl Response for Rotation {
    const CACHE_TTL: Duration = Duration::from_secs(10);

    fn decode(payload: String, generation: Generation) -> Result<Self, RconError> {
        Ok(match generation {
            Generation::V1 => Rotation(legacy::parse_indexed_list(&payload)?),
            Generation::V2 => {
                let wire: WireRotation = serde_json::from_str(&payload)?;
                Rotation(wire.maps.into_iter().map(|m| m.name).collect())
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct AddToRotation {
    pub map: String,
    /// Position in the rotation; generation 1 always appends.
    pub index: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AddMapBody<'a> {
    map_name: &'a str,
    index: u32,
}

impl Request for AddToRotation {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("rotadd", &[&self.map])),
            Generation::V2 => Command::json(
                "AddMapToRotation",
                &AddMapBody {
                    map_name: &self.map,
                    index: self.index,
                },
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoveFromRotation {
    pub map: String,
    pub index: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RemoveMapBody {
    index: u32,
}

impl Request for RemoveFromRotation {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("rotdel", &[&self.map])),
            Generation::V2 => Command::json(
                "RemoveMapFromRotation",
                &RemoveMapBody { index: self.index },
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchMap {
    pub map: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeMapBody<'a> {
    map_name: &'a str,
}

impl Request for SwitchMap {
    type Response = Ack;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(action("map", &[&self.map])),
            Generation::V2 => Command::json("ChangeMap", &ChangeMapBody { map_name: &self.map }),
        }
    }
}
