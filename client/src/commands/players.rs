use rcon_shared::{legacy, GameState, Generation, PlayerInfo, PlayerRef, ResponseFormat};
use std::time::Duration;

use super::{information, not_supported, Command, Request, Response};
use crate::error::RconError;

/// Names of everyone on the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerNamesQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerNames(pub Vec<String>);

impl Request for PlayerNamesQuery {
    type Response = PlayerNames;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(Command::legacy("get players", ResponseFormat::IndexedList)),
            Generation::V2 => information("players", ""),
        }
    }
}

impl Response for PlayerNames {
    fn decode(payload: String, generation: Generation) -> Result<Self, RconError> {
        let names = match generation {
            Generation::V1 => legacy::parse_indexed_list(&payload)?,
            Generation::V2 => PlayerInfo::list_from_json(&payload)?
                .into_iter()
                .map(|p| p.name)
                .collect(),
        };
        Ok(PlayerNames(names))
    }
}

/// Name and id pairs. Generation 2 folds ids into the roster instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerIdsQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIds(pub Vec<PlayerRef>);

impl Request for PlayerIdsQuery {
    type Response = PlayerIds;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(Command::legacy("get playerids", ResponseFormat::IndexedList)),
            Generation::V2 => Err(not_supported("player_ids", generation)),
        }
    }
}

impl Response for PlayerIds {
    const CACHE_TTL: Duration = Duration::from_secs(2);

    fn decode(payload: String, _generation: Generation) -> Result<Self, RconError> {
        let players = legacy::parse_indexed_list(&payload)?
            .iter()
            .map(|entry| PlayerRef::from_legacy_entry(entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PlayerIds(players))
    }
}

/// Details for one player, by name (generation 1) or id (generation 2).
#[derive(Debug, Clone)]
pub struct PlayerInfoQuery {
    pub player: String,
}

impl PlayerInfoQuery {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
        }
    }
}

impl Request for PlayerInfoQuery {
    type Response = PlayerInfo;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(Command::new(
                "playerinfo",
                self.player.as_str(),
                ResponseFormat::Direct,
            )),
            Generation::V2 => information("player", &self.player),
        }
    }
}

/// The full roster in one round trip. Generation 1 has no such command; the
/// client composes it from `get players` and `playerinfo` instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct RosterQuery;

#[derive(Debug, Clone, PartialEq)]
pub struct DetailedPlayers(pub Vec<PlayerInfo>);

impl Request for RosterQuery {
    type Response = DetailedPlayers;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Err(not_supported("roster", generation)),
            Generation::V2 => information("players", ""),
        }
    }
}

impl Response for DetailedPlayers {
    fn decode(payload: String, _generation: Generation) -> Result<Self, RconError> {
        Ok(DetailedPlayers(PlayerInfo::list_from_json(&payload)?))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GameStateQuery;

impl Request for GameStateQuery {
    type Response = GameState;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(Command::legacy("get gamestate", ResponseFormat::Direct)),
            Generation::V2 => information("session", ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_names_both_generations() {
        let v1 = PlayerNames::decode("2\tAlpha\tBravo\t".to_string(), Generation::V1).unwrap();
        assert_eq!(v1.0, vec!["Alpha", "Bravo"]);

        let v2 = PlayerNames::decode(
            r#"{"players":[{"name":"Alpha","iD":"1"},{"name":"Bravo","iD":"2"}]}"#.to_string(),
            Generation::V2,
        )
        .unwrap();
        assert_eq!(v2.0, vec!["Alpha", "Bravo"]);
    }

    #[test]
    fn test_player_ids_decode_and_support() {
        let ids = PlayerIds::decode(
            "2\tAlpha : 7656001\tBravo : 7656002\t".to_string(),
            Generation::V1,
        )
        .unwrap();
        assert_eq!(ids.0[1].player_id, "7656002");

        assert!(matches!(
            PlayerIdsQuery.command(Generation::V2),
            Err(RconError::NotSupported { .. })
        ));
        assert!(PlayerIds::CACHE_TTL > Duration::ZERO);
    }

    #[test]
    fn test_player_info_command() {
        let query = PlayerInfoQuery::new("Scrubby");
        assert_eq!(query.command(Generation::V1).unwrap().line(), "playerinfo Scrubby");
        let v2 = query.command(Generation::V2).unwrap();
        assert_eq!(v2.body, r#"{"Name":"player","Value":"Scrubby"}"#);
    }

    #[test]
    fn test_roster_is_generation_two_only() {
        assert!(RosterQuery.command(Generation::V1).is_err());
        assert!(RosterQuery.command(Generation::V2).is_ok());
    }
}
