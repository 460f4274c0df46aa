//! Player roster and game state snapshots.
//!
//! Snapshots are what the state poller diffs. Each type decodes from both
//! protocol generations: the generation 1 `Key: value` text layout and the
//! generation 2 JSON `ContentBody`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Team {
    Allies,
    Axis,
    #[default]
    None,
}

impl Team {
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "allies" | "allied" => Team::Allies,
            "axis" => Team::Axis,
            _ => Team::None,
        }
    }

    /// Numeric team codes used by generation 2.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Team::Allies,
            1 => Team::Axis,
            _ => Team::None,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Team::Allies => "Allies",
            Team::Axis => "Axis",
            Team::None => "None",
        };
        f.write_str(name)
    }
}

/// Per-category player score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub combat: u32,
    pub offense: u32,
    pub defense: u32,
    pub support: u32,
}

impl Score {
    /// Growth of each category since `older`, clamped at zero.
    pub fn delta_since(&self, older: &Score) -> Score {
        Score {
            combat: self.combat.saturating_sub(older.combat),
            offense: self.offense.saturating_sub(older.offense),
            defense: self.defense.saturating_sub(older.defense),
            support: self.support.saturating_sub(older.support),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Score::default()
    }
}

/// World position. All-zero means the player is not spawned.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_active(&self) -> bool {
        self.x != 0.0 || self.y != 0.0 || self.z != 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub player_id: String,
    pub team: Team,
    pub unit: Option<String>,
    pub role: String,
    pub loadout: String,
    pub clan_tag: String,
    pub level: u32,
    pub kills: u32,
    pub deaths: u32,
    pub score: Score,
    pub position: Position,
}

impl PlayerInfo {
    pub fn new(name: &str, player_id: &str) -> Self {
        Self {
            name: name.to_string(),
            player_id: player_id.to_string(),
            ..Default::default()
        }
    }

    /// Parses the generation 1 `playerinfo` reply.
    pub fn from_legacy_text(text: &str) -> Result<Self, FrameError> {
        let mut player = PlayerInfo::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Name" => player.name = value.to_string(),
                "steamID64" | "ID" => player.player_id = value.to_string(),
                "Team" => player.team = Team::parse(value),
                "Role" => player.role = value.to_string(),
                "Loadout" => player.loadout = value.to_string(),
                "Unit" => {
                    // "<id> - <name>"
                    player.unit = value
                        .split_once(" - ")
                        .map(|(_, name)| name.trim().to_string())
                        .filter(|name| !name.is_empty());
                }
                "Kills" => {
                    // "<kills> - Deaths: <deaths>"
                    let (kills, deaths) = value
                        .split_once(" - Deaths:")
                        .ok_or_else(|| FrameError::malformed("kills line", line))?;
                    player.kills = parse_number(kills, line)?;
                    player.deaths = parse_number(deaths, line)?;
                }
                "Score" => player.score = parse_legacy_score(value)?,
                "Level" => player.level = parse_number(value, line)?,
                _ => {}
            }
        }

        if player.name.is_empty() {
            return Err(FrameError::malformed("player info", text));
        }
        Ok(player)
    }

    pub fn from_json(content: &str) -> Result<Self, FrameError> {
        let wire: WirePlayer = serde_json::from_str(content)?;
        Ok(wire.into())
    }

    /// Parses the generation 2 roster, `{"players": [...]}`.
    pub fn list_from_json(content: &str) -> Result<Vec<Self>, FrameError> {
        let roster: WireRoster = serde_json::from_str(content)?;
        Ok(roster.players.into_iter().map(PlayerInfo::from).collect())
    }
}

/// "C 50, O 20, D 40, S 10"
fn parse_legacy_score(value: &str) -> Result<Score, FrameError> {
    let mut score = Score::default();
    for part in value.split(',') {
        let part = part.trim();
        let Some((category, points)) = part.split_once(' ') else {
            return Err(FrameError::malformed("score", value));
        };
        let points = parse_number(points, value)?;
        match category {
            "C" => score.combat = points,
            "O" => score.offense = points,
            "D" => score.defense = points,
            "S" => score.support = points,
            _ => return Err(FrameError::malformed("score", value)),
        }
    }
    Ok(score)
}

fn parse_number<T: std::str::FromStr>(text: &str, context: &str) -> Result<T, FrameError> {
    text.trim()
        .parse()
        .map_err(|_| FrameError::malformed("number", context))
}

#[derive(Debug, Deserialize)]
struct WireRoster {
    #[serde(default)]
    players: Vec<WirePlayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePlayer {
    name: String,
    #[serde(rename = "iD", default)]
    id: String,
    #[serde(default)]
    clan_tag: String,
    #[serde(default)]
    team: serde_json::Value,
    #[serde(default)]
    role: serde_json::Value,
    #[serde(default)]
    platoon: String,
    #[serde(default)]
    loadout: String,
    #[serde(default)]
    level: u32,
    #[serde(default)]
    kills: u32,
    #[serde(default)]
    deaths: u32,
    #[serde(default)]
    score_data: WireScore,
    #[serde(default)]
    world_position: Position,
}

#[derive(Debug, Default, Deserialize)]
struct WireScore {
    #[serde(rename = "cOMBAT", alias = "combat", default)]
    combat: u32,
    #[serde(default)]
    offense: u32,
    #[serde(default)]
    defense: u32,
    #[serde(default)]
    support: u32,
}

impl From<WirePlayer> for PlayerInfo {
    fn from(wire: WirePlayer) -> Self {
        let team = match &wire.team {
            serde_json::Value::Number(n) => Team::from_code(n.as_i64().unwrap_or(-1)),
            serde_json::Value::String(s) => Team::parse(s),
            _ => Team::None,
        };
        PlayerInfo {
            name: wire.name,
            player_id: wire.id,
            team,
            unit: Some(wire.platoon).filter(|p| !p.is_empty()),
            role: value_text(&wire.role),
            loadout: wire.loadout,
            clan_tag: wire.clan_tag,
            level: wire.level,
            kills: wire.kills,
            deaths: wire.deaths,
            score: Score {
                combat: wire.score_data.combat,
                offense: wire.score_data.offense,
                defense: wire.score_data.defense,
                support: wire.score_data.support,
            },
            position: wire.world_position,
        }
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One `name : id` pair from the generation 1 `get playerids` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub name: String,
    pub player_id: String,
}

impl PlayerRef {
    pub fn from_legacy_entry(entry: &str) -> Result<Self, FrameError> {
        // Names may themselves contain " : ", the id never does.
        let (name, id) = entry
            .rsplit_once(" : ")
            .ok_or_else(|| FrameError::malformed("player id entry", entry))?;
        Ok(PlayerRef {
            name: name.to_string(),
            player_id: id.trim().to_string(),
        })
    }
}

/// Aggregate match state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameState {
    pub allied_players: u32,
    pub axis_players: u32,
    pub allied_score: u32,
    pub axis_score: u32,
    pub remaining_seconds: u64,
    pub map: String,
    pub next_map: String,
}

impl GameState {
    pub fn score(&self) -> (u32, u32) {
        (self.allied_score, self.axis_score)
    }

    /// Parses the generation 1 `get gamestate` reply.
    pub fn from_legacy_text(text: &str) -> Result<Self, FrameError> {
        let mut state = GameState::default();
        let mut seen_score = false;

        for line in text.lines() {
            let Some((key, value)) = line.split_once(": ") else {
                continue;
            };
            match key.trim() {
                "Players" => {
                    (state.allied_players, state.axis_players) = parse_sides(value)?;
                }
                "Score" => {
                    (state.allied_score, state.axis_score) = parse_sides(value)?;
                    seen_score = true;
                }
                "Remaining Time" => state.remaining_seconds = parse_clock(value)?,
                "Map" => state.map = value.trim().to_string(),
                "Next Map" => state.next_map = value.trim().to_string(),
                _ => {}
            }
        }

        if !seen_score {
            return Err(FrameError::malformed("game state", text));
        }
        Ok(state)
    }

    pub fn from_json(content: &str) -> Result<Self, FrameError> {
        let wire: WireSession = serde_json::from_str(content)?;
        Ok(GameState {
            allied_players: wire.allied_player_count,
            axis_players: wire.axis_player_count,
            allied_score: wire.allied_score,
            axis_score: wire.axis_score,
            remaining_seconds: wire.remaining_match_time,
            map: wire.map_name,
            next_map: wire.next_map_name,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSession {
    #[serde(default)]
    map_name: String,
    #[serde(default)]
    next_map_name: String,
    #[serde(default)]
    remaining_match_time: u64,
    #[serde(default)]
    allied_score: u32,
    #[serde(default)]
    axis_score: u32,
    #[serde(default)]
    allied_player_count: u32,
    #[serde(default)]
    axis_player_count: u32,
}

/// "Allied: 2 - Axis: 3"
fn parse_sides(value: &str) -> Result<(u32, u32), FrameError> {
    let (allied, axis) = value
        .split_once(" - ")
        .ok_or_else(|| FrameError::malformed("team split", value))?;
    let allied = allied
        .trim()
        .strip_prefix("Allied:")
        .ok_or_else(|| FrameError::malformed("team split", value))?;
    let axis = axis
        .trim()
        .strip_prefix("Axis:")
        .ok_or_else(|| FrameError::malformed("team split", value))?;
    Ok((parse_number(allied, value)?, parse_number(axis, value)?))
}

/// "h:mm:ss" to seconds.
fn parse_clock(value: &str) -> Result<u64, FrameError> {
    value.trim().split(':').try_fold(0u64, |acc, part| {
        let part: u64 = parse_number(part, value)?;
        Ok(acc * 60 + part)
    })
}

/// Occupied and maximum player slots, "12/100".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    pub used: u32,
    pub max: u32,
}

impl Slots {
    pub fn from_legacy_text(text: &str) -> Result<Self, FrameError> {
        let (used, max) = text
            .trim()
            .split_once('/')
            .ok_or_else(|| FrameError::malformed("slots", text))?;
        Ok(Slots {
            used: parse_number(used, text)?,
            max: parse_number(max, text)?,
        })
    }
}
