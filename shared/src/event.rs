//! Typed server events.
//!
//! Log-native events are parsed from admin log lines; diff-derived events are
//! synthesised by comparing successive roster or game state snapshots. Every
//! variant carries its timestamp, and `Event::kind` gives the type tag used
//! for scoped subscriptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::{Position, Score, Team};

/// Implemented by every event payload so callers can subscribe to one kind
/// with a strongly typed callback.
pub trait TypedEvent: Sized {
    const KIND: EventKind;

    fn from_event(event: &Event) -> Option<&Self>;
}

macro_rules! events {
    ($($variant:ident($payload:ident) => $tag:literal,)+) => {
        /// A server event. Serialises as `{"type": "<tag>", ...fields}`.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum Event {
            $(
                #[serde(rename = $tag)]
                $variant($payload),
            )+
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum EventKind {
            $($variant,)+
        }

        impl EventKind {
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(EventKind::$variant => $tag,)+
                }
            }
        }

        impl Event {
            pub fn kind(&self) -> EventKind {
                match self {
                    $(Event::$variant(_) => EventKind::$variant,)+
                }
            }

            pub fn timestamp(&self) -> DateTime<Utc> {
                match self {
                    $(Event::$variant(e) => e.timestamp,)+
                }
            }
        }

        $(
            impl From<$payload> for Event {
                fn from(event: $payload) -> Self {
                    Event::$variant(event)
                }
            }

            impl TypedEvent for $payload {
                const KIND: EventKind = EventKind::$variant;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(e) => Some(e),
                        _ => None,
                    }
                }
            }
        )+
    };
}

events! {
    Connected(ConnectedEvent) => "connected",
    Disconnected(DisconnectedEvent) => "disconnected",
    Kill(KillEvent) => "kill",
    Death(DeathEvent) => "death",
    TeamKill(TeamKillEvent) => "team_kill",
    TeamDeath(TeamDeathEvent) => "team_death",
    Chat(ChatEvent) => "chat",
    Ban(BanEvent) => "ban",
    Kick(KickEvent) => "kick",
    Message(MessageEvent) => "message",
    MatchStart(MatchStartEvent) => "match_start",
    MatchEnd(MatchEndEvent) => "match_end",
    AdminCamEntered(AdminCamEnteredEvent) => "admin_cam_entered",
    AdminCamLeft(AdminCamLeftEvent) => "admin_cam_left",
    VoteStarted(VoteStartedEvent) => "vote_started",
    VoteSubmitted(VoteSubmittedEvent) => "vote_submitted",
    VoteCompleted(VoteCompletedEvent) => "vote_completed",
    Unparsed(UnparsedEvent) => "unparsed",
    TeamSwitch(TeamSwitchEvent) => "team_switch",
    SquadSwitch(SquadSwitchEvent) => "squad_switch",
    RoleChange(RoleChangeEvent) => "role_change",
    LoadoutChange(LoadoutChangeEvent) => "loadout_change",
    ScoreUpdate(ScoreUpdateEvent) => "score_update",
    PositionChange(PositionChangeEvent) => "position_change",
    ClanTagChange(ClanTagChangeEvent) => "clan_tag_change",
    ObjectiveCapture(ObjectiveCaptureEvent) => "objective_capture",
}

impl EventKind {
    /// True for events synthesised from snapshot diffs rather than log lines.
    pub fn is_diff_derived(self) -> bool {
        matches!(
            self,
            EventKind::TeamSwitch
                | EventKind::SquadSwitch
                | EventKind::RoleChange
                | EventKind::LoadoutChange
                | EventKind::ScoreUpdate
                | EventKind::PositionChange
                | EventKind::ClanTagChange
                | EventKind::ObjectiveCapture
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player as identified inside a log line, e.g. `Name(Axis/7656...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTag {
    pub name: String,
    pub player_id: String,
    pub team: Team,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectedEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillEvent {
    pub timestamp: DateTime<Utc>,
    pub killer: PlayerTag,
    pub victim: PlayerTag,
    pub weapon: String,
}

/// The victim's side of a kill, emitted together with `KillEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathEvent {
    pub timestamp: DateTime<Utc>,
    pub victim: PlayerTag,
    pub killer: PlayerTag,
    pub weapon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamKillEvent {
    pub timestamp: DateTime<Utc>,
    pub killer: PlayerTag,
    pub victim: PlayerTag,
    pub weapon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDeathEvent {
    pub timestamp: DateTime<Utc>,
    pub victim: PlayerTag,
    pub killer: PlayerTag,
    pub weapon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatScope {
    Team,
    Unit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub timestamp: DateTime<Utc>,
    pub scope: ChatScope,
    pub player: PlayerTag,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub reason: String,
}

/// An admin message delivered to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStartEvent {
    pub timestamp: DateTime<Utc>,
    pub map: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEndEvent {
    pub timestamp: DateTime<Utc>,
    pub map: String,
    pub allied_score: u32,
    pub axis_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCamEnteredEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCamLeftEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStartedEvent {
    pub timestamp: DateTime<Utc>,
    pub vote_id: u32,
    pub initiator: String,
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSubmittedEvent {
    pub timestamp: DateTime<Utc>,
    pub vote_id: u32,
    pub voter: String,
    pub vote: String,
}

/// Completion of a vote, carrying the details of the vote that opened it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCompletedEvent {
    pub timestamp: DateTime<Utc>,
    pub vote_id: u32,
    pub initiator: String,
    pub target: String,
    pub reason: String,
    pub result: String,
}

/// A log line whose timestamp header could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnparsedEvent {
    pub timestamp: DateTime<Utc>,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSwitchEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
    pub old: Team,
    pub new: Team,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadSwitchEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChangeEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadoutChangeEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanTagChangeEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
    pub old: String,
    pub new: String,
}

/// Non-negative per-category score growth since the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdateEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
    pub delta: Score,
    pub total: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionChangeEvent {
    pub timestamp: DateTime<Utc>,
    pub player: String,
    pub player_id: String,
    pub old: Position,
    pub new: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveCaptureEvent {
    pub timestamp: DateTime<Utc>,
    pub old_allied_score: u32,
    pub old_axis_score: u32,
    pub allied_score: u32,
    pub axis_score: u32,
}
