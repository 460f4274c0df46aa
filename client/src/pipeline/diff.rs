//! Snapshot differencing.
//!
//! Pure functions: given the previous and current snapshot of one player or
//! of the match, return the events the change implies. No previous snapshot
//! means the subject was just seen for the first time, which is not a change.

use chrono::{DateTime, Utc};
use rcon_shared::event::{
    ClanTagChangeEvent, LoadoutChangeEvent, ObjectiveCaptureEvent, PositionChangeEvent,
    RoleChangeEvent, ScoreUpdateEvent, SquadSwitchEvent, TeamSwitchEvent,
};
use rcon_shared::{Event, GameState, PlayerInfo};

/// The score every match starts from; reaching it is not a capture.
///
/// Warfare matches open with each side holding two of the five sectors, so a
/// reset to 2–2 marks a new match rather than a capture. The live player
/// counts are not used: they say nothing about sector ownership and would
/// hide real captures whenever they happen to match the score.
pub const MATCH_START_SCORE: (u32, u32) = (2, 2);

pub fn diff_player(prev: Option<&PlayerInfo>, next: &PlayerInfo, now: DateTime<Utc>) -> Vec<Event> {
    let Some(prev) = prev else {
        return Vec::new();
    };

    let player = || next.name.clone();
    let player_id = || next.player_id.clone();
    let mut events = Vec::new();

    if prev.team != next.team {
        events.push(Event::TeamSwitch(TeamSwitchEvent {
            timestamp: now,
            player: player(),
            player_id: player_id(),
            old: prev.team,
            new: next.team,
        }));
    }

    if prev.unit != next.unit {
        events.push(Event::SquadSwitch(SquadSwitchEvent {
            timestamp: now,
            player: player(),
            player_id: player_id(),
            old: prev.unit.clone(),
            new: next.unit.clone(),
        }));
    }

    if prev.role != next.role {
        events.push(Event::RoleChange(RoleChangeEvent {
            timestamp: now,
            player: player(),
            player_id: player_id(),
            old: prev.role.clone(),
            new: next.role.clone(),
        }));
    }

    if prev.loadout != next.loadout {
        events.push(Event::LoadoutChange(LoadoutChangeEvent {
            timestamp: now,
            player: player(),
            player_id: player_id(),
            old: prev.loadout.clone(),
            new: next.loadout.clone(),
        }));
    }

    if prev.clan_tag != next.clan_tag {
        events.push(Event::ClanTagChange(ClanTagChangeEvent {
            timestamp: now,
            player: player(),
            player_id: player_id(),
            old: prev.clan_tag.clone(),
            new: next.clan_tag.clone(),
        }));
    }

    let delta = next.score.delta_since(&prev.score);
    if !delta.is_zero() {
        events.push(Event::ScoreUpdate(ScoreUpdateEvent {
            timestamp: now,
            player: player(),
            player_id: player_id(),
            delta,
            total: next.score,
        }));
    }

    // Spawning and dying move a player to or from the origin; only moves
    // between two live positions count.
    if prev.position.is_active() && next.position.is_active() && prev.position != next.position {
        events.push(Event::PositionChange(PositionChangeEvent {
            timestamp: now,
            player: player(),
            player_id: player_id(),
            old: prev.position,
            new: next.position,
        }));
    }

    events
}

pub fn diff_game_state(prev: Option<&GameState>, next: &GameState, now: DateTime<Utc>) -> Vec<Event> {
    let Some(prev) = prev else {
        return Vec::new();
    };

    if prev.score() == next.score() || next.score() == MATCH_START_SCORE {
        return Vec::new();
    }

    vec![Event::ObjectiveCapture(ObjectiveCaptureEvent {
        timestamp: now,
        old_allied_score: prev.allied_score,
        old_axis_score: prev.axis_score,
        allied_score: next.allied_score,
        axis_score: next.axis_score,
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rcon_shared::{EventKind, Position, Score, Team};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn soldier() -> PlayerInfo {
        let mut player = PlayerInfo::new("Alpha", "76561198000000001");
        player.team = Team::Allies;
        player.unit = Some("Able".to_string());
        player.role = "Rifleman".to_string();
        player.loadout = "Standard Issue".to_string();
        player.score = Score {
            combat: 10,
            offense: 20,
            defense: 0,
            support: 5,
        };
        player.position = Position::new(100.0, 200.0, 0.5);
        player
    }

    fn kinds(events: &[Event]) -> Vec<EventKind> {
        events.iter().map(Event::kind).collect()
    }

    #[test]
    fn test_first_sighting_emits_nothing() {
        assert!(diff_player(None, &soldier(), now()).is_empty());
        assert!(diff_game_state(None, &GameState::default(), now()).is_empty());
    }

    #[test]
    fn test_unchanged_player_emits_nothing() {
        let player = soldier();
        assert!(diff_player(Some(&player), &player.clone(), now()).is_empty());
    }

    #[test]
    fn test_one_event_per_changed_field() {
        let prev = soldier();
        let mut next = soldier();
        next.team = Team::Axis;
        next.unit = None;
        next.role = "Medic".to_string();
        next.loadout = "Veteran".to_string();
        next.clan_tag = "[ABC]".to_string();

        let events = diff_player(Some(&prev), &next, now());
        assert_eq!(
            kinds(&events),
            vec![
                EventKind::TeamSwitch,
                EventKind::SquadSwitch,
                EventKind::RoleChange,
                EventKind::LoadoutChange,
                EventKind::ClanTagChange
            ]
        );
        let Event::TeamSwitch(switch) = &events[0] else {
            panic!("expected team switch");
        };
        assert_eq!((switch.old, switch.new), (Team::Allies, Team::Axis));
        assert_eq!(switch.timestamp, now());
    }

    #[test]
    fn test_score_update_uses_clamped_delta() {
        let prev = soldier();
        let mut next = soldier();
        next.score.combat = 25;
        next.score.support = 0; // decreased: clamps to zero

        let events = diff_player(Some(&prev), &next, now());
        let Event::ScoreUpdate(update) = &events[0] else {
            panic!("expected score update");
        };
        assert_eq!(
            update.delta,
            Score {
                combat: 15,
                offense: 0,
                defense: 0,
                support: 0
            }
        );
        assert_eq!(update.total, next.score);

        // Only decreases: nothing to report.
        let mut lower = soldier();
        lower.score.offense = 5;
        assert!(diff_player(Some(&prev), &lower, now()).is_empty());
    }

    #[test]
    fn test_position_change_needs_two_live_positions() {
        let prev = soldier();
        let mut moved = soldier();
        moved.position = Position::new(150.0, 210.0, 0.5);

        let events = diff_player(Some(&prev), &moved, now());
        let Event::PositionChange(change) = &events[0] else {
            panic!("expected position change");
        };
        assert_approx_eq!(change.old.x, 100.0);
        assert_approx_eq!(change.new.x, 150.0);
        assert_approx_eq!(change.new.y, 210.0);

        let mut dead = soldier();
        dead.position = Position::default();
        assert!(diff_player(Some(&prev), &dead, now()).is_empty());
        assert!(diff_player(Some(&dead), &prev, now()).is_empty());
    }

    #[test]
    fn test_objective_capture() {
        let prev = GameState {
            allied_score: 2,
            axis_score: 3,
            ..Default::default()
        };
        let next = GameState {
            allied_score: 3,
            axis_score: 2,
            ..Default::default()
        };
        let events = diff_game_state(Some(&prev), &next, now());
        let Event::ObjectiveCapture(capture) = &events[0] else {
            panic!("expected objective capture");
        };
        assert_eq!((capture.old_allied_score, capture.old_axis_score), (2, 3));
        assert_eq!((capture.allied_score, capture.axis_score), (3, 2));

        // A new match resetting to the starting split is not a capture.
        let reset = GameState {
            allied_score: 2,
            axis_score: 2,
            ..Default::default()
        };
        assert!(diff_game_state(Some(&next), &reset, now()).is_empty());
        assert!(diff_game_state(Some(&next), &next.clone(), now()).is_empty());

        // Player counts that happen to equal the new score do not hide it.
        let crowded = GameState {
            allied_players: 4,
            axis_players: 1,
            allied_score: 4,
            axis_score: 1,
            ..Default::default()
        };
        assert_eq!(diff_game_state(Some(&next), &crowded, now()).len(), 1);
    }
}
