use chrono::{DateTime, Utc};
use log::{debug, warn};
use rcon_shared::{Event, GameState, PlayerInfo};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::diff::{diff_game_state, diff_player};
use super::parser::LogParser;
use crate::config::LogPollSettings;
use crate::rcon::WeakClient;

/// Fetches the admin log on a fixed interval and forwards parsed events.
pub struct LogPoller {
    client: WeakClient,
    settings: LogPollSettings,
    parser: LogParser,
    events: mpsc::Sender<Event>,
}

impl LogPoller {
    pub(crate) fn new(client: WeakClient, settings: LogPollSettings, events: mpsc::Sender<Event>) -> Self {
        Self {
            client,
            settings,
            parser: LogParser::new(),
            events,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        debug!("Log poller started, every {:?}", self.settings.interval);
        loop {
            let Some(client) = self.client.upgrade() else {
                break;
            };
            let fetched = tokio::select! {
                _ = shutdown.cancelled() => break,
                fetched = client.fetch_log(self.settings.window) => fetched,
            };
            drop(client);

            match fetched {
                Ok(log) => {
                    for event in self.parser.poll(log.lines()) {
                        if self.events.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => warn!("Log poll failed: {}", e),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
        debug!("Log poller stopped");
    }
}

/// Polls the roster and match state, diffing each against the last
/// snapshot it saw.
pub struct SnapshotPoller {
    client: WeakClient,
    interval: Duration,
    snapshots: SnapshotCache,
    events: mpsc::Sender<Event>,
}

impl SnapshotPoller {
    pub(crate) fn new(client: WeakClient, interval: Duration, events: mpsc::Sender<Event>) -> Self {
        Self {
            client,
            interval,
            snapshots: SnapshotCache::default(),
            events,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        debug!("Snapshot poller started, every {:?}", self.interval);
        loop {
            let delivered = tokio::select! {
                _ = shutdown.cancelled() => break,
                delivered = self.poll_once() => delivered,
            };
            if !delivered {
                return;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Snapshot poller stopped");
    }

    /// False once the event queue or the client is gone.
    async fn poll_once(&mut self) -> bool {
        let Some(client) = self.client.upgrade() else {
            return false;
        };
        let mut events = Vec::new();

        match client.detailed_players().await {
            Ok(roster) => events.extend(self.snapshots.apply_roster(roster, Utc::now())),
            Err(e) => warn!("Roster poll failed: {}", e),
        }
        match client.game_state().await {
            Ok(state) => events.extend(self.snapshots.apply_game_state(state, Utc::now())),
            Err(e) => warn!("Game state poll failed: {}", e),
        }
        drop(client);

        for event in events {
            if self.events.send(event).await.is_err() {
                return false;
            }
        }
        true
    }
}

/// Last roster and match state seen by the snapshot poller.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    players: HashMap<String, PlayerInfo>,
    game_state: Option<GameState>,
}

impl SnapshotCache {
    /// Diffs `roster` against the cached snapshots, then replaces them.
    /// Players missing from `roster` are forgotten.
    pub fn apply_roster(&mut self, roster: Vec<PlayerInfo>, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        let mut present = HashSet::new();

        for player in roster {
            let key = snapshot_key(&player);
            events.extend(diff_player(self.players.get(&key), &player, now));
            present.insert(key.clone());
            self.players.insert(key, player);
        }
        self.players.retain(|key, _| present.contains(key));
        events
    }

    pub fn apply_game_state(&mut self, state: GameState, now: DateTime<Utc>) -> Vec<Event> {
        let events = diff_game_state(self.game_state.as_ref(), &state, now);
        self.game_state = Some(state);
        events
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

/// Players are tracked by id; the name stands in when a server omits it.
fn snapshot_key(player: &PlayerInfo) -> String {
    if player.player_id.is_empty() {
        player.name.clone()
    } else {
        player.player_id.clone()
    }
}
