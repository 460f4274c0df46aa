//! Scripted replies and per-command hit counters.

use std::collections::HashMap;
use std::time::Duration;

/// A canned reply, optionally held back to simulate a slow server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(body: impl Into<String>, delay: Duration) -> Self {
        Self {
            body: body.into(),
            delay,
        }
    }
}

/// Replies keyed by command.
///
/// Generation 1 commands are keyed by their full line (`get players`,
/// `showlog 1`). Generation 2 commands are keyed by `Name`, or by
/// `Name\tContentBody` when the body matters.
#[derive(Debug, Default)]
pub struct Script {
    replies: HashMap<String, Reply>,
    hits: HashMap<String, usize>,
}

impl Script {
    pub fn set(&mut self, key: impl Into<String>, reply: Reply) {
        self.replies.insert(key.into(), reply);
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.replies.remove(key).is_some()
    }

    /// Counts a received command under `key` and returns the reply for the
    /// first candidate key that has one.
    pub fn lookup(&mut self, key: &str, fallbacks: &[&str]) -> Option<Reply> {
        *self.hits.entry(key.to_string()).or_insert(0) += 1;

        std::iter::once(key)
            .chain(fallbacks.iter().copied())
            .find_map(|candidate| self.replies.get(candidate).cloned())
    }

    pub fn hits(&self, key: &str) -> usize {
        self.hits.get(key).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.values().sum()
    }

    /// Replies for a small, plausible generation 1 server.
    pub fn demo() -> Self {
        let mut script = Script::default();
        let entries = [
            ("get name", "Mock Server #1"),
            ("get map", "stmereeglise_warfare"),
            ("get slots", "2/100"),
            ("get players", "2\tAlpha\tBravo\t"),
            (
                "get playerids",
                "2\tAlpha : 76561198000000001\tBravo : 76561198000000002\t",
            ),
            (
                "get mapsforrotation",
                "2\tstmereeglise_warfare\tfoy_warfare\t",
            ),
            (
                "get gamestate",
                "Players: Allied: 1 - Axis: 1\nScore: Allied: 2 - Axis: 2\nRemaining Time: 1:20:00\nMap: stmereeglise_warfare\nNext Map: foy_warfare",
            ),
            (
                "playerinfo Alpha",
                "Name: Alpha\nsteamID64: 76561198000000001\nTeam: Allies\nRole: Rifleman\nUnit: 0 - ABLE\nLoadout: Standard Issue\nKills: 3 - Deaths: 1\nScore: C 10, O 20, D 0, S 5\nLevel: 42",
            ),
            (
                "playerinfo Bravo",
                "Name: Bravo\nsteamID64: 76561198000000002\nTeam: Axis\nRole: Medic\nUnit: 1 - BAKER\nLoadout: Standard Issue\nKills: 1 - Deaths: 3\nScore: C 5, O 0, D 15, S 30\nLevel: 7",
            ),
            ("showlog 1", "EMPTY"),
        ];
        for (key, body) in entries {
            script.set(key, Reply::new(body));
        }
        script
    }
}
