//! Admin log parsing.
//!
//! Every log line looks like `[<age> (<epoch>)] <payload>`. The age is
//! relative to when the log was fetched and changes between polls, so
//! deduplication keys on the epoch and the payload only.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use once_cell::sync::Lazy;
use rcon_shared::event::{
    AdminCamEnteredEvent, AdminCamLeftEvent, BanEvent, ChatEvent, ChatScope, ConnectedEvent,
    DeathEvent, DisconnectedEvent, KickEvent, KillEvent, MatchEndEvent, MatchStartEvent,
    MessageEvent, TeamDeathEvent, TeamKillEvent, UnparsedEvent, VoteCompletedEvent,
    VoteStartedEvent, VoteSubmittedEvent,
};
use rcon_shared::{legacy, Event, PlayerTag, Team};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashSet};

/// Open votes beyond this are evicted oldest id first.
pub const MAX_OPEN_VOTES: usize = 256;

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(.+?) \((\d+)\)\] (.*)$").expect("log header regex"));

static KILL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)\((Allies|Axis|None)/([^)]*)\) -> (.+)\((Allies|Axis|None)/([^)]*)\) with (.+)$")
        .expect("kill regex")
});

static CONNECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+) \(([^()]*)\)$").expect("connection regex"));

static CHAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Team|Unit)\]\[(.+)\((Allies|Axis|None)/([^)]*)\)\]: (.*)$").expect("chat regex")
});

static SANCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(.+)\] has been (banned|kicked)\. \[(.*)\]$").expect("sanction regex")
});

static MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^player \[(.+)\(([^()]*)\)\], content \[(.*)\]$").expect("message regex")
});

static MATCH_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^`(.+)` ALLIED \((\d+) - (\d+)\) AXIS$").expect("match end regex")
});

static ADMIN_CAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+) \(([^()]*)\)\] (Entered|Left) Admin Camera$").expect("admin cam regex")
});

static VOTE_STARTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Player \[(.+)\] Started a vote of type \((.+)\) against \[(.+)\]\. VoteID: \[(\d+)\]$")
        .expect("vote started regex")
});

static VOTE_SUBMITTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Player \[(.+)\] voted \[(.+)\] for VoteID\[(\d+)\]$").expect("vote submitted regex")
});

static VOTE_COMPLETED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Vote \[(\d+)\] completed\. Result: (.+)$").expect("vote completed regex")
});

static VOTE_EXPIRED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Vote \[(\d+)\] expired").expect("vote expired regex"));

/// Result of classifying one payload.
enum Parsed {
    Events(Vec<Event>),
    /// No known prefix.
    Unknown,
    /// Known prefix, body did not match.
    Malformed(&'static str),
}

/// Votes started but not yet completed, keyed by vote id.
#[derive(Debug, Default)]
pub struct VoteTable {
    open: BTreeMap<u32, VoteStartedEvent>,
}

impl VoteTable {
    pub fn open(&mut self, vote: VoteStartedEvent) {
        self.open.insert(vote.vote_id, vote);
        while self.open.len() > MAX_OPEN_VOTES {
            self.open.pop_first();
        }
    }

    pub fn close(&mut self, vote_id: u32) -> Option<VoteStartedEvent> {
        self.open.remove(&vote_id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Stateful parser for successive, overlapping log fetches.
#[derive(Debug, Default)]
pub struct LogParser {
    primed: bool,
    last_epoch: Option<i64>,
    seen_at_last_epoch: HashSet<String>,
    /// Headerless lines from the previous poll, so an overlapping window does
    /// not report them twice.
    previous_unparsed: HashSet<String>,
    votes: VoteTable,
}

impl LogParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one fetch, oldest line first. The first fetch only records
    /// what has already happened and returns nothing.
    pub fn poll<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) -> Vec<Event> {
        let mut events = Vec::new();
        let mut unparsed = HashSet::new();

        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_line(line) {
                Some(parsed) => events.extend(parsed),
                None => {
                    let first_sighting = unparsed.insert(line.to_string())
                        && !self.previous_unparsed.contains(line);
                    if first_sighting {
                        events.push(unparsed_event(line));
                    }
                }
            }
        }
        self.previous_unparsed = unparsed;

        if !self.primed {
            self.primed = true;
            debug!("Primed log parser, suppressed {} events", events.len());
            return Vec::new();
        }
        events
    }

    pub fn open_votes(&self) -> usize {
        self.votes.len()
    }

    /// `None` for a line without a valid header; otherwise the events the
    /// line yields, which is empty for duplicates and unknown payloads.
    fn parse_line(&mut self, line: &str) -> Option<Vec<Event>> {
        let caps = HEADER.captures(line)?;
        let epoch: i64 = caps[2].parse().ok()?;
        let timestamp = DateTime::from_timestamp(epoch, 0)?;
        let payload = &caps[3];

        if !self.is_new(epoch, payload) {
            return Some(Vec::new());
        }

        match self.parse_payload(timestamp, payload) {
            Parsed::Events(events) => Some(events),
            Parsed::Unknown => Some(Vec::new()),
            Parsed::Malformed(kind) => {
                warn!("Dropping malformed {} line: {}", kind, payload);
                Some(Vec::new())
            }
        }
    }

    fn is_new(&mut self, epoch: i64, payload: &str) -> bool {
        match self.last_epoch {
            Some(last) if epoch < last => false,
            Some(last) if epoch == last => self.seen_at_last_epoch.insert(payload.to_string()),
            _ => {
                self.last_epoch = Some(epoch);
                self.seen_at_last_epoch.clear();
                self.seen_at_last_epoch.insert(payload.to_string());
                true
            }
        }
    }

    fn parse_payload(&mut self, timestamp: DateTime<Utc>, payload: &str) -> Parsed {
        if let Some(body) = payload.strip_prefix("TEAM KILL: ") {
            return parse_kill(timestamp, body, true);
        }
        if let Some(body) = payload.strip_prefix("KILL: ") {
            return parse_kill(timestamp, body, false);
        }
        if let Some(body) = payload.strip_prefix("CONNECTED ") {
            return parse_connection(timestamp, body, true);
        }
        if let Some(body) = payload.strip_prefix("DISCONNECTED ") {
            return parse_connection(timestamp, body, false);
        }
        if let Some(body) = payload.strip_prefix("CHAT[") {
            return parse_chat(timestamp, body);
        }
        if payload.starts_with("BAN: ") || payload.starts_with("KICK: ") {
            return parse_sanction(timestamp, payload);
        }
        if let Some(body) = payload.strip_prefix("MESSAGE: ") {
            return parse_message(timestamp, body);
        }
        if let Some(map) = payload.strip_prefix("MATCH START ") {
            return Parsed::Events(vec![Event::MatchStart(MatchStartEvent {
                timestamp,
                map: map.trim().to_string(),
            })]);
        }
        if let Some(body) = payload.strip_prefix("MATCH ENDED ") {
            return parse_match_end(timestamp, body);
        }
        if let Some(body) = payload.strip_prefix("Player [") {
            return parse_admin_cam(timestamp, body);
        }
        if let Some(body) = payload.strip_prefix("VOTESYS: ") {
            return self.parse_vote(timestamp, body);
        }
        Parsed::Unknown
    }

    fn parse_vote(&mut self, timestamp: DateTime<Utc>, body: &str) -> Parsed {
        if let Some(caps) = VOTE_STARTED.captures(body) {
            let Some(vote_id) = number(&caps, 4) else {
                return Parsed::Malformed("vote");
            };
            let started = VoteStartedEvent {
                timestamp,
                vote_id,
                initiator: caps[1].to_string(),
                target: caps[3].to_string(),
                reason: caps[2].to_string(),
            };
            self.votes.open(started.clone());
            return Parsed::Events(vec![Event::VoteStarted(started)]);
        }

        if let Some(caps) = VOTE_SUBMITTED.captures(body) {
            let Some(vote_id) = number(&caps, 3) else {
                return Parsed::Malformed("vote");
            };
            return Parsed::Events(vec![Event::VoteSubmitted(VoteSubmittedEvent {
                timestamp,
                vote_id,
                voter: caps[1].to_string(),
                vote: caps[2].to_string(),
            })]);
        }

        if let Some(caps) = VOTE_COMPLETED.captures(body) {
            let Some(vote_id) = number(&caps, 1) else {
                return Parsed::Malformed("vote");
            };
            let Some(started) = self.votes.close(vote_id) else {
                debug!("Completion for unknown vote {}", vote_id);
                return Parsed::Events(Vec::new());
            };
            return Parsed::Events(vec![Event::VoteCompleted(VoteCompletedEvent {
                timestamp,
                vote_id,
                initiator: started.initiator,
                target: started.target,
                reason: started.reason,
                result: caps[2].trim().to_string(),
            })]);
        }

        if let Some(caps) = VOTE_EXPIRED.captures(body) {
            if let Some(vote_id) = number(&caps, 1) {
                self.votes.close(vote_id);
            }
            return Parsed::Events(Vec::new());
        }

        // Other vote system chatter carries nothing we track.
        Parsed::Events(Vec::new())
    }
}

fn unparsed_event(line: &str) -> Event {
    Event::Unparsed(UnparsedEvent {
        timestamp: Utc::now(),
        line: line.to_string(),
    })
}

fn number(caps: &Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

fn tag(name: &str, team: &str, player_id: &str) -> PlayerTag {
    PlayerTag {
        name: name.to_string(),
        player_id: player_id.to_string(),
        team: Team::parse(team),
    }
}

fn parse_kill(timestamp: DateTime<Utc>, body: &str, team_kill: bool) -> Parsed {
    let Some(caps) = KILL.captures(body) else {
        return Parsed::Malformed(if team_kill { "team kill" } else { "kill" });
    };
    let killer = tag(&caps[1], &caps[2], &caps[3]);
    let victim = tag(&caps[4], &caps[5], &caps[6]);
    let weapon = caps[7].to_string();

    let events = if team_kill {
        vec![
            Event::TeamKill(TeamKillEvent {
                timestamp,
                killer: killer.clone(),
                victim: victim.clone(),
                weapon: weapon.clone(),
            }),
            Event::TeamDeath(TeamDeathEvent {
                timestamp,
                victim,
                killer,
                weapon,
            }),
        ]
    } else {
        vec![
            Event::Kill(KillEvent {
                timestamp,
                killer: killer.clone(),
                victim: victim.clone(),
                weapon: weapon.clone(),
            }),
            Event::Death(DeathEvent {
                timestamp,
                victim,
                killer,
                weapon,
            }),
        ]
    };
    Parsed::Events(events)
}

fn parse_connection(timestamp: DateTime<Utc>, body: &str, connected: bool) -> Parsed {
    let Some(caps) = CONNECTION.captures(body) else {
        return Parsed::Malformed("connection");
    };
    let player = caps[1].to_string();
    let player_id = caps[2].to_string();
    let event = if connected {
        Event::Connected(ConnectedEvent {
            timestamp,
            player,
            player_id,
        })
    } else {
        Event::Disconnected(DisconnectedEvent {
            timestamp,
            player,
            player_id,
        })
    };
    Parsed::Events(vec![event])
}

fn parse_chat(timestamp: DateTime<Utc>, body: &str) -> Parsed {
    let Some(caps) = CHAT.captures(body) else {
        return Parsed::Malformed("chat");
    };
    let scope = if &caps[1] == "Unit" {
        ChatScope::Unit
    } else {
        ChatScope::Team
    };
    Parsed::Events(vec![Event::Chat(ChatEvent {
        timestamp,
        scope,
        player: tag(&caps[2], &caps[3], &caps[4]),
        message: legacy::unescape_entry(&caps[5]),
    })])
}

fn parse_sanction(timestamp: DateTime<Utc>, payload: &str) -> Parsed {
    let body = payload
        .strip_prefix("BAN: ")
        .or_else(|| payload.strip_prefix("KICK: "))
        .unwrap_or(payload);
    let Some(caps) = SANCTION.captures(body) else {
        return Parsed::Malformed("sanction");
    };
    let player = caps[1].to_string();
    let reason = legacy::unescape_entry(&caps[3]);
    let event = if &caps[2] == "banned" {
        Event::Ban(BanEvent {
            timestamp,
            player,
            reason,
        })
    } else {
        Event::Kick(KickEvent {
            timestamp,
            player,
            reason,
        })
    };
    Parsed::Events(vec![event])
}

fn parse_message(timestamp: DateTime<Utc>, body: &str) -> Parsed {
    let Some(caps) = MESSAGE.captures(body) else {
        return Parsed::Malformed("message");
    };
    Parsed::Events(vec![Event::Message(MessageEvent {
        timestamp,
        player: caps[1].to_string(),
        player_id: caps[2].to_string(),
        message: legacy::unescape_entry(&caps[3]),
    })])
}

fn parse_match_end(timestamp: DateTime<Utc>, body: &str) -> Parsed {
    let Some(caps) = MATCH_END.captures(body) else {
        return Parsed::Malformed("match end");
    };
    let (Some(allied_score), Some(axis_score)) = (number(&caps, 2), number(&caps, 3)) else {
        return Parsed::Malformed("match end");
    };
    Parsed::Events(vec![Event::MatchEnd(MatchEndEvent {
        timestamp,
        map: caps[1].to_string(),
        allied_score,
        axis_score,
    })])
}

fn parse_admin_cam(timestamp: DateTime<Utc>, body: &str) -> Parsed {
    let Some(caps) = ADMIN_CAM.captures(body) else {
        return Parsed::Malformed("admin camera");
    };
    let player = caps[1].to_string();
    let player_id = caps[2].to_string();
    let event = if &caps[3] == "Entered" {
        Event::AdminCamEntered(AdminCamEnteredEvent {
            timestamp,
            player,
            player_id,
        })
    } else {
        Event::AdminCamLeft(AdminCamLeftEvent {
            timestamp,
            player,
            player_id,
        })
    };
    Parsed::Events(vec![event])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_shared::EventKind;

    /// A parser whose first poll has already happened.
    fn primed() -> LogParser {
        let mut parser = LogParser::new();
        assert!(parser.poll(Vec::<&str>::new()).is_empty());
        parser
    }

    fn kinds(events: &[Event]) -> Vec<EventKind> {
        events.iter().map(Event::kind).collect()
    }

    #[test]
    fn test_kill_line_yields_kill_and_death() {
        let mut parser = primed();
        let events = parser.poll([
            "[1:02 min (1639143555)] KILL: Alpha(Axis/76561198000000001) -> Bravo(Allies/76561198000000002) with MP40",
        ]);
        assert_eq!(kinds(&events), vec![EventKind::Kill, EventKind::Death]);

        let Event::Kill(kill) = &events[0] else {
            panic!("expected kill");
        };
        assert_eq!(kill.killer.name, "Alpha");
        assert_eq!(kill.killer.team, Team::Axis);
        assert_eq!(kill.victim.player_id, "76561198000000002");
        assert_eq!(kill.weapon, "MP40");
        assert_eq!(kill.timestamp.timestamp(), 1639143555);

        let Event::Death(death) = &events[1] else {
            panic!("expected death");
        };
        assert_eq!(death.victim, kill.victim);
        assert_eq!(death.weapon, kill.weapon);
        assert_eq!(death.timestamp, kill.timestamp);
    }

    #[test]
    fn test_team_kill_and_names_with_parentheses() {
        let mut parser = primed();
        let events = parser.poll([
            "[3 sec (1639143556)] TEAM KILL: [TAG] Al (pha)(Allies/1) -> Bravo(Allies/2) with M1 GARAND",
        ]);
        assert_eq!(kinds(&events), vec![EventKind::TeamKill, EventKind::TeamDeath]);
        let Event::TeamKill(kill) = &events[0] else {
            panic!("expected team kill");
        };
        assert_eq!(kill.killer.name, "[TAG] Al (pha)");
    }

    #[test]
    fn test_malformed_header_is_unparsed() {
        let mut parser = primed();
        let events = parser.poll(["garbage without a header"]);
        assert_eq!(kinds(&events), vec![EventKind::Unparsed]);
        // Same line in the next overlapping window is not repeated.
        assert!(parser.poll(["garbage without a header"]).is_empty());
    }

    #[test]
    fn test_unknown_prefix_is_dropped() {
        let mut parser = primed();
        assert!(parser
            .poll(["[1 sec (1639143555)] SOMETHING NEW happened"])
            .is_empty());
    }

    #[test]
    fn test_known_prefix_with_bad_body_is_dropped() {
        let mut parser = primed();
        assert!(parser
            .poll(["[1 sec (1639143555)] KILL: nobody killed anybody"])
            .is_empty());
    }

    #[test]
    fn test_first_poll_is_suppressed_and_overlap_deduplicated() {
        let mut parser = LogParser::new();
        let first = [
            "[10 sec (1639143550)] CONNECTED Alpha (1)",
            "[5 sec (1639143555)] CONNECTED Bravo (2)",
        ];
        assert!(parser.poll(first).is_empty());

        // Ages moved on; epochs and payloads did not.
        let second = [
            "[15 sec (1639143550)] CONNECTED Alpha (1)",
            "[10 sec (1639143555)] CONNECTED Bravo (2)",
            "[1 sec (1639143555)] CONNECTED Charlie (3)",
            "[0 sec (1639143560)] DISCONNECTED Alpha (1)",
        ];
        let events = parser.poll(second);
        assert_eq!(
            kinds(&events),
            vec![EventKind::Connected, EventKind::Disconnected]
        );
        let Event::Connected(connected) = &events[0] else {
            panic!("expected connected");
        };
        assert_eq!(connected.player, "Charlie");
        assert_eq!(connected.player_id, "3");
    }

    #[test]
    fn test_chat_sanctions_and_messages() {
        let mut parser = primed();
        let events = parser.poll([
            "[1 sec (1639143560)] CHAT[Unit][Alpha(Axis/1)]: push left\\nnow",
            "[1 sec (1639143561)] BAN: [Bravo] has been banned. [racism]",
            "[1 sec (1639143562)] KICK: [Charlie] has been kicked. [AFK]",
            "[1 sec (1639143563)] MESSAGE: player [Delta(4)], content [read the rules]",
        ]);
        assert_eq!(
            kinds(&events),
            vec![
                EventKind::Chat,
                EventKind::Ban,
                EventKind::Kick,
                EventKind::Message
            ]
        );
        let Event::Chat(chat) = &events[0] else {
            panic!("expected chat");
        };
        assert_eq!(chat.scope, ChatScope::Unit);
        assert_eq!(chat.message, "push left\nnow");
        let Event::Message(message) = &events[3] else {
            panic!("expected message");
        };
        assert_eq!(message.player, "Delta");
        assert_eq!(message.message, "read the rules");
    }

    #[test]
    fn test_match_and_admin_camera() {
        let mut parser = primed();
        let events = parser.poll([
            "[1 sec (1639143560)] MATCH START FOY WARFARE",
            "[1 sec (1639143561)] Player [Alpha (1)] Entered Admin Camera",
            "[1 sec (1639143562)] Player [Alpha (1)] Left Admin Camera",
            "[1 sec (1639143563)] MATCH ENDED `FOY WARFARE` ALLIED (2 - 3) AXIS",
        ]);
        assert_eq!(
            kinds(&events),
            vec![
                EventKind::MatchStart,
                EventKind::AdminCamEntered,
                EventKind::AdminCamLeft,
                EventKind::MatchEnd
            ]
        );
        let Event::MatchEnd(end) = &events[3] else {
            panic!("expected match end");
        };
        assert_eq!((end.allied_score, end.axis_score), (2, 3));
        assert_eq!(end.map, "FOY WARFARE");
    }

    #[test]
    fn test_vote_correlation() {
        let mut parser = primed();
        let events = parser.poll([
            "[1 sec (1639143560)] VOTESYS: Player [Alpha] Started a vote of type (PVR_Kick_Abuse) against [Bravo]. VoteID: [2]",
            "[1 sec (1639143561)] VOTESYS: Player [Charlie] voted [PV_Favour] for VoteID[2]",
            "[1 sec (1639143562)] VOTESYS: Vote [2] completed. Result: Passed",
            "[1 sec (1639143563)] VOTESYS: Vote [9] completed. Result: Passed",
        ]);
        assert_eq!(
            kinds(&events),
            vec![
                EventKind::VoteStarted,
                EventKind::VoteSubmitted,
                EventKind::VoteCompleted
            ]
        );
        let Event::VoteCompleted(done) = &events[2] else {
            panic!("expected vote completed");
        };
        assert_eq!(done.initiator, "Alpha");
        assert_eq!(done.target, "Bravo");
        assert_eq!(done.reason, "PVR_Kick_Abuse");
        assert_eq!(done.result, "Passed");
        assert_eq!(parser.open_votes(), 0);
    }

    #[test]
    fn test_vote_started_while_priming_still_correlates() {
        let mut parser = LogParser::new();
        parser.poll([
            "[1 sec (1639143560)] VOTESYS: Player [Alpha] Started a vote of type (PVR_Kick_Abuse) against [Bravo]. VoteID: [7]",
        ]);
        assert_eq!(parser.open_votes(), 1);

        let events = parser.poll([
            "[1 sec (1639143570)] VOTESYS: Vote [7] completed. Result: Failed",
        ]);
        assert_eq!(kinds(&events), vec![EventKind::VoteCompleted]);
    }

    #[test]
    fn test_expired_votes_and_table_cap() {
        let mut table = VoteTable::default();
        for id in 0..(MAX_OPEN_VOTES as u32 + 10) {
            table.open(VoteStartedEvent {
                timestamp: DateTime::from_timestamp(0, 0).unwrap(),
                vote_id: id,
                initiator: "A".to_string(),
                target: "B".to_string(),
                reason: "r".to_string(),
            });
        }
        assert_eq!(table.len(), MAX_OPEN_VOTES);
        assert!(table.close(0).is_none());
        assert!(table.close(MAX_OPEN_VOTES as u32 + 9).is_some());

        let mut parser = primed();
        parser.poll([
            "[1 sec (1639143560)] VOTESYS: Player [Alpha] Started a vote of type (PVR_Kick_Abuse) against [Bravo]. VoteID: [3]",
            "[1 sec (1639143600)] VOTESYS: Vote [3] expired before completion.",
        ]);
        assert_eq!(parser.open_votes(), 0);
    }
}
