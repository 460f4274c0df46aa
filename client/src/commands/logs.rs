use rcon_shared::{legacy, Generation, ResponseFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Command, Request, Response};
use crate::error::RconError;

/// Admin log lines from the last `window`.
///
/// Generation 1 counts the window in whole minutes, so anything shorter is
/// rounded up to one minute.
#[derive(Debug, Clone, Copy)]
pub struct ShowLog {
    pub window: Duration,
}

impl ShowLog {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    fn minutes(&self) -> u64 {
        self.window.as_secs().div_ceil(60).max(1)
    }
}

/// Log text with one `[<age> (<epoch>)] <payload>` entry per line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogText(pub String);

impl LogText {
    /// Non-blank lines; the `EMPTY` sentinel has none.
    pub fn lines(&self) -> Vec<&str> {
        legacy::split_unindexed(&self.0)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AdminLogBody<'a> {
    log_back_track_time: u64,
    filters: &'a str,
}

#[derive(Deserialize)]
struct WireAdminLog {
    #[serde(default)]
    entries: Vec<WireLogEntry>,
}

#[derive(Deserialize)]
struct WireLogEntry {
    message: String,
}

impl Request for ShowLog {
    type Response = LogText;

    fn command(&self, generation: Generation) -> Result<Command, RconError> {
        match generation {
            Generation::V1 => Ok(Command::new(
                "showlog",
                self.minutes().to_string(),
                ResponseFormat::UnindexedList,
            )),
            Generation::V2 => Command::json(
                "GetAdminLog",
                &AdminLogBody {
                    log_back_track_time: self.window.as_secs().max(1),
                    filters: "",
                },
            ),
        }
    }
}

impl Response for LogText {
    fn decode(payload: String, generation: Generation) -> Result<Self, RconError> {
        match generation {
            Generation::V1 => Ok(LogText(payload)),
            Generation::V2 => {
                let wire: WireAdminLog = serde_json::from_str(&payload)?;
                let joined = wire
                    .entries
                    .into_iter()
                    .map(|entry| entry.message)
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(LogText(joined))
            }
        }
    }
}
