//! Event derivation: log parsing, snapshot diffs and the pollers that feed
//! them.

pub mod diff;
pub mod parser;
pub mod poller;

pub use diff::{diff_game_state, diff_player};
pub use parser::{LogParser, VoteTable};
pub use poller::{LogPoller, SnapshotCache, SnapshotPoller};
