//! # RCON Client Library
//!
//! Asynchronous remote-console client for game servers speaking either
//! protocol generation. It runs administrative commands over a pool of
//! persistent connections and turns the server's admin log and periodic
//! snapshots into a stream of typed events.
//!
//! ## Architecture Overview
//!
//! ### Command path
//! A typed [`Request`] becomes a wire [`Command`] for the connection's
//! protocol generation. The façade first checks the response cache and then
//! queues the command for the worker pool. One worker runs it on its own
//! connection. If the transport fails, the worker reconnects and retries
//! once, and the caller's deadline still bounds the whole exchange.
//!
//! ### Event path
//! A log poller fetches a sliding window of the admin log and parses new
//! lines into events. A snapshot poller diffs the roster and match state
//! against the previous poll. Both push into one bounded queue. A single
//! consumer drains it and fans each event out to subscribers.
//!
//! ## Module Organization
//!
//! ### Transport (`transport`)
//! - Handshake and authentication for both generations
//! - Generation 1 reply framing: sentinels, direct values, indexed lists
//!   and idle-terminated unindexed text
//! - Length-prefixed generation 2 frames
//!
//! ### Worker Pool (`pool`)
//! - Bounded job queue shared by all workers
//! - Runtime growth and shrinkage
//! - Optional dedicated log worker with early-stop reads
//!
//! ### Commands (`commands`)
//! Typed requests for players, moderation, maps, server settings and logs.
//!
//! ### Response Cache (`cache`)
//! Per-type TTLs with a background sweep.
//!
//! ### Pipeline (`pipeline`) and Notifier (`notifier`)
//! Log parsing, snapshot diffing, the pollers and subscriber dispatch.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rcon_client::{Client, ClientOptions, ServerConfig};
//! use rcon_client::event::KillEvent;
//!
//! # async fn run() -> Result<(), rcon_client::RconError> {
//! let config = ServerConfig::new("127.0.0.1", 7779, "secret");
//! let client = Client::connect(config, ClientOptions::default()).await?;
//!
//! client.on_kill(|kill: &KillEvent| {
//!     println!("{} killed {} with {}", kill.killer.name, kill.victim.name, kill.weapon);
//! });
//!
//! for name in client.player_names().await? {
//!     println!("{}", name);
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod notifier;
pub mod pipeline;
pub mod pool;
pub mod rcon;
pub mod transport;

pub use commands::{Command, Request, Response};
pub use config::{ClientOptions, LogPollSettings, ServerConfig};
pub use error::RconError;
pub use notifier::{Subscriber, SubscriberId};
pub use rcon::Client;
pub use transport::ReadMode;

pub use rcon_shared::event;
pub use rcon_shared::{
    Event, EventKind, GameState, Generation, PlayerInfo, PlayerRef, Position, ResponseFormat,
    Score, Slots, Team, DEFAULT_PORT,
};
