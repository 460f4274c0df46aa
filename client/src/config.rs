//! Connection settings and client tuning knobs.

use rcon_shared::{Generation, DEFAULT_PORT};
use std::fmt;
use std::time::Duration;

/// Where and how to log in. Shared read-only by every worker.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT, "")
    }
}

// Keeps the password out of logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Log poller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPollSettings {
    pub interval: Duration,
    /// How far back each fetch reaches. Should comfortably exceed `interval`.
    pub window: Duration,
}

impl Default for LogPollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub generation: Generation,
    /// Workers started at construction. The pool can be resized later.
    pub workers: usize,
    /// Overall deadline for one command, independent of socket deadlines.
    pub command_timeout: Duration,
    pub cache_enabled: bool,
    /// Run the log poller's fetches on one dedicated generation 1 worker that
    /// stops reading as soon as the log tail looks complete.
    pub fast_log_worker: bool,
    /// Generation 2 servers that still send the 4-byte generation 1 key on
    /// connect.
    pub legacy_preamble: bool,
    pub log_poll: Option<LogPollSettings>,
    pub snapshot_poll: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            generation: Generation::V1,
            workers: 4,
            command_timeout: Duration::from_secs(30),
            cache_enabled: true,
            fast_log_worker: false,
            legacy_preamble: false,
            log_poll: Some(LogPollSettings::default()),
            snapshot_poll: Some(Duration::from_secs(10)),
        }
    }
}

impl ClientOptions {
    pub fn with_generation(mut self, generation: Generation) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Commands only: neither poller runs.
    pub fn without_events(mut self) -> Self {
        self.log_poll = None;
        self.snapshot_poll = None;
        self
    }

    /// The fast log worker only exists for generation 1; generation 2 frames
    /// carry their own length.
    pub(crate) fn uses_fast_log_worker(&self) -> bool {
        self.fast_log_worker && self.generation == Generation::V1
    }
}
