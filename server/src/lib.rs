//! # RCON Mock Server Library
//!
//! A scriptable stand-in for a game server's remote console, speaking either
//! protocol generation. Integration tests run it in-process; the
//! `rcon-mock-server` binary serves it on a port for manual testing.
//!
//! ## Behaviour
//!
//! ### Generation 1
//! Sends a random 4-byte key on accept, expects `login <password>` and then
//! answers each enciphered command line from the script. `echo <text>`
//! answers with `<text>`; anything unscripted gets `FAIL`.
//!
//! ### Generation 2
//! Answers `ServerConnect` with a random base64 session key and `Login` with
//! a token. Every later frame must carry that token or gets status 401.
//! `Echo` returns its content body; unscripted names get status 400.
//!
//! ## Module Organization
//!
//! ### Client Manager (`client_manager`)
//! Session bookkeeping: accept and login counters, and severing every
//! connection on demand.
//!
//! ### Network (`network`)
//! The accept loop and both generations' session loops.
//!
//! ### Script (`script`)
//! Canned replies with optional delays and per-command hit counters.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rcon_server::{MockServer, MockSettings, Script};
//! use rcon_shared::Generation;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = MockSettings::new(Generation::V1, "secret");
//!     let server = MockServer::bind("127.0.0.1:0", settings, Script::demo()).await?;
//!     let handle = server.spawn()?;
//!
//!     handle.script("get name", "Test Server");
//!     // ... point a client at handle.addr() ...
//!     assert_eq!(handle.hits("get name"), 0);
//!     handle.shutdown();
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod network;
pub mod script;

pub use network::{MockHandle, MockServer, MockSettings};
pub use script::{Reply, Script};
