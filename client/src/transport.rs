//! One authenticated TCP session with the game server.
//!
//! A [`Connection`] owns its socket and key material exclusively; the worker
//! pool gives each worker its own. Every socket operation runs under its own
//! deadline so a silent server can never wedge a worker.

use log::{debug, info};
use once_cell::sync::Lazy;
use rcon_shared::frame::{
    self, FrameHeader, RequestEnvelope, ResponseEnvelope, HEADER_LEN, STATUS_UNAUTHORIZED,
};
use rcon_shared::{legacy, xor_cipher, Generation, ResponseFormat};
use regex::Regex;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::commands::Command;
use crate::config::ServerConfig;
use crate::error::RconError;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Idle window that ends an unindexed reply.
pub const READ_FAST: Duration = Duration::from_millis(300);
/// Wait for each continuation chunk of an indexed list.
pub const READ_NORMAL: Duration = Duration::from_secs(1);
/// Wait for the first chunk of any reply.
pub const READ_SLOW: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 32 * 1024;

/// How an unindexed reply is judged complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Wait for the idle window.
    #[default]
    Safe,
    /// Stop as soon as the text looks like a finished log. Only for the
    /// dedicated log worker: a reply that happens to end on a log header is
    /// cut short.
    FastUnsafe,
}

static LOG_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[[\d:.]+ (?:ms|sec|min|hours)\s*\(\d+\)\] ").expect("log tail regex")
});

/// True if `payload` is the `EMPTY` sentinel or ends with a newline after a
/// line that carries a complete log header.
pub fn log_tail_complete(payload: &str) -> bool {
    if payload.trim() == legacy::EMPTY {
        return true;
    }
    if !payload.ends_with('\n') {
        return false;
    }
    payload
        .trim_end_matches(|c| c == '\r' || c == '\n')
        .rsplit('\n')
        .next()
        .map(|last| LOG_TAIL.is_match(last))
        .unwrap_or(false)
}

struct Session {
    stream: TcpStream,
    key: Vec<u8>,
    auth_token: String,
    next_request_id: u32,
}

pub struct Connection {
    config: Arc<ServerConfig>,
    generation: Generation,
    legacy_preamble: bool,
    mode: ReadMode,
    session: Session,
}

impl Connection {
    /// Connects and authenticates.
    pub async fn open(
        config: Arc<ServerConfig>,
        generation: Generation,
        legacy_preamble: bool,
        mode: ReadMode,
    ) -> Result<Self, RconError> {
        let session = handshake(&config, generation, legacy_preamble).await?;
        Ok(Connection {
            config,
            generation,
            legacy_preamble,
            mode,
            session,
        })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Replaces the session with a freshly authenticated one. On failure the
    /// previous session is left in place.
    pub async fn reconnect(&mut self) -> Result<(), RconError> {
        let session = handshake(&self.config, self.generation, self.legacy_preamble).await?;
        self.session = session;
        info!("Reconnected to {}", self.config.addr());
        Ok(())
    }

    /// Sends `command` and returns the deciphered reply payload.
    pub async fn execute(&mut self, command: &Command) -> Result<String, RconError> {
        debug!("-> {} {}", command.name, command.body);
        let payload = match self.generation {
            Generation::V1 => self.session.execute_legacy(command, self.mode).await?,
            Generation::V2 => self.session.execute_framed(command).await?,
        };
        debug!("<- {} ({} bytes)", command.name, payload.len());
        Ok(payload)
    }
}

async fn handshake(
    config: &ServerConfig,
    generation: Generation,
    legacy_preamble: bool,
) -> Result<Session, RconError> {
    let addr = config.addr();
    let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
        Err(_) => return Err(RconError::SocketTimeout("connect")),
        Ok(Err(source)) => return Err(RconError::Connect { addr, source }),
        Ok(Ok(stream)) => stream,
    };
    stream.set_nodelay(true)?;

    let mut session = Session {
        stream,
        key: Vec::new(),
        auth_token: String::new(),
        next_request_id: 1,
    };

    match generation {
        Generation::V1 => {
            session.key = session.read_exact(legacy::KEY_LEN, READ_SLOW).await?;
            let login = Command::legacy(legacy::login_line(&config.password), ResponseFormat::Direct);
            let reply = session.execute_legacy(&login, ReadMode::Safe).await?;
            legacy::ack(&reply).map_err(|_| RconError::Auth)?;
        }
        Generation::V2 => {
            if legacy_preamble {
                session.read_exact(legacy::KEY_LEN, READ_SLOW).await?;
            }

            let connect = session.round_trip(frame::SERVER_CONNECT, "").await?;
            if !connect.is_ok() {
                return Err(RconError::Handshake(format!(
                    "{} {}",
                    connect.status_code, connect.status_message
                )));
            }
            session.key = frame::decode_session_key(&connect.content_body)?;

            let login = session.round_trip(frame::LOGIN, &config.password).await?;
            if login.status_code == STATUS_UNAUTHORIZED {
                return Err(RconError::Auth);
            }
            if !login.is_ok() {
                return Err(RconError::Protocol {
                    code: login.status_code,
                    message: login.status_message,
                });
            }
            session.auth_token = login.content_body;
        }
    }

    info!("Authenticated with {} ({})", config.addr(), generation);
    Ok(session)
}

impl Session {
    async fn execute_legacy(
        &mut self,
        command: &Command,
        mode: ReadMode,
    ) -> Result<String, RconError> {
        let mut line = command.line().into_bytes();
        xor_cipher(&mut line, &self.key, 0);
        self.write_all(&line).await?;

        let mut payload = self.read_chunk(READ_SLOW).await?;
        xor_cipher(&mut payload, &self.key, 0);

        match command.format {
            ResponseFormat::Direct => {}
            ResponseFormat::IndexedList => {
                while !legacy::indexed_list_complete(&String::from_utf8_lossy(&payload)) {
                    let chunk = self.read_chunk(READ_NORMAL).await?;
                    self.append_deciphered(&mut payload, chunk);
                }
            }
            ResponseFormat::UnindexedList => loop {
                if mode == ReadMode::FastUnsafe
                    && log_tail_complete(&String::from_utf8_lossy(&payload))
                {
                    break;
                }
                match self.read_some(READ_FAST).await? {
                    Some(chunk) => self.append_deciphered(&mut payload, chunk),
                    None => break,
                }
            },
        }

        Ok(String::from_utf8_lossy(&payload).into_owned())
    }

    /// The key position continues across the chunks of one reply.
    fn append_deciphered(&self, payload: &mut Vec<u8>, mut chunk: Vec<u8>) {
        xor_cipher(&mut chunk, &self.key, payload.len());
        payload.extend_from_slice(&chunk);
    }

    async fn execute_framed(&mut self, command: &Command) -> Result<String, RconError> {
        let response = self.round_trip(&command.name, &command.body).await?;
        if !response.is_ok() {
            return Err(RconError::Protocol {
                code: response.status_code,
                message: response.status_message,
            });
        }
        Ok(response.content_body)
    }

    async fn round_trip(&mut self, name: &str, body: &str) -> Result<ResponseEnvelope, RconError> {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);

        let envelope = RequestEnvelope::new(&self.auth_token, name, body);
        let bytes = frame::encode_frame(request_id, &envelope, &self.key)?;
        self.write_all(&bytes).await?;

        let header = FrameHeader::decode(&self.read_exact(HEADER_LEN, READ_SLOW).await?)?;
        if header.request_id != request_id {
            debug!(
                "Reply id {} does not match request id {}",
                header.request_id, request_id
            );
        }
        let mut payload = self.read_exact(header.length as usize, READ_NORMAL).await?;
        Ok(frame::decode_payload(&mut payload, &self.key)?)
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), RconError> {
        deadline("write", WRITE_TIMEOUT, self.stream.write_all(bytes)).await
    }

    async fn read_exact(&mut self, len: usize, limit: Duration) -> Result<Vec<u8>, RconError> {
        let mut buf = vec![0u8; len];
        deadline("read", limit, self.stream.read_exact(&mut buf)).await?;
        Ok(buf)
    }

    async fn read_chunk(&mut self, limit: Duration) -> Result<Vec<u8>, RconError> {
        self.read_some(limit)
            .await?
            .ok_or(RconError::SocketTimeout("read"))
    }

    /// One read. `None` when `limit` passes with nothing received.
    async fn read_some(&mut self, limit: Duration) -> Result<Option<Vec<u8>>, RconError> {
        let mut buf = vec![0u8; READ_CHUNK];
        let n = match timeout(limit, self.stream.read(&mut buf)).await {
            Err(_) => return Ok(None),
            Ok(result) => result?,
        };
        if n == 0 {
            return Err(RconError::ConnectionClosed);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}

async fn deadline<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T, RconError>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(limit, fut).await {
        Err(_) => Err(RconError::SocketTimeout(op)),
        Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Err(RconError::ConnectionClosed),
        Ok(result) => Ok(result?),
    }
}
