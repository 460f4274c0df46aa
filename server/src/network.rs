//! TCP front end of the mock server: accepts sockets and speaks either
//! protocol generation on them.

use crate::client_manager::ClientManager;
use crate::script::{Reply, Script};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rcon_shared::frame::{
    self, FrameHeader, RequestEnvelope, ResponseEnvelope, HEADER_LEN, LOGIN, SERVER_CONNECT,
    STATUS_UNAUTHORIZED,
};
use rcon_shared::{legacy, xor_cipher, Generation};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::AbortHandle;

type ServeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const SESSION_KEY_LEN: usize = 16;
const STATUS_BAD_REQUEST: i32 = 400;
/// Built-in command that answers with its own argument.
const ECHO: &str = "echo";
const ECHO_FRAMED: &str = "Echo";

#[derive(Debug, Clone)]
pub struct MockSettings {
    pub generation: Generation,
    pub password: String,
    /// Generation 2 only: send a 4-byte generation 1 key before the first
    /// frame, like older servers do.
    pub legacy_preamble: bool,
}

impl MockSettings {
    pub fn new(generation: Generation, password: impl Into<String>) -> Self {
        Self {
            generation,
            password: password.into(),
            legacy_preamble: false,
        }
    }
}

struct Shared {
    settings: MockSettings,
    script: Mutex<Script>,
    clients: Mutex<ClientManager>,
    acceptor: Mutex<Option<AbortHandle>>,
}

pub struct MockServer {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl MockServer {
    pub async fn bind(addr: &str, settings: MockSettings, script: Script) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(MockServer {
            listener,
            shared: Arc::new(Shared {
                settings,
                script: Mutex::new(script),
                clients: Mutex::new(ClientManager::new()),
                acceptor: Mutex::new(None),
            }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> io::Result<MockHandle> {
        Ok(MockHandle {
            addr: self.local_addr()?,
            shared: self.shared.clone(),
        })
    }

    /// Runs the accept loop on a background task and returns a handle to
    /// control it.
    pub fn spawn(self) -> io::Result<MockHandle> {
        let handle = self.handle()?;
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = self.run().await {
                warn!("Mock server stopped: {}", e);
            }
        });
        *shared.acceptor.lock() = Some(task.abort_handle());
        Ok(handle)
    }

    pub async fn run(self) -> io::Result<()> {
        info!(
            "Mock RCON server ({}) listening on {}",
            self.shared.settings.generation,
            self.listener.local_addr()?
        );

        loop {
            let (stream, addr) = self.listener.accept().await?;
            stream.set_nodelay(true)?;
            let id = self.shared.clients.lock().register(addr);
            debug!("Session {} opened from {}", id, addr);

            let shared = self.shared.clone();
            let task = tokio::spawn(async move {
                let result = match shared.settings.generation {
                    Generation::V1 => serve_legacy(&shared, id, stream).await,
                    Generation::V2 => serve_framed(&shared, id, stream).await,
                };
                shared.clients.lock().remove(id);
                match result {
                    Ok(()) => debug!("Session {} closed", id),
                    Err(e) => debug!("Session {} ended: {}", id, e),
                }
            });
            self.shared.clients.lock().attach(id, task.abort_handle());
        }
    }
}

/// Control surface for a running mock server.
#[derive(Clone)]
pub struct MockHandle {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl MockHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn script(&self, key: impl Into<String>, body: impl Into<String>) {
        self.shared.script.lock().set(key, Reply::new(body));
    }

    pub fn script_reply(&self, key: impl Into<String>, reply: Reply) {
        self.shared.script.lock().set(key, reply);
    }

    /// How many times the command keyed `key` was received.
    pub fn hits(&self, key: &str) -> usize {
        self.shared.script.lock().hits(key)
    }

    pub fn total_hits(&self) -> usize {
        self.shared.script.lock().total_hits()
    }

    pub fn sever_all(&self) -> usize {
        self.shared.clients.lock().sever_all()
    }

    pub fn active_sessions(&self) -> usize {
        self.shared.clients.lock().active()
    }

    pub fn accepted(&self) -> u64 {
        self.shared.clients.lock().accepted()
    }

    pub fn logins(&self) -> u64 {
        self.shared.clients.lock().logins()
    }

    /// Stops accepting and closes every session.
    pub fn shutdown(&self) {
        if let Some(acceptor) = self.shared.acceptor.lock().take() {
            acceptor.abort();
        }
        self.shared.clients.lock().sever_all();
    }
}

impl Shared {
    fn legacy_reply(&self, line: &str) -> Reply {
        let scripted = self.script.lock().lookup(line, &[]);
        if let Some(reply) = scripted {
            return reply;
        }
        match line.strip_prefix(ECHO).and_then(|rest| rest.strip_prefix(' ')) {
            Some(text) if !text.is_empty() => Reply::new(text),
            _ => Reply::new(legacy::FAIL),
        }
    }

    fn framed_reply(&self, request: &RequestEnvelope) -> (ResponseEnvelope, Duration) {
        let name = request.name.as_str();
        let key = if request.content_body.is_empty() {
            name.to_string()
        } else {
            format!("{}\t{}", name, request.content_body)
        };

        let scripted = self.script.lock().lookup(&key, &[name]);
        match scripted {
            Some(reply) => (ResponseEnvelope::ok(name, reply.body), reply.delay),
            None if name == ECHO_FRAMED => (
                ResponseEnvelope::ok(name, request.content_body.clone()),
                Duration::ZERO,
            ),
            None => (
                ResponseEnvelope::error(name, STATUS_BAD_REQUEST, "Unknown command"),
                Duration::ZERO,
            ),
        }
    }
}

async fn serve_legacy(shared: &Shared, id: u64, mut stream: TcpStream) -> ServeResult {
    let key: [u8; legacy::KEY_LEN] = rand::random();
    stream.write_all(&key).await?;

    let login = legacy::login_line(&shared.settings.password);
    let mut authenticated = false;
    let mut buf = vec![0u8; 4096];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        xor_cipher(&mut buf[..n], &key, 0);
        let line = String::from_utf8_lossy(&buf[..n]).into_owned();

        let reply = if authenticated {
            shared.legacy_reply(&line)
        } else if line == login {
            authenticated = true;
            shared.clients.lock().mark_authenticated(id);
            Reply::new(legacy::SUCCESS)
        } else {
            debug!("Session {} failed to log in", id);
            Reply::new(legacy::FAIL)
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        let mut bytes = reply.body.into_bytes();
        xor_cipher(&mut bytes, &key, 0);
        stream.write_all(&bytes).await?;
    }
}

async fn serve_framed(shared: &Shared, id: u64, mut stream: TcpStream) -> ServeResult {
    if shared.settings.legacy_preamble {
        let preamble: [u8; legacy::KEY_LEN] = rand::random();
        stream.write_all(&preamble).await?;
    }

    let session_key: [u8; SESSION_KEY_LEN] = rand::random();
    let mut key: Vec<u8> = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let mut header = [0u8; HEADER_LEN];
        match stream.read_exact(&mut header).await {
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            result => result?,
        };
        let header = FrameHeader::decode(&header)?;
        let mut payload = vec![0u8; header.length as usize];
        stream.read_exact(&mut payload).await?;
        let request: RequestEnvelope = frame::decode_payload(&mut payload, &key)?;

        let (response, delay) = match request.name.as_str() {
            SERVER_CONNECT => (
                ResponseEnvelope::ok(SERVER_CONNECT, frame::encode_session_key(&session_key)),
                Duration::ZERO,
            ),
            LOGIN if request.content_body == shared.settings.password => {
                let issued = format!("{:016x}", rand::random::<u64>());
                token = Some(issued.clone());
                shared.clients.lock().mark_authenticated(id);
                (ResponseEnvelope::ok(LOGIN, issued), Duration::ZERO)
            }
            name if name == LOGIN || token.as_deref() != Some(request.auth_token.as_str()) => (
                ResponseEnvelope::error(name, STATUS_UNAUTHORIZED, "Unauthorized"),
                Duration::ZERO,
            ),
            _ => shared.framed_reply(&request),
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let bytes = frame::encode_frame(header.request_id, &response, &key)?;
        stream.write_all(&bytes).await?;

        if request.name == SERVER_CONNECT {
            key = session_key.to_vec();
        }
    }
}
