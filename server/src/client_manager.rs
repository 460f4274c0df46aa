//! Tracks the RCON sessions the mock server is serving.
//!
//! Every accepted socket runs in its own task. The manager keeps the abort
//! handle of each so a test can sever every connection at once and watch
//! the client reconnect.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::task::AbortHandle;

#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Set once the session has logged in.
    pub authenticated: bool,
    abort: Option<AbortHandle>,
}

#[derive(Debug, Default)]
pub struct ClientManager {
    sessions: HashMap<u64, Session>,
    next_id: u64,
    accepted: u64,
    logins: u64,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted socket and returns its session id.
    pub fn register(&mut self, addr: SocketAddr) -> u64 {
        self.next_id += 1;
        self.accepted += 1;
        let id = self.next_id;
        self.sessions.insert(
            id,
            Session {
                id,
                addr,
                connected_at: Instant::now(),
                authenticated: false,
                abort: None,
            },
        );
        id
    }

    pub fn attach(&mut self, id: u64, abort: AbortHandle) {
        match self.sessions.get_mut(&id) {
            Some(session) => session.abort = Some(abort),
            // The session finished before its handle arrived.
            None => abort.abort(),
        }
    }

    pub fn mark_authenticated(&mut self, id: u64) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.authenticated = true;
            self.logins += 1;
        }
    }

    pub fn remove(&mut self, id: u64) -> Option<Session> {
        self.sessions.remove(&id)
    }

    /// Aborts every session task, closing their sockets. Returns how many
    /// were severed.
    pub fn sever_all(&mut self) -> usize {
        let count = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            if let Some(abort) = session.abort {
                abort.abort();
            }
        }
        if count > 0 {
            info!("Severed {} sessions", count);
        }
        count
    }

    pub fn active(&self) -> usize {
        self.sessions.len()
    }

    /// Sockets accepted over the server's lifetime.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Successful logins over the server's lifetime.
    pub fn logins(&self) -> u64 {
        self.logins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_register_and_remove() {
        let mut manager = ClientManager::new();
        let first = manager.register(addr());
        let second = manager.register(addr());
        assert_ne!(first, second);
        assert_eq!(manager.active(), 2);

        manager.mark_authenticated(first);
        assert_eq!(manager.logins(), 1);

        let session = manager.remove(first).unwrap();
        assert!(session.authenticated);
        assert_eq!(manager.active(), 1);
        assert_eq!(manager.accepted(), 2);
    }

    #[tokio::test]
    async fn test_sever_all_aborts_tasks() {
        let mut manager = ClientManager::new();
        let id = manager.register(addr());
        let task = tokio::spawn(std::future::pending::<()>());
        manager.attach(id, task.abort_handle());

        assert_eq!(manager.sever_all(), 1);
        assert_eq!(manager.active(), 0);
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
