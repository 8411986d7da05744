//! Endpoint to session directory.
//!
//! Owned by the receive task, which is its only writer. Every path that
//! removes a session (replacement, disconnect, shutdown) runs the session's
//! close hook before dropping it.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::session::Session;

#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<SocketAddr, Box<dyn Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `session` for `endpoint`, closing any session it replaces.
    ///
    /// Returns true if a previous session was replaced.
    pub fn replace(&mut self, endpoint: SocketAddr, session: Box<dyn Session>) -> bool {
        match self.sessions.insert(endpoint, session) {
            Some(mut previous) => {
                info!("Replacing session for {}", endpoint);
                previous.on_close();
                true
            }
            None => {
                info!("Session created for {}", endpoint);
                false
            }
        }
    }

    pub fn get_mut(&mut self, endpoint: &SocketAddr) -> Option<&mut (dyn Session + 'static)> {
        self.sessions.get_mut(endpoint).map(|session| session.as_mut())
    }

    pub fn contains(&self, endpoint: &SocketAddr) -> bool {
        self.sessions.contains_key(endpoint)
    }

    /// Closes and removes the session for `endpoint`. Returns false if none existed.
    pub fn remove(&mut self, endpoint: &SocketAddr) -> bool {
        if let Some(mut session) = self.sessions.remove(endpoint) {
            info!("Session for {} closed", endpoint);
            session.on_close();
            true
        } else {
            false
        }
    }

    /// Closes every session. Returns how many were closed.
    pub fn clear(&mut self) -> usize {
        let closed = self.sessions.len();
        for (_, mut session) in self.sessions.drain() {
            session.on_close();
        }
        closed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn endpoints(&self) -> Vec<SocketAddr> {
        self.sessions.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        handled: AtomicUsize,
        closed: AtomicUsize,
    }

    struct RecordingSession {
        counters: Arc<Counters>,
    }

    impl Session for RecordingSession {
        fn handle_message(&mut self, _message: Message) -> bool {
            self.counters.handled.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn on_close(&mut self) {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn session(counters: &Arc<Counters>) -> Box<dyn Session> {
        Box::new(RecordingSession {
            counters: Arc::clone(counters),
        })
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_replace_closes_previous() {
        let first = Arc::new(Counters::default());
        let second = Arc::new(Counters::default());
        let mut manager = SessionManager::new();

        assert!(!manager.replace(addr(1), session(&first)));
        assert!(manager.replace(addr(1), session(&second)));

        assert_eq!(manager.len(), 1);
        assert_eq!(first.closed.load(Ordering::SeqCst), 1);
        assert_eq!(second.closed.load(Ordering::SeqCst), 0);

        manager
            .get_mut(&addr(1))
            .unwrap()
            .handle_message(Message::DisconnectionNotification);
        assert_eq!(first.handled.load(Ordering::SeqCst), 0);
        assert_eq!(second.handled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove() {
        let counters = Arc::new(Counters::default());
        let mut manager = SessionManager::new();
        manager.replace(addr(1), session(&counters));

        assert!(manager.contains(&addr(1)));
        assert!(manager.remove(&addr(1)));
        assert!(!manager.remove(&addr(1)));
        assert!(manager.is_empty());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_closes_all() {
        let counters = Arc::new(Counters::default());
        let mut manager = SessionManager::new();
        for port in 1..=3 {
            manager.replace(addr(port), session(&counters));
        }

        let mut endpoints = manager.endpoints();
        endpoints.sort();
        assert_eq!(endpoints, vec![addr(1), addr(2), addr(3)]);

        assert_eq!(manager.clear(), 3);
        assert!(manager.is_empty());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_get_mut_without_session() {
        let mut manager = SessionManager::new();
        assert!(manager.get_mut(&addr(9)).is_none());
    }
}
