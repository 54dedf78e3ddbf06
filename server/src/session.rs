//! Transport sessions and their handshake state
//!
//! A session is created for the first well-formed frame arriving from an
//! unknown address and lives until the peer logs out, times out, or its
//! worker task dies. Each session owns the sending half of its worker's
//! inbox; dropping the session closes the inbox and lets the worker finish.

use log::info;
use shared::protocol::Frame;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames a session may have waiting for its worker before new ones are
/// dropped
pub const INBOX_CAPACITY: usize = 256;

/// Handshake progress of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a connection request
    Connecting,
    /// Accepted, waiting for the client to finish loading
    AwaitingReady,
    /// Initial world snapshot is being streamed
    Synchronizing,
    Active,
    Disconnected,
}

/// One peer address and the player it controls, if any
#[derive(Debug)]
pub struct Session {
    pub addr: SocketAddr,
    pub state: SessionState,
    pub player_id: Option<u32>,
    /// Last time any frame arrived from this address
    pub last_seen: Instant,
    inbox: mpsc::Sender<Frame>,
}

impl Session {
    pub fn new(addr: SocketAddr, inbox: mpsc::Sender<Frame>) -> Self {
        Self {
            addr,
            state: SessionState::Connecting,
            player_id: None,
            last_seen: Instant::now(),
            inbox,
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Queues a frame for this session's worker without waiting
    ///
    /// Fails with `Full` when the worker is `INBOX_CAPACITY` frames behind
    /// and with `Closed` once the worker has gone away. The frame is
    /// dropped in both cases.
    pub fn deliver(&mut self, frame: Frame) -> Result<(), TrySendError<Frame>> {
        self.last_seen = Instant::now();
        self.inbox.try_send(frame)
    }
}

/// All live sessions, keyed by peer address
pub struct SessionManager {
    sessions: HashMap<SocketAddr, Session>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
        }
    }

    /// Registers a new session in `Connecting`
    ///
    /// Returns false if the server is full or the address already has one.
    pub fn open(&mut self, addr: SocketAddr, inbox: mpsc::Sender<Frame>) -> bool {
        if self.sessions.len() >= self.max_sessions || self.sessions.contains_key(&addr) {
            return false;
        }
        self.sessions.insert(addr, Session::new(addr, inbox));
        info!("Session opened for {}", addr);
        true
    }

    pub fn close(&mut self, addr: SocketAddr) -> Option<Session> {
        let mut session = self.sessions.remove(&addr)?;
        session.state = SessionState::Disconnected;
        info!("Session closed for {}", addr);
        Some(session)
    }

    pub fn get(&self, addr: SocketAddr) -> Option<&Session> {
        self.sessions.get(&addr)
    }

    pub fn get_mut(&mut self, addr: SocketAddr) -> Option<&mut Session> {
        self.sessions.get_mut(&addr)
    }

    pub fn state(&self, addr: SocketAddr) -> Option<SessionState> {
        self.sessions.get(&addr).map(|s| s.state)
    }

    pub fn set_state(&mut self, addr: SocketAddr, state: SessionState) -> bool {
        match self.sessions.get_mut(&addr) {
            Some(session) => {
                session.state = state;
                true
            }
            None => false,
        }
    }

    /// Attaches a player to a session and moves it to `AwaitingReady`
    pub fn bind_player(&mut self, addr: SocketAddr, player_id: u32) -> bool {
        match self.sessions.get_mut(&addr) {
            Some(session) => {
                session.player_id = Some(player_id);
                session.state = SessionState::AwaitingReady;
                true
            }
            None => false,
        }
    }

    pub fn player_id(&self, addr: SocketAddr) -> Option<u32> {
        self.sessions.get(&addr)?.player_id
    }

    pub fn addr_of_player(&self, player_id: u32) -> Option<SocketAddr> {
        self.sessions
            .values()
            .find(|session| session.player_id == Some(player_id))
            .map(|session| session.addr)
    }

    /// (player id, address) of every session that owns a player
    pub fn player_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.sessions
            .values()
            .filter_map(|session| session.player_id.map(|id| (id, session.addr)))
            .collect()
    }

    /// Sessions that never got a player and have gone quiet
    pub fn stale_unbound(&self, timeout: Duration) -> Vec<SocketAddr> {
        self.sessions
            .values()
            .filter(|session| session.player_id.is_none() && session.is_timed_out(timeout))
            .map(|session| session.addr)
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::PacketType;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn inbox() -> mpsc::Sender<Frame> {
        mpsc::channel(INBOX_CAPACITY).0
    }

    #[test]
    fn test_open_respects_capacity() {
        let mut manager = SessionManager::new(1);
        assert!(manager.open(addr(1000), inbox()));
        assert!(manager.is_full());
        assert!(!manager.open(addr(1001), inbox()));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_open_rejects_duplicate_address() {
        let mut manager = SessionManager::new(4);
        assert!(manager.open(addr(1000), inbox()));
        assert!(!manager.open(addr(1000), inbox()));
    }

    #[test]
    fn test_new_session_is_connecting() {
        let mut manager = SessionManager::new(4);
        manager.open(addr(1000), inbox());
        assert_eq!(manager.state(addr(1000)), Some(SessionState::Connecting));
        assert_eq!(manager.player_id(addr(1000)), None);
    }

    #[test]
    fn test_bind_player() {
        let mut manager = SessionManager::new(4);
        manager.open(addr(1000), inbox());
        manager.open(addr(1001), inbox());

        assert!(manager.bind_player(addr(1000), 7));
        assert_eq!(manager.state(addr(1000)), Some(SessionState::AwaitingReady));
        assert_eq!(manager.addr_of_player(7), Some(addr(1000)));
        assert_eq!(manager.player_addrs(), vec![(7, addr(1000))]);
        assert!(!manager.bind_player(addr(2000), 8));
    }

    #[test]
    fn test_close_marks_disconnected() {
        let mut manager = SessionManager::new(4);
        manager.open(addr(1000), inbox());

        let closed = manager.close(addr(1000)).unwrap();
        assert_eq!(closed.state, SessionState::Disconnected);
        assert!(manager.is_empty());
        assert!(manager.close(addr(1000)).is_none());
    }

    #[test]
    fn test_stale_unbound_sessions() {
        let mut manager = SessionManager::new(4);
        manager.open(addr(1000), inbox());
        manager.open(addr(1001), inbox());
        manager.bind_player(addr(1001), 1);

        for port in [1000, 1001] {
            manager.get_mut(addr(port)).unwrap().last_seen =
                Instant::now() - Duration::from_secs(20);
        }

        assert_eq!(
            manager.stale_unbound(Duration::from_secs(10)),
            vec![addr(1000)]
        );
    }

    #[test]
    fn test_deliver_reaches_worker() {
        let (tx, mut rx) = mpsc::channel(INBOX_CAPACITY);
        let mut session = Session::new(addr(1000), tx);

        assert!(session
            .deliver(Frame::new(PacketType::Heartbeat, Vec::new()))
            .is_ok());
        let frame = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(frame.tag, PacketType::Heartbeat as u8);

        drop(rx);
        assert!(matches!(
            session.deliver(Frame::new(PacketType::Heartbeat, Vec::new())),
            Err(TrySendError::Closed(_))
        ));
    }

    #[test]
    fn test_deliver_drops_frames_when_worker_lags() {
        let (tx, mut rx) = mpsc::channel(2);
        let mut session = Session::new(addr(1000), tx);
        let heartbeat = || Frame::new(PacketType::Heartbeat, Vec::new());

        assert!(session.deliver(heartbeat()).is_ok());
        assert!(session.deliver(heartbeat()).is_ok());
        assert!(matches!(
            session.deliver(heartbeat()),
            Err(TrySendError::Full(_))
        ));

        // Draining makes room again
        assert!(rx.try_recv().is_ok());
        assert!(session.deliver(heartbeat()).is_ok());
    }

}
