//! Directory of live sessions.
//!
//! The registry is the only owner of the session map and the only place that
//! creates sessions, changes their membership or removes them. Two maps are
//! kept behind `RwLock`s: game id to session, and identity to game id. Each
//! session sits behind its own `Mutex`, so operations on different games never
//! contend for anything but the brief map lookups.
//!
//! Lock order is always session first, maps second. Nothing takes a session
//! lock while holding a map lock.

use crate::auth::Identity;
use crate::session::{ConnectionId, ConnectionRef, Participant, Session, SessionSettings};
use log::{debug, info};
use rand::Rng;
use shared::{GameError, GameMode, GameResult, ServerMessage, TerminationReason};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

pub type SessionHandle = Arc<Mutex<Session>>;

const GAME_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GAME_ID_LEN: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// Capacity of competitive sessions, host and bots included.
    pub max_players: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_players: 4 }
    }
}

/// A session that has just been terminated. Its bots still need killing and
/// its map entries are only dropped by [`SessionRegistry::discard`].
#[derive(Debug)]
pub struct Termination {
    pub session_id: String,
    pub reason: TerminationReason,
    pub bots: Vec<Identity>,
    /// Humans that were sent `game_terminated`.
    pub notified: usize,
}

#[derive(Debug)]
pub enum Departure {
    Left,
    Terminated(Termination),
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    members: RwLock<HashMap<Identity, String>>,
    config: RegistryConfig,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            members: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn get(&self, session_id: &str) -> GameResult<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(GameError::SessionNotFound)
    }

    /// The non-terminated session `identity` currently plays in.
    pub async fn resolve(&self, identity: &Identity) -> Option<SessionHandle> {
        let session_id = self.members.read().await.get(identity).cloned()?;
        let handle = self.get(&session_id).await.ok()?;

        let terminated = handle.lock().await.is_terminated();
        if terminated {
            None
        } else {
            Some(handle)
        }
    }

    /// True while `identity` is a participant of the live session `session_id`.
    pub async fn has_member(&self, session_id: &str, identity: &Identity) -> bool {
        let Ok(handle) = self.get(session_id).await else {
            return false;
        };
        let session = handle.lock().await;
        !session.is_terminated() && session.is_participant(identity)
    }

    /// Allocates a session with `host` as its only participant and sends the
    /// host its `game_start`.
    pub async fn create(
        &self,
        host: Participant,
        settings: SessionSettings,
    ) -> GameResult<SessionHandle> {
        let identity = host.identity.clone();
        let settings = match settings.mode {
            GameMode::Solo => settings,
            GameMode::Competitive => SessionSettings {
                max_players: self.config.max_players,
                ..settings
            },
        };

        let mut sessions = self.sessions.write().await;
        let session_id = loop {
            let candidate = generate_game_id(&mut rand::thread_rng());
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = Session::new(session_id.clone(), host, settings, &mut rand::thread_rng())?;
        session.send_to(&identity, ServerMessage::GameStart(session.snapshot()));
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(session_id.clone(), Arc::clone(&handle));
        drop(sessions);

        self.members.write().await.insert(identity.clone(), session_id.clone());
        info!("{} created {:?} game {}", identity, settings.mode, session_id);
        Ok(handle)
    }

    /// Adds a participant to a competitive session. Humans receive the full
    /// state; everyone else gets the new participant list.
    pub async fn join(
        &self,
        session_id: &str,
        participant: Participant,
    ) -> GameResult<SessionHandle> {
        let handle = self.get(session_id).await?;
        let identity = participant.identity.clone();

        let mut session = handle.lock().await;
        session.add_participant(participant)?;
        session.send_to(&identity, ServerMessage::GameStart(session.snapshot()));
        let membership = ServerMessage::GameUpdate(session.update(Vec::new(), None));
        session.broadcast_except(&identity, &membership);
        self.members.write().await.insert(identity, session_id.to_string());
        drop(session);

        Ok(handle)
    }

    /// Adds a bot on behalf of `requested_by`, who must be the host.
    pub async fn add_bot(
        &self,
        session_id: &str,
        requested_by: &Identity,
        bot: Participant,
    ) -> GameResult<SessionHandle> {
        let handle = self.get(session_id).await?;
        let identity = bot.identity.clone();

        let mut session = handle.lock().await;
        if session.is_terminated() {
            return Err(GameError::SessionNotFound);
        }
        if !session.is_host(requested_by) {
            return Err(GameError::Unauthorized("summon bots".to_string()));
        }
        if session.has_bot() {
            return Err(GameError::SessionNotJoinable("game already has a bot".to_string()));
        }
        session.add_participant(bot)?;
        session.broadcast_membership();
        self.members.write().await.insert(identity, session_id.to_string());
        drop(session);

        Ok(handle)
    }

    /// Removes a bot on behalf of `requested_by`, who must be the host.
    pub async fn remove_bot(
        &self,
        session_id: &str,
        target: &Identity,
        requested_by: &Identity,
    ) -> GameResult<()> {
        let handle = self.get(session_id).await?;

        let mut session = handle.lock().await;
        if session.is_terminated() {
            return Err(GameError::SessionNotFound);
        }
        if !session.is_host(requested_by) {
            return Err(GameError::Unauthorized("kick players".to_string()));
        }
        match session.participant(target) {
            Some(p) if p.is_bot => {}
            Some(_) => return Err(GameError::IllegalMove("only bots can be kicked".to_string())),
            None => return Err(GameError::IllegalMove(format!("{} is not in this game", target))),
        }

        session.remove_participant(target);
        session.broadcast_membership();
        self.forget_member(target, session_id).await;
        Ok(())
    }

    /// Removes `identity` from the session. A departing host terminates the
    /// session: every other human is sent `game_terminated` under the same
    /// lock that flips the status, so nothing can interleave.
    pub async fn leave(&self, session_id: &str, identity: &Identity) -> GameResult<Departure> {
        let handle = self.get(session_id).await?;

        let mut session = handle.lock().await;
        if session.is_terminated() {
            return Err(GameError::SessionNotFound);
        }
        if !session.is_participant(identity) {
            return Err(GameError::NotInSession);
        }

        if session.is_host(identity) {
            let termination = Self::terminate_locked(
                &mut session,
                TerminationReason::HostLeft,
                "The host left the game",
                Some(identity),
            );
            self.forget_member(identity, session_id).await;
            return Ok(Departure::Terminated(termination));
        }

        session.remove_participant(identity);
        session.broadcast_membership();
        self.forget_member(identity, session_id).await;
        Ok(Departure::Left)
    }

    /// Binds a reconnecting participant to its session and sends it the full
    /// state. Returns `None` when the identity has no live session.
    pub async fn attach(
        &self,
        identity: &Identity,
        connection: ConnectionRef,
    ) -> Option<SessionHandle> {
        let handle = self.resolve(identity).await?;

        let mut session = handle.lock().await;
        if session.is_terminated() || !session.attach(identity, connection) {
            return None;
        }
        session.send_to(identity, ServerMessage::GameStart(session.snapshot()));
        if session.mode() == GameMode::Competitive {
            let membership = ServerMessage::GameUpdate(session.update(Vec::new(), None));
            session.broadcast_except(identity, &membership);
        }
        debug!("{} reattached to game {}", identity, session.id());
        drop(session);

        Some(handle)
    }

    /// Marks the participant disconnected if `connection_id` is still theirs.
    pub async fn detach(&self, identity: &Identity, connection_id: ConnectionId) -> bool {
        let Some(handle) = self.resolve(identity).await else {
            return false;
        };

        let mut session = handle.lock().await;
        let detached = session.detach(identity, connection_id);
        if detached && session.mode() == GameMode::Competitive {
            session.broadcast_membership();
        }
        detached
    }

    /// Terminates every session idle for at least `max_idle` with no human
    /// connected.
    pub async fn evict_stale(&self, max_idle: Duration) -> Vec<Termination> {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let mut evicted = Vec::new();
        for handle in handles {
            let mut session = handle.lock().await;
            if session.is_terminated()
                || session.connected_humans() > 0
                || session.idle_for() < max_idle
            {
                continue;
            }

            info!("Evicting idle game {}", session.id());
            let termination = Self::terminate_locked(
                &mut session,
                TerminationReason::Evicted,
                "The game was closed after being idle",
                None,
            );
            evicted.push(termination);
        }
        evicted
    }

    /// Terminates every live session, used on server shutdown.
    pub async fn terminate_all(&self) -> Vec<Termination> {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let mut terminated = Vec::new();
        for handle in handles {
            let mut session = handle.lock().await;
            if session.is_terminated() {
                continue;
            }
            terminated.push(Self::terminate_locked(
                &mut session,
                TerminationReason::Shutdown,
                "The server is shutting down",
                None,
            ));
        }
        terminated
    }

    /// Drops a terminated session and every membership pointing at it.
    pub async fn discard(&self, session_id: &str) {
        let removed = self.sessions.write().await.remove(session_id);
        if removed.is_some() {
            self.members.write().await.retain(|_, id| id != session_id);
            debug!("Discarded game {}", session_id);
        }
    }

    async fn forget_member(&self, identity: &Identity, session_id: &str) {
        let mut members = self.members.write().await;
        if members.get(identity).is_some_and(|id| id == session_id) {
            members.remove(identity);
        }
    }

    fn terminate_locked(
        session: &mut Session,
        reason: TerminationReason,
        message: &str,
        skip: Option<&Identity>,
    ) -> Termination {
        session.terminate();

        let notice = ServerMessage::GameTerminated {
            reason,
            message: message.to_string(),
        };
        let mut notified = 0;
        for participant in session.participants() {
            if participant.is_bot || Some(&participant.identity) == skip {
                continue;
            }
            if let Some(conn) = &participant.connection {
                if conn.send(notice.clone()) {
                    notified += 1;
                }
            }
        }

        Termination {
            session_id: session.id().to_string(),
            reason,
            bots: session.bot_identities(),
            notified,
        }
    }
}

/// Six characters from an alphabet without look-alike glyphs.
pub fn generate_game_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GAME_ID_LEN)
        .map(|_| GAME_ID_ALPHABET[rng.gen_range(0..GAME_ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{BoardConfig, CellView, GameStatus, Position, VictoryRule};
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    fn human(
        key: &str,
        conn_id: ConnectionId,
    ) -> (Participant, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ConnectionRef::new(conn_id, tx);
        let participant = Participant::human(Identity::durable(key), key, connection);
        (participant, rx)
    }

    fn competitive() -> SessionSettings {
        SessionSettings::competitive(BoardConfig::new(8, 8, 10), VictoryRule::AllMines, 4)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    #[tokio::test]
    async fn test_create_and_resolve() {
        let registry = SessionRegistry::new(RegistryConfig::default());
        let (alice, mut rx) = human("alice", 1);

        let handle = registry
            .create(alice, SessionSettings::solo(BoardConfig::new(9, 9, 10)))
            .await
            .unwrap();
        let id = handle.lock().await.id().to_string();
        assert_eq!(id.len(), 6);

        let resolved = registry.resolve(&Identity::durable("alice")).await.unwrap();
        assert!(Arc::ptr_eq(&handle, &resolved));
        assert!(registry.resolve(&Identity::durable("bob")).await.is_none());

        match rx.try_recv().unwrap() {
            ServerMessage::GameStart(snapshot) => {
                assert_eq!(snapshot.game_id, id);
                assert_eq!(snapshot.status, GameStatus::Draft);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_bad_config() {
        let registry = SessionRegistry::new(RegistryConfig::default());
        let (alice, _rx) = human("alice", 1);
        let result = registry
            .create(alice, SessionSettings::solo(BoardConfig::new(0, 9, 10)))
            .await;
        assert!(matches!(result, Err(GameError::InvalidConfiguration(_))));
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_notifies_existing_players() {
        let registry = SessionRegistry::new(RegistryConfig { max_players: 2 });
        let (alice, mut alice_rx) = human("alice", 1);
        let handle = registry.create(alice, competitive()).await.unwrap();
        let id = handle.lock().await.id().to_string();
        drain(&mut alice_rx);

        let (bob, mut bob_rx) = human("bob", 2);
        assert_ok!(registry.join(&id, bob).await);

        assert!(matches!(bob_rx.try_recv().unwrap(), ServerMessage::GameStart(_)));
        match alice_rx.try_recv().unwrap() {
            ServerMessage::GameUpdate(update) => assert_eq!(update.participants.len(), 2),
            other => panic!("unexpected {:?}", other),
        }

        let (carol, _rx) = human("carol", 3);
        assert_eq!(registry.join(&id, carol).await.err(), Some(GameError::SessionFull));
        let (dave, _rx) = human("dave", 4);
        assert_eq!(registry.join("NOPE00", dave).await.err(), Some(GameError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_host_leave_terminates_and_notifies() {
        let registry = SessionRegistry::new(RegistryConfig::default());
        let (alice, _alice_rx) = human("alice", 1);
        let handle = registry.create(alice, competitive()).await.unwrap();
        let id = handle.lock().await.id().to_string();

        let (bob, mut bob_rx) = human("bob", 2);
        registry.join(&id, bob).await.unwrap();
        let bot = Identity::bot();
        registry
            .add_bot(&id, &Identity::durable("alice"), Participant::bot(bot.clone(), "Bot"))
            .await
            .unwrap();
        drain(&mut bob_rx);

        let departure = registry.leave(&id, &Identity::durable("alice")).await.unwrap();
        let termination = match departure {
            Departure::Terminated(t) => t,
            Departure::Left => panic!("host departure must terminate"),
        };
        assert_eq!(termination.bots, vec![bot]);
        assert_eq!(termination.notified, 1);
        assert_eq!(termination.reason, TerminationReason::HostLeft);
        assert_eq!(handle.lock().await.status(), GameStatus::Terminated);

        let messages = drain(&mut bob_rx);
        assert!(matches!(
            messages.as_slice(),
            [ServerMessage::GameTerminated { reason: TerminationReason::HostLeft, .. }]
        ));

        assert!(registry.resolve(&Identity::durable("bob")).await.is_none());
        assert_eq!(
            registry.leave(&id, &Identity::durable("bob")).await.err(),
            Some(GameError::SessionNotFound)
        );

        registry.discard(&id).await;
        assert_eq!(registry.session_count().await, 0);
        assert!(registry.get(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_non_host_leave_keeps_session() {
        let registry = SessionRegistry::new(RegistryConfig::default());
        let (alice, mut alice_rx) = human("alice", 1);
        let handle = registry.create(alice, competitive()).await.unwrap();
        let id = handle.lock().await.id().to_string();
        let (bob, _bob_rx) = human("bob", 2);
        registry.join(&id, bob).await.unwrap();
        drain(&mut alice_rx);

        let departure = registry.leave(&id, &Identity::durable("bob")).await.unwrap();
        assert!(matches!(departure, Departure::Left));
        assert_eq!(handle.lock().await.participants().len(), 1);
        assert!(matches!(alice_rx.try_recv().unwrap(), ServerMessage::GameUpdate(_)));
        assert!(registry.resolve(&Identity::durable("bob")).await.is_none());
    }

    #[tokio::test]
    async fn test_bot_management_requires_host() {
        let registry = SessionRegistry::new(RegistryConfig::default());
        let (alice, _rx) = human("alice", 1);
        let handle = registry.create(alice, competitive()).await.unwrap();
        let id = handle.lock().await.id().to_string();
        let (bob, _bob_rx) = human("bob", 2);
        registry.join(&id, bob).await.unwrap();

        let bot = Identity::bot();
        let result = registry
            .add_bot(&id, &Identity::durable("bob"), Participant::bot(bot.clone(), "Bot"))
            .await;
        assert!(matches!(result, Err(GameError::Unauthorized(_))));

        let alice_id = Identity::durable("alice");
        assert_ok!(registry.add_bot(&id, &alice_id, Participant::bot(bot.clone(), "Bot")).await);
        let extra = Participant::bot(Identity::bot(), "Bot 2");
        let second = registry.add_bot(&id, &alice_id, extra).await;
        assert!(matches!(second, Err(GameError::SessionNotJoinable(_))));

        assert_err!(registry.remove_bot(&id, &Identity::durable("bob"), &alice_id).await);
        assert_err!(registry.remove_bot(&id, &bot, &Identity::durable("bob")).await);
        assert_ok!(registry.remove_bot(&id, &bot, &alice_id).await);
        assert!(!handle.lock().await.has_bot());
        assert!(registry.resolve(&bot).await.is_none());
    }

    #[tokio::test]
    async fn test_reconnect_restores_state() {
        let registry = SessionRegistry::new(RegistryConfig::default());
        let (alice, _rx) = human("alice", 1);
        let alice_id = Identity::durable("alice");
        let handle = registry
            .create(alice, SessionSettings::solo(BoardConfig::new(9, 9, 10)))
            .await
            .unwrap();

        let before = {
            let mut session = handle.lock().await;
            let mut rng = rand::thread_rng();
            session.reveal(&alice_id, Position::new(4, 4), &mut rng).unwrap();
            session.snapshot()
        };

        assert!(registry.detach(&alice_id, 1).await);
        assert_eq!(handle.lock().await.connected_humans(), 0);

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(registry.attach(&alice_id, ConnectionRef::new(2, tx)).await.is_some());
        match rx.try_recv().unwrap() {
            ServerMessage::GameStart(after) => {
                assert_eq!(after.status, before.status);
                assert_eq!(after.board, before.board);
                assert_eq!(after.scores, before.scores);
                assert_eq!(after.mines_remaining, before.mines_remaining);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reconnect_restores_competitive_flags_and_scores() {
        let registry = SessionRegistry::new(RegistryConfig::default());
        let (alice, _alice_rx) = human("alice", 1);
        let (bob, _bob_rx) = human("bob", 2);
        let alice_id = Identity::durable("alice");
        let bob_id = Identity::durable("bob");
        let handle = registry.create(alice, competitive()).await.unwrap();
        let id = handle.lock().await.id().to_string();
        registry.join(&id, bob).await.unwrap();

        let before = {
            let mut session = handle.lock().await;
            let board = session.board().unwrap();
            let cells: Vec<Position> = (0..8)
                .flat_map(|y| (0..8).map(move |x| Position::new(x, y)))
                .collect();
            let mines: Vec<Position> = cells
                .iter()
                .copied()
                .filter(|p| board.cell(*p).unwrap().is_mine)
                .collect();
            let safe = cells
                .iter()
                .copied()
                .find(|p| !board.cell(*p).unwrap().is_mine)
                .unwrap();

            let mut rng = rand::thread_rng();
            // A found mine scores and keeps the turn; a safe cell passes it.
            session.reveal(&alice_id, mines[0], &mut rng).unwrap();
            session.toggle_flag(&alice_id, mines[2]).unwrap();
            session.reveal(&alice_id, safe, &mut rng).unwrap();
            session.reveal(&bob_id, mines[1], &mut rng).unwrap();
            session.toggle_flag(&bob_id, mines[3]).unwrap();
            session.snapshot()
        };
        assert_eq!(before.scores.get("alice"), Some(&1));
        assert_eq!(before.scores.get("bob"), Some(&1));
        assert_eq!(before.turn.as_deref(), Some("bob"));

        assert!(registry.detach(&bob_id, 2).await);
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(registry.attach(&bob_id, ConnectionRef::new(3, tx)).await.is_some());
        match rx.try_recv().unwrap() {
            ServerMessage::GameStart(after) => {
                assert_eq!(after.status, GameStatus::Playing);
                assert_eq!(after.board, before.board);
                assert_eq!(after.scores, before.scores);
                assert_eq!(after.turn, before.turn);
                assert_eq!(after.mines_remaining, before.mines_remaining);
                let flagged = after
                    .board
                    .iter()
                    .flatten()
                    .filter(|c| matches!(c, CellView::Hidden { flagged: true }))
                    .count();
                assert_eq!(flagged, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_evict_stale_skips_connected_sessions() {
        let registry = SessionRegistry::new(RegistryConfig::default());
        let (alice, _alice_rx) = human("alice", 1);
        registry
            .create(alice, SessionSettings::solo(BoardConfig::new(9, 9, 10)))
            .await
            .unwrap();
        let (bob, _bob_rx) = human("bob", 2);
        let bob_handle = registry
            .create(bob, SessionSettings::solo(BoardConfig::new(9, 9, 10)))
            .await
            .unwrap();

        assert!(registry.evict_stale(Duration::ZERO).await.is_empty());

        registry.detach(&Identity::durable("bob"), 2).await;
        let evicted = registry.evict_stale(Duration::ZERO).await;
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].reason, TerminationReason::Evicted);
        assert!(bob_handle.lock().await.is_terminated());

        // Long thresholds leave fresh sessions alone.
        registry.detach(&Identity::durable("alice"), 1).await;
        assert!(registry.evict_stale(Duration::from_secs(3600)).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_reveals_are_serialized() {
        let registry = Arc::new(SessionRegistry::new(RegistryConfig::default()));
        let (alice, _rx) = human("alice", 1);
        let alice_id = Identity::durable("alice");
        let handle = registry
            .create(alice, SessionSettings::solo(BoardConfig::new(30, 30, 10)))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..30 {
            let handle = Arc::clone(&handle);
            let alice_id = alice_id.clone();
            tasks.push(tokio::spawn(async move {
                let mut session = handle.lock().await;
                let mut rng = rand::thread_rng();
                session.reveal(&alice_id, Position::new(i, i), &mut rng)
            }));
        }

        let mut total = 0;
        for task in tasks {
            if let Ok(Ok(update)) = task.await {
                total += update.cells.len();
            }
        }

        // Every revealed cell is reported by exactly one operation.
        let session = handle.lock().await;
        let board = session.board().unwrap();
        let revealed = (0..30)
            .flat_map(|y| (0..30).map(move |x| Position::new(x, y)))
            .filter(|p| board.cell(*p).unwrap().is_revealed)
            .count();
        assert_eq!(total, revealed);
    }

    #[test]
    fn test_game_id_alphabet() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let id = generate_game_id(&mut rng);
            assert_eq!(id.len(), GAME_ID_LEN);
            assert!(id.bytes().all(|b| GAME_ID_ALPHABET.contains(&b)));
        }
    }
}
