//! Connection dispatcher.
//!
//! The [`Hub`] is the transport-independent half of the server: it turns a
//! connecting token into an identity, routes every decoded client message to
//! the registry, the owning session or the bot supervisor, and answers
//! rejected operations with an `error` frame on the sender's queue only.
//! The network layer owns the sockets and feeds the hub text frames.

use crate::auth::{authenticate, AuthenticatedUser, Authenticator, Identity};
use crate::registry::{Departure, SessionHandle, SessionRegistry, Termination};
use crate::session::{ConnectionId, ConnectionRef, Outbound, Participant, SessionSettings};
use crate::supervisor::BotSupervisor;
use log::{debug, info, warn};
use shared::{ClientMessage, GameError, GameMode, GameResult, Position, ServerMessage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One accepted connection, as seen by the hub.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub id: ConnectionId,
    pub user: AuthenticatedUser,
    sender: Outbound,
}

impl ClientConnection {
    pub fn identity(&self) -> &Identity {
        &self.user.identity
    }

    fn connection_ref(&self) -> ConnectionRef {
        ConnectionRef::new(self.id, self.sender.clone())
    }

    fn send(&self, message: ServerMessage) {
        if self.sender.send(message).is_err() {
            debug!("Connection {} closed before delivery", self.id);
        }
    }
}

pub struct Hub {
    registry: Arc<SessionRegistry>,
    supervisor: Arc<BotSupervisor>,
    authenticator: Arc<dyn Authenticator>,
    flush_delay: Duration,
    next_connection_id: AtomicU64,
}

impl Hub {
    pub fn new(
        registry: Arc<SessionRegistry>,
        supervisor: Arc<BotSupervisor>,
        authenticator: Arc<dyn Authenticator>,
        flush_delay: Duration,
    ) -> Self {
        Self {
            registry,
            supervisor,
            authenticator,
            flush_delay,
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<BotSupervisor> {
        &self.supervisor
    }

    /// Resolves the identity for a new connection, greets it and restores
    /// its session if it has one.
    pub async fn connect(&self, token: Option<&str>, sender: Outbound) -> ClientConnection {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        let bot = match token {
            Some(token) => self.supervisor.redeem_ticket(token).await,
            None => None,
        };
        let user = match bot {
            Some(identity) => self.bot_user(identity).await,
            None => authenticate(self.authenticator.as_ref(), token),
        };

        let connection = ClientConnection { id, user, sender };
        info!("Connection {} identified as {}", id, connection.identity());
        connection.send(ServerMessage::Welcome {
            identity: connection.identity().key().to_string(),
            display_name: connection.user.display_name.clone(),
            anonymous: connection.identity().is_anonymous(),
        });

        if !connection.identity().is_anonymous() {
            let restored = self
                .registry
                .attach(connection.identity(), connection.connection_ref())
                .await;
            if let Some(handle) = restored {
                let session = handle.lock().await;
                info!("Restored {} into game {}", connection.identity(), session.id());
            }
        }

        connection
    }

    async fn bot_user(&self, identity: Identity) -> AuthenticatedUser {
        let mut display_name = None;
        if let Some(handle) = self.registry.resolve(&identity).await {
            display_name = handle
                .lock()
                .await
                .participant(&identity)
                .map(|p| p.display_name.clone());
        }
        AuthenticatedUser {
            display_name: display_name.unwrap_or_else(|| identity.to_string()),
            identity,
        }
    }

    /// Decodes and applies one text frame. Failures are reported to the
    /// sender alone.
    pub async fn handle_text(&self, connection: &ClientConnection, text: &str) {
        let result = match ClientMessage::parse(text) {
            Ok(message) => self.handle_message(connection, message).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            debug!("Rejected request from {}: {}", connection.identity(), e);
            connection.send(ServerMessage::error(&e));
        }
    }

    pub async fn handle_message(
        &self,
        connection: &ClientConnection,
        message: ClientMessage,
    ) -> GameResult<()> {
        let identity = connection.identity();

        match message {
            ClientMessage::NewGame {
                mode,
                difficulty,
                config,
                victory,
                first_move,
            } => {
                if identity.is_bot() {
                    return Err(GameError::Unauthorized("bots cannot host games".to_string()));
                }
                let previous = self.current_session_id(identity).await;

                let board = ClientMessage::board_config(difficulty, config);
                let settings = match mode {
                    GameMode::Solo => SessionSettings::solo(board),
                    GameMode::Competitive => SessionSettings::competitive(
                        board,
                        victory.unwrap_or_default(),
                        self.registry.config().max_players,
                    ),
                };
                let host = Participant::human(
                    identity.clone(),
                    connection.user.display_name.clone(),
                    connection.connection_ref(),
                );
                let handle = self.registry.create(host, settings).await?;
                self.leave_previous(previous, identity).await;

                if let Some(pos) = first_move {
                    self.reveal(&handle, identity, pos).await?;
                }
                Ok(())
            }

            ClientMessage::JoinGame { game_id } => {
                if identity.is_bot() {
                    return Err(GameError::Unauthorized(
                        "bots join through their ticket".to_string(),
                    ));
                }
                let previous = self.current_session_id(identity).await;

                let participant = Participant::human(
                    identity.clone(),
                    connection.user.display_name.clone(),
                    connection.connection_ref(),
                );
                self.registry.join(&game_id, participant).await?;
                self.leave_previous(previous, identity).await;
                Ok(())
            }

            ClientMessage::Reveal { x, y } => {
                let handle = self.registry.resolve(identity).await.ok_or(GameError::NotInSession)?;
                self.reveal(&handle, identity, Position::new(x, y)).await
            }

            ClientMessage::Flag { x, y } => {
                let handle = self.registry.resolve(identity).await.ok_or(GameError::NotInSession)?;
                let mut session = handle.lock().await;
                let update = session.toggle_flag(identity, Position::new(x, y))?;
                session.broadcast(&ServerMessage::GameUpdate(update));
                Ok(())
            }

            ClientMessage::SummonBot { game_id } => {
                let bot = self.supervisor.summon(&game_id, identity).await?;
                info!("{} summoned {} into game {}", identity, bot, game_id);
                Ok(())
            }

            ClientMessage::KickPlayer { target_id } => {
                let handle = self.registry.resolve(identity).await.ok_or(GameError::NotInSession)?;
                let (session_id, target) = {
                    let session = handle.lock().await;
                    let target = session
                        .participants()
                        .iter()
                        .find(|p| p.identity.key() == target_id)
                        .map(|p| p.identity.clone())
                        .ok_or_else(|| {
                            GameError::IllegalMove(format!("{} is not in this game", target_id))
                        })?;
                    (session.id().to_string(), target)
                };

                self.supervisor.kick(&session_id, &target, identity).await?;
                info!("{} kicked {} from game {}", identity, target, session_id);
                Ok(())
            }

            ClientMessage::LeaveGame { game_id } => self.leave_session(&game_id, identity).await,
        }
    }

    async fn reveal(
        &self,
        handle: &SessionHandle,
        identity: &Identity,
        pos: Position,
    ) -> GameResult<()> {
        let mut session = handle.lock().await;
        let update = session.reveal(identity, pos, &mut rand::thread_rng())?;
        session.broadcast(&ServerMessage::GameUpdate(update));
        Ok(())
    }

    async fn current_session_id(&self, identity: &Identity) -> Option<String> {
        let handle = self.registry.resolve(identity).await?;
        let session = handle.lock().await;
        Some(session.id().to_string())
    }

    /// Drops `identity` from the game it played before. Called only once the
    /// new membership exists.
    async fn leave_previous(&self, previous: Option<String>, identity: &Identity) {
        let Some(previous) = previous else {
            return;
        };
        if let Err(e) = self.leave_session(&previous, identity).await {
            warn!("Failed to remove {} from previous game {}: {}", identity, previous, e);
        }
    }

    async fn leave_session(&self, session_id: &str, identity: &Identity) -> GameResult<()> {
        match self.registry.leave(session_id, identity).await? {
            Departure::Left => {
                debug!("{} left game {}", identity, session_id);
            }
            Departure::Terminated(termination) => {
                info!("Host {} left game {}, terminating", identity, session_id);
                self.finish_terminations(vec![termination]).await;
            }
        }
        Ok(())
    }

    /// Kills the sessions' bots, gives the termination notices time to reach
    /// the wire and then drops the sessions.
    async fn finish_terminations(&self, terminations: Vec<Termination>) {
        if terminations.is_empty() {
            return;
        }

        for termination in &terminations {
            self.supervisor.terminate_all(&termination.bots).await;
        }
        if terminations.iter().any(|t| t.notified > 0) {
            tokio::time::sleep(self.flush_delay).await;
        }
        for termination in &terminations {
            self.registry.discard(&termination.session_id).await;
            info!(
                "Game {} closed ({:?}, {} notified, {} bots killed)",
                termination.session_id,
                termination.reason,
                termination.notified,
                termination.bots.len()
            );
        }
    }

    /// Handles a dropped connection.
    pub async fn disconnect(&self, connection: &ClientConnection) {
        let identity = connection.identity();
        info!("Connection {} ({}) closed", connection.id, identity);

        let Some(handle) = self.registry.resolve(identity).await else {
            return;
        };

        let (session_id, departs) = {
            let session = handle.lock().await;
            let owns_connection = session
                .participant(identity)
                .and_then(|p| p.connection.as_ref())
                .is_some_and(|c| c.id == connection.id);
            let host_departure =
                session.mode() == GameMode::Competitive && session.is_host(identity);
            (
                session.id().to_string(),
                owns_connection && (identity.is_anonymous() || host_departure),
            )
        };

        if departs {
            if let Err(e) = self.leave_session(&session_id, identity).await {
                warn!("Failed to remove {} from game {}: {}", identity, session_id, e);
            }
        } else if self.registry.detach(identity, connection.id).await {
            debug!("{} detached from game {}", identity, session_id);
        }
    }

    /// Terminates idle sessions; returns how many were evicted.
    pub async fn evict_stale(&self, max_idle: Duration) -> usize {
        let evicted = self.registry.evict_stale(max_idle).await;
        let count = evicted.len();
        self.finish_terminations(evicted).await;
        count
    }

    /// Terminates every session and kills every bot process.
    pub async fn shutdown(&self) {
        let terminated = self.registry.terminate_all().await;
        info!("Shutting down {} games", terminated.len());
        self.finish_terminations(terminated).await;
        self.supervisor.shutdown().await;
    }
}
