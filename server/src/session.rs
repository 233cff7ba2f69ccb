//! One game instance: the board plus everything the server tracks about the
//! people (and bots) playing on it.
//!
//! A `Session` is always accessed through the registry's per-session mutex,
//! so every method here runs with exclusive access. Broadcasts are queued on
//! unbounded channels while that lock is held, which keeps the order of
//! deltas identical for every participant.

use crate::auth::Identity;
use log::{debug, info};
use rand::Rng;
use shared::{
    Board, BoardConfig, BoardState, CellUpdate, FlagUpdate, GameError, GameMode, GameResult,
    GameSnapshot, GameStatus, GameUpdate, ParticipantInfo, Position, Ruleset, ServerMessage,
    VictoryRule,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub type ConnectionId = u64;
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// Handle to one live connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionRef {
    pub id: ConnectionId,
    sender: Outbound,
}

impl ConnectionRef {
    pub fn new(id: ConnectionId, sender: Outbound) -> Self {
        Self { id, sender }
    }

    /// Queues a message; returns false once the connection is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub identity: Identity,
    pub display_name: String,
    pub is_bot: bool,
    pub connection: Option<ConnectionRef>,
}

impl Participant {
    pub fn human(
        identity: Identity,
        display_name: impl Into<String>,
        connection: ConnectionRef,
    ) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            is_bot: false,
            connection: Some(connection),
        }
    }

    /// Bots start disconnected until their worker process dials in.
    pub fn bot(identity: Identity, display_name: impl Into<String>) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            is_bot: true,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            identity: self.identity.key().to_string(),
            display_name: self.display_name.clone(),
            is_bot: self.is_bot,
            connected: self.is_connected(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub mode: GameMode,
    pub board: BoardConfig,
    pub victory: VictoryRule,
    pub max_players: usize,
}

impl SessionSettings {
    pub fn solo(board: BoardConfig) -> Self {
        Self {
            mode: GameMode::Solo,
            board,
            victory: VictoryRule::AllMines,
            max_players: 1,
        }
    }

    pub fn competitive(board: BoardConfig, victory: VictoryRule, max_players: usize) -> Self {
        Self {
            mode: GameMode::Competitive,
            board,
            victory,
            max_players,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    id: String,
    settings: SessionSettings,
    participants: Vec<Participant>,
    host: Identity,
    status: GameStatus,
    board: Option<Board>,
    scores: BTreeMap<String, u32>,
    turn: Option<Identity>,
    created_at: Instant,
    last_activity_at: Instant,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl Session {
    /// Solo sessions start as drafts with no board; competitive sessions get
    /// their board immediately since nobody's first click needs protecting.
    pub fn new<R: Rng + ?Sized>(
        id: String,
        host: Participant,
        settings: SessionSettings,
        rng: &mut R,
    ) -> GameResult<Self> {
        settings.board.validate()?;

        let (status, board) = match settings.mode {
            GameMode::Solo => (GameStatus::Draft, None),
            GameMode::Competitive => {
                let board = Board::generate(settings.board, Ruleset::SeekMines, None, rng)?;
                (GameStatus::Playing, Some(board))
            }
        };

        let mut scores = BTreeMap::new();
        let mut turn = None;
        if settings.mode == GameMode::Competitive {
            scores.insert(host.identity.key().to_string(), 0);
            turn = Some(host.identity.clone());
        }

        let now = Instant::now();
        Ok(Self {
            id,
            settings,
            host: host.identity.clone(),
            participants: vec![host],
            status,
            board,
            scores,
            turn,
            created_at: now,
            last_activity_at: now,
            started_at: None,
            finished_at: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> GameMode {
        self.settings.mode
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn host(&self) -> &Identity {
        &self.host
    }

    pub fn is_host(&self, identity: &Identity) -> bool {
        &self.host == identity
    }

    pub fn is_terminated(&self) -> bool {
        self.status == GameStatus::Terminated
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, identity: &Identity) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.identity == identity)
    }

    pub fn is_participant(&self, identity: &Identity) -> bool {
        self.participant(identity).is_some()
    }

    pub fn scores(&self) -> &BTreeMap<String, u32> {
        &self.scores
    }

    pub fn turn(&self) -> Option<&Identity> {
        self.turn.as_ref()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.settings.max_players
    }

    pub fn has_bot(&self) -> bool {
        self.participants.iter().any(|p| p.is_bot)
    }

    pub fn bot_identities(&self) -> Vec<Identity> {
        self.participants
            .iter()
            .filter(|p| p.is_bot)
            .map(|p| p.identity.clone())
            .collect()
    }

    /// Humans with a live connection. Bots never keep a session alive.
    pub fn connected_humans(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| !p.is_bot && p.is_connected())
            .count()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity_at.elapsed()
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Instant::now();
    }

    /// Seconds since the first reveal, frozen once the game ends.
    pub fn time_elapsed(&self) -> u64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start).as_secs(),
            (Some(start), None) => start.elapsed().as_secs(),
            _ => 0,
        }
    }

    /// True while a competitive game is still in its lobby phase.
    pub fn accepts_joins(&self) -> GameResult<()> {
        if self.settings.mode != GameMode::Competitive {
            return Err(GameError::SessionNotJoinable("solo games cannot be joined".to_string()));
        }
        match self.status {
            GameStatus::Terminated => return Err(GameError::SessionNotFound),
            GameStatus::Won | GameStatus::Lost => {
                return Err(GameError::SessionNotJoinable("game is over".to_string()))
            }
            GameStatus::Draft | GameStatus::Playing => {}
        }
        if self.board.as_ref().is_some_and(Board::has_reveals) {
            return Err(GameError::SessionNotJoinable("game already started".to_string()));
        }
        if self.is_full() {
            return Err(GameError::SessionFull);
        }
        Ok(())
    }

    pub fn add_participant(&mut self, participant: Participant) -> GameResult<()> {
        if self.is_participant(&participant.identity) {
            return Err(GameError::IllegalMove("already in this game".to_string()));
        }
        self.accepts_joins()?;

        info!("{} joined game {}", participant.identity, self.id);
        self.scores.insert(participant.identity.key().to_string(), 0);
        self.participants.push(participant);
        self.touch();
        Ok(())
    }

    /// Removes a participant, handing the turn on if it was theirs.
    pub fn remove_participant(&mut self, identity: &Identity) -> Option<Participant> {
        let index = self.participants.iter().position(|p| &p.identity == identity)?;

        if self.turn.as_ref() == Some(identity) {
            self.turn = if self.participants.len() > 1 {
                let next = (index + 1) % self.participants.len();
                Some(self.participants[next].identity.clone())
            } else {
                None
            };
        }

        let removed = self.participants.remove(index);
        self.scores.remove(identity.key());
        self.touch();
        info!("{} left game {}", identity, self.id);
        Some(removed)
    }

    /// Binds a live connection to a participant, replacing any older one.
    pub fn attach(&mut self, identity: &Identity, connection: ConnectionRef) -> bool {
        match self.participants.iter_mut().find(|p| &p.identity == identity) {
            Some(participant) => {
                participant.connection = Some(connection);
                self.last_activity_at = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Clears the participant's connection if it is still `connection_id`.
    pub fn detach(&mut self, identity: &Identity, connection_id: ConnectionId) -> bool {
        let participant = self.participants.iter_mut().find(|p| &p.identity == identity);
        match participant {
            Some(p) if p.connection.as_ref().is_some_and(|c| c.id == connection_id) => {
                p.connection = None;
                self.last_activity_at = Instant::now();
                true
            }
            _ => false,
        }
    }

    pub fn terminate(&mut self) {
        if self.status != GameStatus::Terminated {
            info!("Game {} terminated", self.id);
            self.status = GameStatus::Terminated;
            self.finished_at.get_or_insert_with(Instant::now);
        }
    }

    fn ensure_playable(&self, identity: &Identity) -> GameResult<()> {
        match self.status {
            GameStatus::Terminated => return Err(GameError::SessionNotFound),
            GameStatus::Won | GameStatus::Lost => return Err(GameError::SessionTerminal),
            GameStatus::Draft | GameStatus::Playing => {}
        }
        if !self.is_participant(identity) {
            return Err(GameError::NotInSession);
        }
        if self.settings.mode == GameMode::Competitive && self.turn.as_ref() != Some(identity) {
            return Err(GameError::IllegalMove("it is not your turn".to_string()));
        }
        Ok(())
    }

    /// Reveals a cell on behalf of `identity`, generating the board first if
    /// this is a draft.
    pub fn reveal<R: Rng + ?Sized>(
        &mut self,
        identity: &Identity,
        pos: Position,
        rng: &mut R,
    ) -> GameResult<GameUpdate> {
        self.ensure_playable(identity)?;

        if self.board.is_none() {
            let board = Board::generate(self.settings.board, Ruleset::Classic, Some(pos), rng)?;
            debug!("Generated board for game {} around ({}, {})", self.id, pos.x, pos.y);
            self.board = Some(board);
            self.status = GameStatus::Playing;
        }
        let board = self.board.as_mut().ok_or(GameError::SessionNotFound)?;

        let outcome = board.reveal(pos)?;
        let board_state = board.state();
        let cells: Vec<CellUpdate> = outcome
            .revealed
            .iter()
            .filter_map(|p| {
                board.view_cell(*p).map(|cell| CellUpdate {
                    x: p.x,
                    y: p.y,
                    cell,
                })
            })
            .collect();

        if !outcome.is_empty() && self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }

        if self.settings.mode == GameMode::Competitive && !outcome.is_empty() {
            if outcome.hit_mine {
                *self.scores.entry(identity.key().to_string()).or_insert(0) += 1;
            } else {
                self.advance_turn(identity);
            }
        }

        match board_state {
            BoardState::Won => self.finish(GameStatus::Won),
            BoardState::Lost => self.finish(GameStatus::Lost),
            BoardState::Playing => {
                if self.majority_reached() {
                    self.finish(GameStatus::Won);
                }
            }
        }

        self.touch();
        Ok(self.update(cells, None))
    }

    pub fn toggle_flag(&mut self, identity: &Identity, pos: Position) -> GameResult<GameUpdate> {
        self.ensure_playable(identity)?;

        let board = self
            .board
            .as_mut()
            .ok_or_else(|| GameError::IllegalMove("reveal a cell before flagging".to_string()))?;
        let flagged = board.toggle_flag(pos)?;
        let cell = board.view_cell(pos);

        self.touch();
        let cells = cell
            .map(|cell| vec![CellUpdate { x: pos.x, y: pos.y, cell }])
            .unwrap_or_default();
        Ok(self.update(
            cells,
            Some(FlagUpdate {
                x: pos.x,
                y: pos.y,
                flagged,
            }),
        ))
    }

    fn advance_turn(&mut self, current: &Identity) {
        if let Some(index) = self.participants.iter().position(|p| &p.identity == current) {
            let next = (index + 1) % self.participants.len();
            self.turn = Some(self.participants[next].identity.clone());
        }
    }

    fn majority_reached(&self) -> bool {
        if self.settings.mode != GameMode::Competitive
            || self.settings.victory != VictoryRule::Majority
        {
            return false;
        }
        let mines = self.settings.board.mines as u32;
        self.scores.values().any(|&score| score * 2 > mines)
    }

    fn finish(&mut self, status: GameStatus) {
        info!("Game {} finished: {:?}", self.id, status);
        self.status = status;
        self.finished_at = Some(Instant::now());
        if self.settings.mode == GameMode::Competitive {
            self.turn = None;
        }
    }

    /// Competitive: top scorers. Solo: the player, if they won.
    pub fn winners(&self) -> Vec<String> {
        match (self.status, self.settings.mode) {
            (GameStatus::Won, GameMode::Solo) => vec![self.host.key().to_string()],
            (GameStatus::Won, GameMode::Competitive) => {
                let best = self.scores.values().copied().max().unwrap_or(0);
                self.scores
                    .iter()
                    .filter(|(_, score)| **score == best)
                    .map(|(id, _)| id.clone())
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn mines_remaining(&self) -> i64 {
        match &self.board {
            Some(board) => board.mines_remaining(),
            None => self.settings.board.mines as i64,
        }
    }

    fn participant_infos(&self) -> Vec<ParticipantInfo> {
        self.participants.iter().map(Participant::info).collect()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let config = self.settings.board;
        let board = match &self.board {
            Some(board) => board.view(),
            None => {
                let hidden = shared::CellView::Hidden { flagged: false };
                vec![vec![hidden; config.width]; config.height]
            }
        };

        GameSnapshot {
            game_id: self.id.clone(),
            mode: self.settings.mode,
            status: self.status,
            width: config.width,
            height: config.height,
            mines: config.mines,
            mines_remaining: self.mines_remaining(),
            time_elapsed: self.time_elapsed(),
            board,
            participants: self.participant_infos(),
            host: self.host.key().to_string(),
            scores: self.scores.clone(),
            turn: self.turn.as_ref().map(|t| t.key().to_string()),
            winners: self.winners(),
        }
    }

    pub fn update(&self, cells: Vec<CellUpdate>, flag_update: Option<FlagUpdate>) -> GameUpdate {
        GameUpdate {
            game_id: self.id.clone(),
            cells,
            flag_update,
            status: self.status,
            mines_remaining: self.mines_remaining(),
            time_elapsed: self.time_elapsed(),
            scores: self.scores.clone(),
            turn: self.turn.as_ref().map(|t| t.key().to_string()),
            participants: self.participant_infos(),
            winners: self.winners(),
        }
    }

    /// Sends to every connected participant.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        self.deliver(self.participants.iter(), message)
    }

    /// Sends to every connected participant except `skip`.
    pub fn broadcast_except(&self, skip: &Identity, message: &ServerMessage) -> usize {
        self.deliver(self.participants.iter().filter(|p| &p.identity != skip), message)
    }

    /// Queues `message` for each recipient; returns how many accepted it.
    fn deliver<'a>(
        &self,
        recipients: impl Iterator<Item = &'a Participant>,
        message: &ServerMessage,
    ) -> usize {
        let mut delivered = 0;
        for participant in recipients {
            if let Some(conn) = &participant.connection {
                if conn.send(message.clone()) {
                    delivered += 1;
                } else {
                    debug!(
                        "Dropped message for closed connection of {} in game {}",
                        participant.identity, self.id
                    );
                }
            }
        }
        delivered
    }

    pub fn send_to(&self, identity: &Identity, message: ServerMessage) -> bool {
        self.participant(identity)
            .and_then(|p| p.connection.as_ref())
            .is_some_and(|conn| conn.send(message))
    }

    /// Broadcasts the current membership without any cell changes.
    pub fn broadcast_membership(&self) {
        self.broadcast(&ServerMessage::GameUpdate(self.update(Vec::new(), None)));
    }
}
