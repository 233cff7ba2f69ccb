pub mod board;
pub mod error;
pub mod protocol;

pub use board::{
    neighbours, Board, BoardConfig, BoardState, Cell, Difficulty, Position, RevealOutcome, Ruleset,
    MAX_DIMENSION,
};
pub use error::{GameError, GameResult};
pub use protocol::{
    CellUpdate, CellView, ClientMessage, FlagUpdate, GameMode, GameSnapshot, GameStatus,
    GameUpdate, ParticipantInfo, ServerMessage, TerminationReason, VictoryRule,
};

/// Query parameter carrying the authentication token or bot ticket.
pub const TOKEN_PARAM: &str = "token";
