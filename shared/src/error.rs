//! Error taxonomy shared by the board engine, the server and the bot.
//!
//! Every variant is recoverable at the connection boundary: the server turns
//! it into an `error` message for the offending connection and keeps both the
//! connection and the session alive.

use thiserror::Error;

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("invalid board configuration: {0}")]
    InvalidConfiguration(String),

    #[error("cell ({x}, {y}) is outside the board")]
    OutOfBounds { x: usize, y: usize },

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("game is already over")]
    SessionTerminal,

    #[error("game not found")]
    SessionNotFound,

    #[error("game is full")]
    SessionFull,

    #[error("game cannot be joined: {0}")]
    SessionNotJoinable(String),

    #[error("only the host may {0}")]
    Unauthorized(String),

    #[error("failed to start bot: {0}")]
    BotSpawnFailure(String),

    #[error("bot {0} is not responding")]
    BotNotResponding(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("not in a game")]
    NotInSession,
}

impl GameError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidConfiguration(_) => "invalid_configuration",
            GameError::OutOfBounds { .. } => "out_of_bounds",
            GameError::IllegalMove(_) => "illegal_move",
            GameError::SessionTerminal => "session_terminal",
            GameError::SessionNotFound => "session_not_found",
            GameError::SessionFull => "session_full",
            GameError::SessionNotJoinable(_) => "session_not_joinable",
            GameError::Unauthorized(_) => "unauthorized",
            GameError::BotSpawnFailure(_) => "bot_spawn_failure",
            GameError::BotNotResponding(_) => "bot_not_responding",
            GameError::InvalidMessage(_) => "invalid_message",
            GameError::NotInSession => "not_in_session",
        }
    }
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        GameError::InvalidMessage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_snake_case() {
        let errors = vec![
            GameError::InvalidConfiguration("x".into()),
            GameError::OutOfBounds { x: 1, y: 2 },
            GameError::IllegalMove("x".into()),
            GameError::SessionTerminal,
            GameError::SessionNotFound,
            GameError::SessionFull,
            GameError::SessionNotJoinable("x".into()),
            GameError::Unauthorized("x".into()),
            GameError::BotSpawnFailure("x".into()),
            GameError::BotNotResponding("x".into()),
            GameError::InvalidMessage("x".into()),
            GameError::NotInSession,
        ];

        for err in errors {
            let code = err.code();
            assert!(!code.is_empty());
            assert!(code.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn test_out_of_bounds_message() {
        let err = GameError::OutOfBounds { x: 10, y: 3 };
        assert_eq!(err.to_string(), "cell (10, 3) is outside the board");
    }
}
