//! Wire protocol between clients (humans and bots) and the server.
//!
//! Every message is one JSON object, internally tagged by `type`.

use crate::board::{BoardConfig, Difficulty, Position};
use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Solo,
    Competitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Draft,
    Playing,
    Won,
    Lost,
    Terminated,
}

impl GameStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, GameStatus::Won | GameStatus::Lost)
    }
}

/// How a competitive game is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryRule {
    /// Play until every mine is found.
    #[default]
    AllMines,
    /// Stop as soon as one score exceeds half of the mines.
    Majority,
}

/// What a client may see of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CellView {
    Hidden { flagged: bool },
    Revealed { adjacent: u8 },
    Mine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    pub x: usize,
    pub y: usize,
    pub cell: CellView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagUpdate {
    pub x: usize,
    pub y: usize,
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub identity: String,
    pub display_name: String,
    pub is_bot: bool,
    pub connected: bool,
}

/// Full state sent on restore and after `new_game`/`join_game`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub mode: GameMode,
    pub status: GameStatus,
    pub width: usize,
    pub height: usize,
    pub mines: usize,
    pub mines_remaining: i64,
    pub time_elapsed: u64,
    pub board: Vec<Vec<CellView>>,
    pub participants: Vec<ParticipantInfo>,
    pub host: String,
    pub scores: BTreeMap<String, u32>,
    pub turn: Option<String>,
    pub winners: Vec<String>,
}

/// Incremental change broadcast after an accepted operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameUpdate {
    pub game_id: String,
    pub cells: Vec<CellUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_update: Option<FlagUpdate>,
    pub status: GameStatus,
    pub mines_remaining: i64,
    pub time_elapsed: u64,
    pub scores: BTreeMap<String, u32>,
    pub turn: Option<String>,
    pub participants: Vec<ParticipantInfo>,
    pub winners: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    HostLeft,
    Evicted,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    NewGame {
        #[serde(default)]
        mode: GameMode,
        #[serde(default)]
        difficulty: Option<Difficulty>,
        #[serde(default)]
        config: Option<BoardConfig>,
        #[serde(default)]
        victory: Option<VictoryRule>,
        #[serde(default)]
        first_move: Option<Position>,
    },
    JoinGame {
        game_id: String,
    },
    Reveal {
        x: usize,
        y: usize,
    },
    Flag {
        x: usize,
        y: usize,
    },
    SummonBot {
        game_id: String,
    },
    KickPlayer {
        target_id: String,
    },
    LeaveGame {
        game_id: String,
    },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, GameError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Board parameters requested by a `new_game`; a custom config wins.
    pub fn board_config(
        difficulty: Option<Difficulty>,
        config: Option<BoardConfig>,
    ) -> BoardConfig {
        config.unwrap_or_else(|| difficulty.unwrap_or_default().config())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        identity: String,
        display_name: String,
        anonymous: bool,
    },
    GameStart(GameSnapshot),
    GameUpdate(GameUpdate),
    GameTerminated {
        reason: TerminationReason,
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(err: &GameError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        // Every field is a plain string, number, map with string keys or
        // sequence thereof, so encoding cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_new_game_defaults() {
        let msg = ClientMessage::parse(r#"{"type":"new_game"}"#).unwrap();
        match msg {
            ClientMessage::NewGame {
                mode,
                difficulty,
                config,
                victory,
                first_move,
            } => {
                assert_eq!(mode, GameMode::Solo);
                assert_eq!(difficulty, None);
                assert_eq!(config, None);
                assert_eq!(victory, None);
                assert_eq!(first_move, None);
                assert_eq!(
                    ClientMessage::board_config(difficulty, config),
                    BoardConfig::new(9, 9, 10)
                );
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_parse_new_game_with_first_move() {
        let text = r#"{"type":"new_game","mode":"competitive","difficulty":"expert",
            "first_move":{"x":4,"y":4}}"#;
        let msg = ClientMessage::parse(text).unwrap();
        assert_eq!(
            msg,
            ClientMessage::NewGame {
                mode: GameMode::Competitive,
                difficulty: Some(Difficulty::Expert),
                config: None,
                victory: None,
                first_move: Some(Position::new(4, 4)),
            }
        );
    }

    #[test]
    fn test_custom_config_overrides_difficulty() {
        let config =
            ClientMessage::board_config(Some(Difficulty::Expert), Some(BoardConfig::new(5, 5, 3)));
        assert_eq!(config, BoardConfig::new(5, 5, 3));
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let err = ClientMessage::parse(r#"{"type":"teleport","x":1}"#).unwrap_err();
        assert_eq!(err.code(), "invalid_message");
    }

    #[test]
    fn test_server_message_shape() {
        let msg = ServerMessage::GameTerminated {
            reason: TerminationReason::HostLeft,
            message: "host left".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(
            value,
            json!({"type": "game_terminated", "reason": "host_left", "message": "host left"})
        );

        let err = ServerMessage::error(&GameError::SessionFull);
        let value: serde_json::Value = serde_json::from_str(&err.to_json()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "session_full");
    }

    #[test]
    fn test_cell_view_shape() {
        let hidden = serde_json::to_value(CellView::Hidden { flagged: true }).unwrap();
        assert_eq!(hidden, json!({"state": "hidden", "flagged": true}));
        let revealed = serde_json::to_value(CellView::Revealed { adjacent: 3 }).unwrap();
        assert_eq!(revealed, json!({"state": "revealed", "adjacent": 3}));
        assert_eq!(serde_json::to_value(CellView::Mine).unwrap(), json!({"state": "mine"}));
    }

    #[test]
    fn test_update_omits_missing_flag_update() {
        let update = GameUpdate {
            game_id: "g".into(),
            cells: vec![],
            flag_update: None,
            status: GameStatus::Playing,
            mines_remaining: 10,
            time_elapsed: 0,
            scores: BTreeMap::new(),
            turn: None,
            participants: vec![],
            winners: vec![],
        };
        let value = serde_json::to_value(ServerMessage::GameUpdate(update)).unwrap();
        assert_eq!(value["type"], "game_update");
        assert!(value.get("flag_update").is_none());
        assert_eq!(value["status"], "playing");
    }
}
