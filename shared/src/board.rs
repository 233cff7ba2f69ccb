//! Board engine: mine placement, reveal with flood fill, flagging and win
//! detection for both the classic rules and the competitive "seek mines"
//! variant.
//!
//! The board is plain data with synchronous methods. It never performs I/O
//! and is only ever mutated through the session that owns it.

use crate::error::{GameError, GameResult};
use crate::protocol::CellView;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Largest accepted width or height.
pub const MAX_DIMENSION: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Dimensions and mine count of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub width: usize,
    pub height: usize,
    pub mines: usize,
}

impl BoardConfig {
    pub fn new(width: usize, height: usize, mines: usize) -> Self {
        Self {
            width,
            height,
            mines,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Checks the parameters that do not depend on where the first click lands.
    pub fn validate(&self) -> GameResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GameError::InvalidConfiguration(
                "width and height must be at least 1".to_string(),
            ));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(GameError::InvalidConfiguration(format!(
                "width and height must be at most {}",
                MAX_DIMENSION
            )));
        }
        if self.mines == 0 {
            return Err(GameError::InvalidConfiguration(
                "at least one mine is required".to_string(),
            ));
        }
        if self.mines >= self.cell_count() {
            return Err(GameError::InvalidConfiguration(format!(
                "{} mines do not fit on a {}x{} board",
                self.mines, self.width, self.height
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Expert,
}

impl Difficulty {
    pub fn config(self) -> BoardConfig {
        match self {
            Difficulty::Beginner => BoardConfig::new(9, 9, 10),
            Difficulty::Intermediate => BoardConfig::new(16, 16, 40),
            Difficulty::Expert => BoardConfig::new(30, 16, 99),
        }
    }
}

/// Which rules decide the end of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ruleset {
    /// Hitting a mine loses; revealing every safe cell wins.
    Classic,
    /// Mines are the goal: revealing one scores and play continues until all
    /// mines have been found.
    SeekMines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    Playing,
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub is_mine: bool,
    pub is_revealed: bool,
    pub is_flagged: bool,
    pub adjacent_mines: u8,
}

/// Result of a single reveal request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevealOutcome {
    /// Every cell that became revealed during this call, in reveal order.
    pub revealed: Vec<Position>,
    /// True when the requested cell was a mine.
    pub hit_mine: bool,
}

impl RevealOutcome {
    pub fn is_empty(&self) -> bool {
        self.revealed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    config: BoardConfig,
    ruleset: Ruleset,
    cells: Vec<Cell>,
    state: BoardState,
    revealed_safe: usize,
    revealed_mines: usize,
    flags: usize,
}

impl Board {
    /// Places `config.mines` mines uniformly at random over every cell except
    /// `safe` and its neighbours.
    pub fn generate<R: Rng + ?Sized>(
        config: BoardConfig,
        ruleset: Ruleset,
        safe: Option<Position>,
        rng: &mut R,
    ) -> GameResult<Self> {
        config.validate()?;

        let excluded: Vec<Position> = match safe {
            Some(pos) => {
                if pos.x >= config.width || pos.y >= config.height {
                    return Err(GameError::OutOfBounds { x: pos.x, y: pos.y });
                }
                let mut zone = neighbours(config, pos);
                zone.push(pos);
                zone
            }
            None => Vec::new(),
        };

        let eligible: Vec<Position> = (0..config.height)
            .flat_map(|y| (0..config.width).map(move |x| Position::new(x, y)))
            .filter(|pos| !excluded.contains(pos))
            .collect();

        if config.mines > eligible.len() {
            return Err(GameError::InvalidConfiguration(format!(
                "{} mines exceed the {} cells available around the first move",
                config.mines,
                eligible.len()
            )));
        }

        let mines: Vec<Position> = eligible
            .choose_multiple(rng, config.mines)
            .copied()
            .collect();

        Self::with_mines(config, ruleset, &mines)
    }

    /// Builds a board with an explicit mine layout.
    pub fn with_mines(
        config: BoardConfig,
        ruleset: Ruleset,
        mines: &[Position],
    ) -> GameResult<Self> {
        let mut board = Self {
            config: BoardConfig { mines: 0, ..config },
            ruleset,
            cells: vec![Cell::default(); config.cell_count()],
            state: BoardState::Playing,
            revealed_safe: 0,
            revealed_mines: 0,
            flags: 0,
        };

        for &pos in mines {
            let idx = board.index(pos)?;
            if board.cells[idx].is_mine {
                return Err(GameError::InvalidConfiguration(format!(
                    "duplicate mine at ({}, {})",
                    pos.x, pos.y
                )));
            }
            board.cells[idx].is_mine = true;
            board.config.mines += 1;
        }

        if board.config.mines == 0 || board.config.mines >= board.cells.len() {
            return Err(GameError::InvalidConfiguration(format!(
                "{} mines on {} cells",
                board.config.mines,
                board.cells.len()
            )));
        }

        for y in 0..config.height {
            for x in 0..config.width {
                let pos = Position::new(x, y);
                let count = neighbours(config, pos)
                    .into_iter()
                    .filter(|n| board.cells[n.y * config.width + n.x].is_mine)
                    .count();
                board.cells[y * config.width + x].adjacent_mines = count as u8;
            }
        }

        Ok(board)
    }

    pub fn config(&self) -> BoardConfig {
        self.config
    }

    pub fn ruleset(&self) -> Ruleset {
        self.ruleset
    }

    pub fn state(&self) -> BoardState {
        self.state
    }

    pub fn width(&self) -> usize {
        self.config.width
    }

    pub fn height(&self) -> usize {
        self.config.height
    }

    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        self.index(pos).ok().map(|idx| &self.cells[idx])
    }

    pub fn flag_count(&self) -> usize {
        self.flags
    }

    pub fn revealed_mines(&self) -> usize {
        self.revealed_mines
    }

    /// True once any cell has been revealed.
    pub fn has_reveals(&self) -> bool {
        self.revealed_safe + self.revealed_mines > 0
    }

    pub fn mines_remaining(&self) -> i64 {
        let subtract = match self.ruleset {
            Ruleset::Classic => self.flags,
            Ruleset::SeekMines => self.revealed_mines,
        };
        self.config.mines as i64 - subtract as i64
    }

    /// Reveals a cell, flood-filling through zero-adjacency cells.
    ///
    /// Already revealed cells yield an empty outcome. Flagged cells are
    /// rejected rather than unflagged.
    pub fn reveal(&mut self, pos: Position) -> GameResult<RevealOutcome> {
        self.ensure_playing()?;
        let idx = self.index(pos)?;

        let cell = self.cells[idx];
        if cell.is_revealed {
            return Ok(RevealOutcome::default());
        }
        if cell.is_flagged {
            return Err(GameError::IllegalMove(format!(
                "cell ({}, {}) is flagged",
                pos.x, pos.y
            )));
        }

        let mut outcome = RevealOutcome::default();
        self.cells[idx].is_revealed = true;
        outcome.revealed.push(pos);

        if cell.is_mine {
            outcome.hit_mine = true;
            self.revealed_mines += 1;
            match self.ruleset {
                Ruleset::Classic => self.state = BoardState::Lost,
                Ruleset::SeekMines => {
                    if self.check_win() {
                        self.state = BoardState::Won;
                    }
                }
            }
            return Ok(outcome);
        }

        self.revealed_safe += 1;
        if cell.adjacent_mines == 0 {
            self.flood_from(pos, &mut outcome.revealed);
        }

        if self.check_win() {
            self.state = BoardState::Won;
        }

        Ok(outcome)
    }

    // Iterative flood fill with an explicit stack.
    fn flood_from(&mut self, origin: Position, revealed: &mut Vec<Position>) {
        let mut stack = neighbours(self.config, origin);

        while let Some(pos) = stack.pop() {
            let idx = pos.y * self.config.width + pos.x;
            let cell = self.cells[idx];
            if cell.is_revealed || cell.is_flagged || cell.is_mine {
                continue;
            }

            self.cells[idx].is_revealed = true;
            self.revealed_safe += 1;
            revealed.push(pos);

            if cell.adjacent_mines == 0 {
                stack.extend(neighbours(self.config, pos));
            }
        }
    }

    /// Inverts the flag on an unrevealed cell and returns the new flag state.
    pub fn toggle_flag(&mut self, pos: Position) -> GameResult<bool> {
        self.ensure_playing()?;
        let idx = self.index(pos)?;

        let cell = &mut self.cells[idx];
        if cell.is_revealed {
            return Err(GameError::IllegalMove(format!(
                "cell ({}, {}) is already revealed",
                pos.x, pos.y
            )));
        }

        cell.is_flagged = !cell.is_flagged;
        if cell.is_flagged {
            self.flags += 1;
        } else {
            self.flags -= 1;
        }
        Ok(cell.is_flagged)
    }

    /// Classic: every safe cell is revealed. Seek mines: every mine is found.
    pub fn check_win(&self) -> bool {
        match self.ruleset {
            Ruleset::Classic => {
                self.revealed_safe == self.cells.len() - self.config.mines
            }
            Ruleset::SeekMines => self.revealed_mines == self.config.mines,
        }
    }

    /// Client-safe view of one cell. Unrevealed mines are never exposed.
    pub fn view_cell(&self, pos: Position) -> Option<CellView> {
        self.cell(pos).map(|cell| {
            if !cell.is_revealed {
                CellView::Hidden {
                    flagged: cell.is_flagged,
                }
            } else if cell.is_mine {
                CellView::Mine
            } else {
                CellView::Revealed {
                    adjacent: cell.adjacent_mines,
                }
            }
        })
    }

    /// Row-major client view of the whole board.
    pub fn view(&self) -> Vec<Vec<CellView>> {
        (0..self.config.height)
            .map(|y| {
                (0..self.config.width)
                    .filter_map(|x| self.view_cell(Position::new(x, y)))
                    .collect()
            })
            .collect()
    }

    fn ensure_playing(&self) -> GameResult<()> {
        match self.state {
            BoardState::Playing => Ok(()),
            BoardState::Won | BoardState::Lost => Err(GameError::SessionTerminal),
        }
    }

    fn index(&self, pos: Position) -> GameResult<usize> {
        if pos.x >= self.config.width || pos.y >= self.config.height {
            return Err(GameError::OutOfBounds { x: pos.x, y: pos.y });
        }
        Ok(pos.y * self.config.width + pos.x)
    }
}

/// In-bounds 8-neighbourhood of `pos`.
pub fn neighbours(config: BoardConfig, pos: Position) -> Vec<Position> {
    let mut result = Vec::with_capacity(8);
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = pos.x as i64 + dx;
            let ny = pos.y as i64 + dy;
            if nx >= 0 && ny >= 0 && (nx as usize) < config.width && (ny as usize) < config.height {
                result.push(Position::new(nx as usize, ny as usize));
            }
        }
    }
    result
}
