//! The bot's local picture of its game and its move selection.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{CellView, GameMode, GameSnapshot, GameStatus, GameUpdate, Position};

/// Board view mirrored from the server, updated from snapshots and deltas.
#[derive(Debug, Clone)]
pub struct BotGameState {
    identity: String,
    game_id: Option<String>,
    mode: GameMode,
    status: GameStatus,
    width: usize,
    height: usize,
    board: Vec<Vec<CellView>>,
    turn: Option<String>,
}

impl BotGameState {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            game_id: None,
            mode: GameMode::Competitive,
            status: GameStatus::Draft,
            width: 0,
            height: 0,
            board: Vec::new(),
            turn: None,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn set_identity(&mut self, identity: impl Into<String>) {
        self.identity = identity.into();
    }

    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished() || self.status == GameStatus::Terminated
    }

    pub fn apply_snapshot(&mut self, snapshot: &GameSnapshot) {
        self.game_id = Some(snapshot.game_id.clone());
        self.mode = snapshot.mode;
        self.status = snapshot.status;
        self.width = snapshot.width;
        self.height = snapshot.height;
        self.board = snapshot.board.clone();
        self.turn = snapshot.turn.clone();
    }

    pub fn apply_update(&mut self, update: &GameUpdate) {
        for change in &update.cells {
            if let Some(cell) = self.board.get_mut(change.y).and_then(|row| row.get_mut(change.x)) {
                *cell = change.cell;
            }
        }
        self.status = update.status;
        self.turn = update.turn.clone();
    }

    pub fn is_my_turn(&self) -> bool {
        if self.status != GameStatus::Playing && self.status != GameStatus::Draft {
            return false;
        }
        match self.mode {
            GameMode::Solo => true,
            GameMode::Competitive => self.turn.as_deref() == Some(self.identity.as_str()),
        }
    }

    fn cell(&self, pos: Position) -> Option<CellView> {
        self.board.get(pos.y).and_then(|row| row.get(pos.x)).copied()
    }

    fn neighbours(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        let (x, y) = (pos.x as i64, pos.y as i64);
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (x + dx, y + dy)))
            .filter(move |&(nx, ny)| {
                (nx, ny) != (x, y)
                    && nx >= 0
                    && ny >= 0
                    && (nx as usize) < self.width
                    && (ny as usize) < self.height
            })
            .map(|(nx, ny)| Position::new(nx as usize, ny as usize))
    }

    fn hidden_cells(&self) -> Vec<Position> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Position::new(x, y)))
            .filter(|&pos| matches!(self.cell(pos), Some(CellView::Hidden { flagged: false })))
            .collect()
    }

    /// Hidden cells that must be mines: a number whose unrevealed
    /// neighbours exactly cover the mines it still has unaccounted for.
    pub fn certain_mines(&self) -> Vec<Position> {
        let mut certain = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = Position::new(x, y);
                let Some(CellView::Revealed { adjacent }) = self.cell(pos) else {
                    continue;
                };
                if adjacent == 0 {
                    continue;
                }

                let mut hidden = Vec::new();
                let mut found = 0;
                for n in self.neighbours(pos) {
                    match self.cell(n) {
                        Some(CellView::Hidden { .. }) => hidden.push(n),
                        Some(CellView::Mine) => found += 1,
                        _ => {}
                    }
                }

                let missing = usize::from(adjacent).saturating_sub(found);
                if missing > 0 && hidden.len() == missing {
                    for n in hidden {
                        if !certain.contains(&n) {
                            certain.push(n);
                        }
                    }
                }
            }
        }
        certain
    }

    /// A provable mine if there is one, otherwise a random hidden cell.
    pub fn choose_move<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Position> {
        if let Some(pos) = self.certain_mines().into_iter().next() {
            return Some(pos);
        }
        self.hidden_cells().choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::CellUpdate;
    use std::collections::BTreeMap;

    fn hidden() -> CellView {
        CellView::Hidden { flagged: false }
    }

    fn snapshot(board: Vec<Vec<CellView>>, turn: Option<&str>) -> GameSnapshot {
        GameSnapshot {
            game_id: "ABC234".into(),
            mode: GameMode::Competitive,
            status: GameStatus::Playing,
            width: board[0].len(),
            height: board.len(),
            mines: 3,
            mines_remaining: 3,
            time_elapsed: 0,
            board,
            participants: Vec::new(),
            host: "alice".into(),
            scores: BTreeMap::new(),
            turn: turn.map(str::to_string),
            winners: Vec::new(),
        }
    }

    #[test]
    fn test_corner_number_proves_mine() {
        // 1 in the corner with a single hidden neighbour left.
        let board = vec![
            vec![CellView::Revealed { adjacent: 1 }, CellView::Revealed { adjacent: 1 }, hidden()],
            vec![CellView::Revealed { adjacent: 1 }, hidden(), hidden()],
            vec![hidden(), hidden(), hidden()],
        ];
        let mut state = BotGameState::new("bot-1");
        state.apply_snapshot(&snapshot(board, Some("bot-1")));

        assert_eq!(state.certain_mines(), vec![Position::new(1, 1)]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(state.choose_move(&mut rng), Some(Position::new(1, 1)));
    }

    #[test]
    fn test_found_mines_are_subtracted() {
        let board = vec![
            vec![CellView::Mine, CellView::Revealed { adjacent: 2 }, hidden()],
            vec![
                CellView::Revealed { adjacent: 1 },
                CellView::Revealed { adjacent: 2 },
                CellView::Revealed { adjacent: 1 },
            ],
        ];
        let mut state = BotGameState::new("bot-1");
        state.apply_snapshot(&snapshot(board, Some("bot-1")));
        assert_eq!(state.certain_mines(), vec![Position::new(2, 0)]);
    }

    #[test]
    fn test_random_fallback_only_picks_hidden_cells() {
        let board = vec![
            vec![CellView::Revealed { adjacent: 0 }, hidden()],
            vec![CellView::Hidden { flagged: true }, CellView::Revealed { adjacent: 0 }],
        ];
        let mut state = BotGameState::new("bot-1");
        state.apply_snapshot(&snapshot(board, Some("bot-1")));
        assert!(state.certain_mines().is_empty());

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(state.choose_move(&mut rng), Some(Position::new(1, 0)));
        }
    }

    #[test]
    fn test_turn_tracking() {
        let mut state = BotGameState::new("bot-1");
        state.apply_snapshot(&snapshot(vec![vec![hidden(), hidden()]], Some("alice")));
        assert!(!state.is_my_turn());

        let mut update = GameUpdate {
            game_id: "ABC234".into(),
            cells: vec![CellUpdate {
                x: 0,
                y: 0,
                cell: CellView::Revealed { adjacent: 1 },
            }],
            flag_update: None,
            status: GameStatus::Playing,
            mines_remaining: 1,
            time_elapsed: 1,
            scores: BTreeMap::new(),
            turn: Some("bot-1".into()),
            participants: Vec::new(),
            winners: Vec::new(),
        };
        state.apply_update(&update);
        assert!(state.is_my_turn());
        assert_eq!(state.certain_mines(), vec![Position::new(1, 0)]);

        update.cells.clear();
        update.status = GameStatus::Won;
        update.turn = None;
        state.apply_update(&update);
        assert!(!state.is_my_turn());
        assert!(state.is_finished());
    }

    #[test]
    fn test_out_of_range_updates_are_ignored() {
        let mut state = BotGameState::new("bot-1");
        state.apply_snapshot(&snapshot(vec![vec![hidden()]], None));
        state.apply_update(&GameUpdate {
            game_id: "ABC234".into(),
            cells: vec![CellUpdate {
                x: 5,
                y: 5,
                cell: CellView::Mine,
            }],
            flag_update: None,
            status: GameStatus::Playing,
            mines_remaining: 0,
            time_elapsed: 0,
            scores: BTreeMap::new(),
            turn: None,
            participants: Vec::new(),
            winners: Vec::new(),
        });
        assert_eq!(state.cell(Position::new(0, 0)), Some(hidden()));
    }
}
