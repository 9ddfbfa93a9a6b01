//! Game-session manager (C7): TicTacToe boards, turn ordering, win/draw
//! detection, undo. The spec's design here is fuller than
//! `original_source/states/game.py` (which tracks only board and
//! last_symbol) — turn parity, player binding and undo are built in full.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use crate::error::LsnpError;
use crate::fields::UserId;

pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn as_char(self) -> char {
        match self {
            Symbol::X => 'X',
            Symbol::O => 'O',
        }
    }

    pub fn other(self) -> Symbol {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Symbol {
    type Err = LsnpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "X" => Ok(Symbol::X),
            "O" => Ok(Symbol::O),
            other => Err(LsnpError::InvalidMove(format!(
                "symbol must be X or O, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    board: [char; 9],
    turn: u32,
    last_symbol: Option<Symbol>,
    active: bool,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub board: [char; 9],
    pub turn: u32,
    pub player_x: UserId,
    pub player_o: UserId,
    pub last_symbol: Option<Symbol>,
    pub active: bool,
    prev_state: Option<Snapshot>,
}

impl GameState {
    pub fn symbol_of(&self, user: &UserId) -> Option<Symbol> {
        if &self.player_x == user {
            Some(Symbol::X)
        } else if &self.player_o == user {
            Some(Symbol::O)
        } else {
            None
        }
    }
}

fn winning_line(game: &GameState) -> Option<&'static [usize; 3]> {
    let sym = game.last_symbol?;
    let c = sym.as_char();
    WIN_LINES.iter().find(|line| line.iter().all(|&i| game.board[i] == c))
}

fn is_draw_locked(game: &GameState) -> bool {
    game.board.iter().all(|&c| c != ' ') && winning_line(game).is_none()
}

#[derive(Default)]
struct Inner {
    games: HashMap<String, GameState>,
}

#[derive(Default)]
pub struct GameSessionManager {
    inner: Mutex<Inner>,
}

impl GameSessionManager {
    pub fn new() -> Self {
        GameSessionManager::default()
    }

    /// Starting symbol is always X; `player_x`/`player_o` are assigned from
    /// the inviter's declared SYMBOL.
    pub fn create_game(&self, gid: String, player_x: UserId, player_o: UserId) {
        let mut g = self.inner.lock().unwrap();
        g.games.insert(
            gid,
            GameState {
                board: [' '; 9],
                turn: 1,
                player_x,
                player_o,
                last_symbol: None,
                active: true,
                prev_state: None,
            },
        );
    }

    pub fn find_game(&self, gid: &str) -> Option<GameState> {
        self.inner.lock().unwrap().games.get(gid).cloned()
    }

    pub fn delete_game(&self, gid: &str) {
        self.inner.lock().unwrap().games.remove(gid);
    }

    pub fn deactivate(&self, gid: &str) {
        if let Some(game) = self.inner.lock().unwrap().games.get_mut(gid) {
            game.active = false;
        }
    }

    pub fn get_player_symbol(&self, gid: &str, user: &UserId) -> Option<Symbol> {
        self.inner.lock().unwrap().games.get(gid)?.symbol_of(user)
    }

    pub fn get_turn(&self, gid: &str) -> Option<u32> {
        self.inner.lock().unwrap().games.get(gid).map(|g| g.turn)
    }

    pub fn is_active_game(&self, gid: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .games
            .get(gid)
            .map(|g| g.active)
            .unwrap_or(false)
    }

    pub fn is_player(&self, gid: &str, user: &UserId) -> bool {
        self.get_player_symbol(gid, user).is_some()
    }

    /// Validates player membership, turn parity (X on odd turns, O on even,
    /// 1-indexed), position range and cell occupancy, then applies the move
    /// and snapshots the previous state for `undo`.
    pub fn apply_move(&self, gid: &str, user: &UserId, position: usize) -> Result<(), LsnpError> {
        let mut g = self.inner.lock().unwrap();
        let game = g
            .games
            .get_mut(gid)
            .ok_or_else(|| LsnpError::GameNotFound(gid.to_string()))?;

        if !game.active {
            return Err(LsnpError::InvalidMove("game is no longer active".into()));
        }
        let symbol = game
            .symbol_of(user)
            .ok_or_else(|| LsnpError::InvalidMove("not a player in this game".into()))?;

        let expected = if game.turn % 2 == 1 { Symbol::X } else { Symbol::O };
        if symbol != expected {
            return Err(LsnpError::TurnMismatch);
        }
        if position > 8 {
            return Err(LsnpError::InvalidMove(format!(
                "position {position} is out of range"
            )));
        }
        if game.board[position] != ' ' {
            return Err(LsnpError::InvalidMove(format!(
                "cell {position} is already occupied"
            )));
        }

        game.prev_state = Some(Snapshot {
            board: game.board,
            turn: game.turn,
            last_symbol: game.last_symbol,
            active: game.active,
        });
        game.board[position] = symbol.as_char();
        game.last_symbol = Some(symbol);
        game.turn += 1;
        Ok(())
    }

    /// Restores the previous snapshot; fails if no move has been made since
    /// the last undo.
    pub fn undo(&self, gid: &str) -> Result<(), LsnpError> {
        let mut g = self.inner.lock().unwrap();
        let game = g
            .games
            .get_mut(gid)
            .ok_or_else(|| LsnpError::GameNotFound(gid.to_string()))?;
        let snap = game
            .prev_state
            .take()
            .ok_or_else(|| LsnpError::InvalidMove("nothing to undo".into()))?;
        game.board = snap.board;
        game.turn = snap.turn;
        game.last_symbol = snap.last_symbol;
        game.active = snap.active;
        Ok(())
    }

    pub fn is_winning_move(&self, gid: &str) -> bool {
        let g = self.inner.lock().unwrap();
        g.games.get(gid).map(|game| winning_line(game).is_some()).unwrap_or(false)
    }

    pub fn find_winning_line(&self, gid: &str) -> Option<String> {
        let g = self.inner.lock().unwrap();
        let game = g.games.get(gid)?;
        winning_line(game).map(|line| {
            line.iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
    }

    pub fn is_draw(&self, gid: &str) -> bool {
        let g = self.inner.lock().unwrap();
        g.games.get(gid).map(is_draw_locked).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserId {
        format!("{name}@10.0.0.1").parse().unwrap()
    }

    #[test]
    fn o_cannot_move_first() {
        let mgr = GameSessionManager::new();
        mgr.create_game("g1".into(), user("a"), user("b"));
        let err = mgr.apply_move("g1", &user("b"), 0).unwrap_err();
        assert!(matches!(err, LsnpError::TurnMismatch));
    }

    #[test]
    fn diagonal_first_row_win_is_detected() {
        let mgr = GameSessionManager::new();
        let a = user("a");
        let b = user("b");
        mgr.create_game("g7".into(), a.clone(), b.clone());
        mgr.apply_move("g7", &a, 0).unwrap();
        mgr.apply_move("g7", &b, 4).unwrap();
        mgr.apply_move("g7", &a, 1).unwrap();
        mgr.apply_move("g7", &b, 8).unwrap();
        mgr.apply_move("g7", &a, 2).unwrap();
        assert!(mgr.is_winning_move("g7"));
        assert_eq!(mgr.find_winning_line("g7").unwrap(), "0,1,2");
    }

    #[test]
    fn moves_after_a_win_are_rejected_once_deactivated() {
        let mgr = GameSessionManager::new();
        let a = user("a");
        let b = user("b");
        mgr.create_game("g7".into(), a.clone(), b.clone());
        mgr.apply_move("g7", &a, 0).unwrap();
        mgr.apply_move("g7", &b, 4).unwrap();
        mgr.apply_move("g7", &a, 1).unwrap();
        mgr.apply_move("g7", &b, 8).unwrap();
        mgr.apply_move("g7", &a, 2).unwrap();
        mgr.deactivate("g7");
        assert!(mgr.apply_move("g7", &b, 5).is_err());
    }

    #[test]
    fn undo_restores_board_turn_and_last_symbol_exactly() {
        let mgr = GameSessionManager::new();
        let a = user("a");
        let b = user("b");
        mgr.create_game("g1".into(), a.clone(), b.clone());
        mgr.apply_move("g1", &a, 0).unwrap();
        mgr.undo("g1").unwrap();
        let game = mgr.find_game("g1").unwrap();
        assert_eq!(game.board, [' '; 9]);
        assert_eq!(game.turn, 1);
        assert_eq!(game.last_symbol, None);
    }
}
