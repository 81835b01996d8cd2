//! Game session: the persisted state plus the `Playing`/`GameOver` machine.
//!
//! A turn is two explicit steps so a front end can animate between them:
//! [`Session::shift`] slides/merges, [`Session::settle`] spawns a tile and
//! re-checks for game over. [`Session::step`] does both at once.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{self as GameEngine, Board, EngineError, Move, Score, Tile, WIN_TILE};

/// Identifier under which 2048 progress is stored.
pub const GAME_ID: &str = "2048";

/// The unit persisted between runs.
///
/// Loading is lenient: missing fields take their defaults and the legacy
/// `totalGames` key is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub board: Board,
    pub score: Score,
    pub best_score: Score,
    #[serde(alias = "totalGames")]
    pub total_games_played: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Playing,
    GameOver,
}

/// Read-only view handed to renderers after every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub board: Board,
    pub score: Score,
    pub best_score: Score,
    pub changed: bool,
    pub is_game_over: bool,
    pub has_winning_tile: bool,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("previous move has not been settled yet")]
    SpawnPending,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    status: Status,
    win_threshold: Tile,
    pending_spawn: bool,
    last_changed: bool,
    unsaved: bool,
}

impl Session {
    /// Start a fresh game on a `size` x `size` board.
    pub fn new<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Result<Self, SessionError> {
        let board = Board::initialize(size, rng)?;
        Ok(Self {
            state: SessionState { board, ..SessionState::default() },
            status: Status::Playing,
            win_threshold: WIN_TILE,
            pending_spawn: false,
            last_changed: false,
            unsaved: true,
        })
    }

    /// Resume from saved progress.
    ///
    /// A saved state without tiles keeps its record and starts a new board of
    /// the same size. A saved board with no moves left resumes as `GameOver`.
    pub fn restore<R: Rng + ?Sized>(saved: SessionState, rng: &mut R) -> Self {
        let mut state = saved;
        state.best_score = state.best_score.max(state.score);
        let mut session = Self {
            state,
            status: Status::Playing,
            win_threshold: WIN_TILE,
            pending_spawn: false,
            last_changed: false,
            unsaved: false,
        };
        if session.state.board.tile_count() == 0 {
            session.start_board(rng);
            session.unsaved = false;
        } else if session.state.board.is_game_over() {
            session.status = Status::GameOver;
        }
        debug!(
            "restored session: score={} best={} status={:?}",
            session.state.score, session.state.best_score, session.status
        );
        session
    }

    /// Override the tile value that raises `has_winning_tile`.
    pub fn with_win_threshold(mut self, threshold: Tile) -> Self {
        self.win_threshold = threshold;
        self
    }

    #[inline]
    pub fn state(&self) -> &SessionState { &self.state }

    #[inline]
    pub fn board(&self) -> &Board { &self.state.board }

    #[inline]
    pub fn status(&self) -> Status { self.status }

    #[inline]
    pub fn is_game_over(&self) -> bool { self.status == Status::GameOver }

    /// True when the last `shift` changed the board and no tile was spawned yet.
    #[inline]
    pub fn is_spawn_pending(&self) -> bool { self.pending_spawn }

    #[inline]
    pub fn has_unsaved_changes(&self) -> bool { self.unsaved }

    /// Record that the current state has been persisted.
    pub fn mark_saved(&mut self) { self.unsaved = false; }

    /// Slide/merge toward `dir` without spawning.
    ///
    /// Returns whether the board changed. Ignored once the game is over.
    pub fn shift(&mut self, dir: Move) -> Result<bool, SessionError> {
        if self.pending_spawn {
            return Err(SessionError::SpawnPending);
        }
        if self.is_game_over() {
            self.last_changed = false;
            return Ok(false);
        }
        let res = GameEngine::make_move(&self.state.board, self.state.score, dir);
        self.last_changed = res.changed;
        if res.changed {
            self.state.board = res.board;
            self.state.score = res.score;
            if self.state.score > self.state.best_score {
                self.state.best_score = self.state.score;
            }
            self.pending_spawn = true;
            self.unsaved = true;
        }
        Ok(res.changed)
    }

    /// Finish the turn started by `shift`: spawn a tile and check for game over.
    ///
    /// Does nothing beyond returning a snapshot when no spawn is pending.
    pub fn settle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Snapshot {
        if self.pending_spawn {
            self.pending_spawn = false;
            self.state.board = self.state.board.with_random_tile(rng);
            if !self.state.board.has_any_move_available() {
                self.status = Status::GameOver;
                self.state.total_games_played += 1;
                debug!(
                    "game over: score={} highest={}",
                    self.state.score,
                    self.state.board.highest_tile()
                );
            }
        }
        self.snapshot()
    }

    /// One complete turn: `shift` then `settle`.
    ///
    /// ```
    /// use neon_2048::engine::Move;
    /// use neon_2048::session::Session;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let mut s = Session::new(4, &mut rng).unwrap();
    /// let snap = s.step(Move::Left, &mut rng).unwrap();
    /// assert!(!snap.is_game_over);
    /// ```
    pub fn step<R: Rng + ?Sized>(&mut self, dir: Move, rng: &mut R) -> Result<Snapshot, SessionError> {
        self.shift(dir)?;
        Ok(self.settle(rng))
    }

    /// Start a new game, keeping best score and games played.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.start_board(rng);
    }

    /// Forget best score and games played, then start a new game.
    pub fn clear_record<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.state.best_score = 0;
        self.state.total_games_played = 0;
        self.start_board(rng);
        self.unsaved = false;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            board: self.state.board.clone(),
            score: self.state.score,
            best_score: self.state.best_score,
            changed: self.last_changed,
            is_game_over: self.is_game_over(),
            has_winning_tile: self.state.board.has_winning_tile(self.win_threshold),
        }
    }

    fn start_board<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let size = self.state.board.size();
        self.state.board = Board::empty(size)
            .unwrap_or_default()
            .with_random_tile(rng)
            .with_random_tile(rng);
        self.state.score = 0;
        self.status = Status::Playing;
        self.pending_spawn = false;
        self.last_changed = false;
        self.unsaved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn board(rows: [[Tile; 4]; 4]) -> Board {
        Board::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    fn session_with(board: Board, score: Score, best: Score) -> Session {
        let mut rng = StdRng::seed_from_u64(0);
        Session::restore(
            SessionState { board, score, best_score: best, total_games_played: 3 },
            &mut rng,
        )
    }

    #[test]
    fn new_session_starts_playing() {
        let mut rng = StdRng::seed_from_u64(1);
        let s = Session::new(4, &mut rng).unwrap();
        assert_eq!(s.status(), Status::Playing);
        assert_eq!(s.board().tile_count(), 2);
        assert_eq!(s.state().score, 0);
        assert!(s.snapshot().board.has_any_move_available());
        assert!(matches!(Session::new(0, &mut rng), Err(SessionError::Engine(EngineError::InvalidSize(0)))));
    }

    #[test]
    fn step_spawns_and_scores() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut s = session_with(board([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]), 0, 0);
        let snap = s.step(Move::Left, &mut rng).unwrap();
        assert!(snap.changed);
        assert_eq!(snap.score, 4);
        assert_eq!(snap.best_score, 4);
        assert_eq!(snap.board.tile_count(), 2);
        assert_eq!(snap.board.tile(0, 0), Some(4));
        assert!(s.has_unsaved_changes());
    }

    #[test]
    fn noop_move_does_not_spawn() {
        let mut rng = StdRng::seed_from_u64(3);
        let b = board([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let mut s = session_with(b.clone(), 12, 40);
        let snap = s.step(Move::Left, &mut rng).unwrap();
        assert!(!snap.changed);
        assert_eq!(snap.board, b);
        assert_eq!(snap.score, 12);
        assert_eq!(snap.best_score, 40);
        assert!(!s.has_unsaved_changes());
    }

    #[test]
    fn shift_twice_without_settle_is_rejected() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut s = session_with(board([[0, 0, 0, 2], [0; 4], [0; 4], [0; 4]]), 0, 0);
        assert_eq!(s.shift(Move::Left), Ok(true));
        assert!(s.is_spawn_pending());
        assert_eq!(s.shift(Move::Right), Err(SessionError::SpawnPending));
        let snap = s.settle(&mut rng);
        assert_eq!(snap.board.tile_count(), 2);
        assert!(!s.is_spawn_pending());
        // A settle with nothing pending leaves the board alone
        assert_eq!(s.settle(&mut rng).board, snap.board);
    }

    #[test]
    fn last_spawn_can_end_the_game() {
        // One gap left; whatever lands there, nothing can merge
        let b = board([[2, 4, 2, 4], [4, 2, 4, 2], [8, 4, 2, 4], [16, 32, 16, 0]]);
        let mut s = session_with(b, 100, 100);
        let mut rng = StdRng::seed_from_u64(5);
        let snap = s.step(Move::Right, &mut rng).unwrap();
        assert!(snap.changed);
        assert!(snap.is_game_over);
        assert_eq!(s.status(), Status::GameOver);
        assert_eq!(s.state().total_games_played, 4);

        // Further input is ignored and the counter does not move again
        let snap = s.step(Move::Up, &mut rng).unwrap();
        assert!(!snap.changed);
        assert_eq!(s.state().total_games_played, 4);
    }

    #[test]
    fn full_board_with_pair_keeps_playing() {
        let b = board([[2, 2, 4, 8], [4, 8, 16, 32], [2, 4, 8, 16], [4, 2, 4, 2]]);
        let s = session_with(b, 0, 0);
        assert_eq!(s.status(), Status::Playing);
    }

    #[test]
    fn restore_dead_board_is_game_over() {
        let b = board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        let s = session_with(b, 10, 5);
        assert!(s.is_game_over());
        assert_eq!(s.state().best_score, 10);
        assert_eq!(s.state().total_games_played, 3);
    }

    #[test]
    fn restore_without_board_starts_fresh() {
        let mut rng = StdRng::seed_from_u64(6);
        let saved: SessionState = serde_json::from_str(r#"{"bestScore": 512, "totalGames": 7}"#).unwrap();
        let s = Session::restore(saved, &mut rng);
        assert_eq!(s.board().tile_count(), 2);
        assert_eq!(s.state().best_score, 512);
        assert_eq!(s.state().total_games_played, 7);
        assert!(!s.has_unsaved_changes());
    }

    #[test]
    fn winning_tile_does_not_stop_play() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut s = session_with(board([[1024, 1024, 0, 0], [0; 4], [0; 4], [0; 4]]), 0, 0);
        let snap = s.step(Move::Left, &mut rng).unwrap();
        assert!(snap.has_winning_tile);
        assert!(!snap.is_game_over);
        let snap = s.step(Move::Right, &mut rng).unwrap();
        assert!(snap.changed);
        assert!(snap.has_winning_tile);
    }

    #[test]
    fn custom_win_threshold() {
        let s = session_with(board([[64, 0, 0, 0], [0; 4], [0; 4], [0; 4]]), 0, 0).with_win_threshold(64);
        assert!(s.snapshot().has_winning_tile);
    }

    #[test]
    fn reset_keeps_record_and_clear_drops_it() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut s = session_with(board([[8, 8, 0, 0], [0; 4], [0; 4], [0; 4]]), 200, 300);
        s.reset(&mut rng);
        assert_eq!(s.state().score, 0);
        assert_eq!(s.state().best_score, 300);
        assert_eq!(s.state().total_games_played, 3);
        assert_eq!(s.board().tile_count(), 2);

        s.clear_record(&mut rng);
        assert_eq!(s.state().best_score, 0);
        assert_eq!(s.state().total_games_played, 0);
        assert_eq!(s.status(), Status::Playing);
    }

    #[test]
    fn best_score_tracks_running_score() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut s = session_with(board([[4, 4, 0, 0], [2, 2, 0, 0], [0; 4], [0; 4]]), 30, 32);
        let snap = s.step(Move::Left, &mut rng).unwrap();
        assert_eq!(snap.score, 42);
        assert_eq!(snap.best_score, 42);
    }

    #[test]
    fn random_games_reach_game_over() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut s = Session::new(4, &mut rng).unwrap();
        let mut turns = 0;
        while !s.is_game_over() && turns < 20_000 {
            let dir = Move::ALL[rng.gen_range(0..4)];
            let before = s.state().score;
            let snap = s.step(dir, &mut rng).unwrap();
            assert!(snap.score >= before);
            assert!(snap.best_score >= snap.score);
            turns += 1;
        }
        assert!(s.is_game_over());
        assert_eq!(s.state().total_games_played, 1);
        assert!(s.board().is_game_over());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let s = session_with(board([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]), 0, 0);
        let json = serde_json::to_value(s.snapshot()).unwrap();
        assert_eq!(json["bestScore"], 0);
        assert_eq!(json["isGameOver"], false);
        assert_eq!(json["hasWinningTile"], false);
        assert_eq!(json["board"][0][0], 2);
    }
}
