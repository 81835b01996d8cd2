use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All four directions, in `[Up, Down, Left, Right]` order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(s)
    }
}

impl FromStr for Move {
    type Err = EngineError;

    /// Accepts direction names, WASD and arrow key names (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "w" | "arrowup" => Ok(Move::Up),
            "down" | "s" | "arrowdown" => Ok(Move::Down),
            "left" | "a" | "arrowleft" => Ok(Move::Left),
            "right" | "d" | "arrowright" => Ok(Move::Right),
            _ => Err(EngineError::InvalidDirection(s.to_string())),
        }
    }
}

pub type Tile = u64;
pub type Score = u64;

/// Side length used when no size is given.
pub const DEFAULT_SIZE: usize = 4;

/// Largest accepted side length.
pub const MAX_SIZE: usize = 64;

/// Tile value that surfaces the "you reached 2048" signal.
pub const WIN_TILE: Tile = 2048;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid direction: {0:?}")]
    InvalidDirection(String),
    #[error("board size must be between 2 and 64, got {0}")]
    InvalidSize(usize),
    #[error("tile value {0} is not a power of two >= 2")]
    InvalidTile(u64),
    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow { row: usize, expected: usize, got: usize },
}

/// Square 2048 board stored row-major; row 0 is the top, column 0 the left.
///
/// Boards are plain values: every operation returns a new `Board` and never
/// mutates its receiver. Serialized as nested rows of integers with `0` for
/// an empty cell.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Tile>>", into = "Vec<Vec<Tile>>")]
pub struct Board {
    size: usize,
    cells: Vec<Option<Tile>>,
}

/// Outcome of [`make_move`]: the new board, the accumulated score and
/// whether anything on the board moved or merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    pub board: Board,
    pub score: Score,
    pub changed: bool,
}

impl Board {
    /// An empty board with side `size`.
    pub fn empty(size: usize) -> Result<Self, EngineError> {
        if !(2..=MAX_SIZE).contains(&size) {
            return Err(EngineError::InvalidSize(size));
        }
        let len = size.checked_mul(size).ok_or(EngineError::InvalidSize(size))?;
        Ok(Board { size, cells: vec![None; len] })
    }

    /// An empty board with two random tiles, the start of every game.
    ///
    /// ```
    /// use neon_2048::engine::Board;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let b = Board::initialize(4, &mut rng).unwrap();
    /// assert_eq!(b.tile_count(), 2);
    /// assert!(b.has_any_move_available());
    /// ```
    pub fn initialize<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Result<Self, EngineError> {
        Ok(Board::empty(size)?.with_random_tile(rng).with_random_tile(rng))
    }

    /// Build a board from rows of values, `0` meaning empty.
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Result<Self, EngineError> {
        let size = rows.len();
        if let Some((r, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != size) {
            return Err(EngineError::RaggedRow { row: r, expected: size, got: row.len() });
        }
        let mut board = Board::empty(size)?;
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                board.cells[r * size + c] = match value {
                    0 => None,
                    v if v >= 2 && v.is_power_of_two() => Some(v),
                    v => return Err(EngineError::InvalidTile(v)),
                };
            }
        }
        Ok(board)
    }

    /// Rows of values with `0` for empty cells.
    pub fn rows(&self) -> Vec<Vec<Tile>> {
        self.cells
            .chunks(self.size)
            .map(|row| row.iter().map(|t| t.unwrap_or(0)).collect())
            .collect()
    }

    #[inline]
    pub fn size(&self) -> usize { self.size }

    /// Value at `(row, col)`, `None` when empty or out of range.
    #[inline]
    pub fn tile(&self, row: usize, col: usize) -> Option<Tile> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.cells[row * self.size + col]
    }

    /// Row-major cells.
    #[inline]
    pub fn cells(&self) -> &[Option<Tile>] { &self.cells }

    /// Count the number of empty cells on the board.
    pub fn count_empty(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Count the number of occupied cells.
    pub fn tile_count(&self) -> usize {
        self.cells.len() - self.count_empty()
    }

    /// Return the highest tile value present, 0 on an empty board.
    pub fn highest_tile(&self) -> Tile {
        self.cells.iter().flatten().copied().max().unwrap_or(0)
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a uniformly chosen empty
    /// cell. A full board comes back unchanged.
    ///
    /// ```
    /// use neon_2048::engine::Board;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::empty(4).unwrap().with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 15);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let empty: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| c.is_none().then_some(idx))
            .collect();
        let mut next = self.clone();
        if empty.is_empty() {
            return next;
        }
        let idx = empty[rng.gen_range(0..empty.len())];
        next.cells[idx] = Some(generate_random_tile(rng));
        next
    }

    /// Convenience: like `with_random_tile` but uses thread-local RNG.
    pub fn with_random_tile_thread(&self) -> Self {
        let mut rng = rand::thread_rng();
        self.with_random_tile(&mut rng)
    }

    /// Slide and merge every line toward `dir`. No randomness.
    ///
    /// Returns the new board and the sum of all tiles created by merges.
    ///
    /// ```
    /// use neon_2048::engine::{Board, Move};
    /// let b = Board::from_rows(vec![
    ///     vec![2, 2, 2, 2],
    ///     vec![0, 0, 0, 0],
    ///     vec![0, 0, 0, 0],
    ///     vec![0, 0, 0, 0],
    /// ]).unwrap();
    /// let (moved, gained) = b.shift(Move::Left);
    /// assert_eq!(moved.rows()[0], vec![4, 4, 0, 0]);
    /// assert_eq!(gained, 8);
    /// ```
    pub fn shift(&self, dir: Move) -> (Self, Score) {
        let mut next = self.clone();
        let mut gained = 0;
        for line_idx in 0..self.size {
            let indices = line_indices(self.size, dir, line_idx);
            let line: Vec<Option<Tile>> = indices.iter().map(|&i| self.cells[i]).collect();
            let (slid, line_gain) = slide_line(&line);
            for (&i, value) in indices.iter().zip(slid) {
                next.cells[i] = value;
            }
            gained += line_gain;
        }
        (next, gained)
    }

    /// True while at least one empty cell or one pair of equal orthogonal
    /// neighbours exists.
    pub fn has_any_move_available(&self) -> bool {
        if self.cells.iter().any(Option::is_none) {
            return true;
        }
        let n = self.size;
        for r in 0..n {
            for c in 0..n {
                let v = self.cells[r * n + c];
                if c + 1 < n && self.cells[r * n + c + 1] == v {
                    return true;
                }
                if r + 1 < n && self.cells[(r + 1) * n + c] == v {
                    return true;
                }
            }
        }
        false
    }

    /// Return true if no legal moves remain.
    #[inline]
    pub fn is_game_over(&self) -> bool { !self.has_any_move_available() }

    /// True if any tile is at least `threshold`.
    pub fn has_winning_tile(&self, threshold: Tile) -> bool {
        self.cells.iter().flatten().any(|&v| v >= threshold)
    }
}

impl Default for Board {
    fn default() -> Self {
        Board { size: DEFAULT_SIZE, cells: vec![None; DEFAULT_SIZE * DEFAULT_SIZE] }
    }
}

impl TryFrom<Vec<Vec<Tile>>> for Board {
    type Error = EngineError;
    fn try_from(rows: Vec<Vec<Tile>>) -> Result<Self, Self::Error> { Board::from_rows(rows) }
}

impl From<Board> for Vec<Vec<Tile>> {
    fn from(b: Board) -> Self { b.rows() }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:?})", self.rows())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = "-".repeat(self.size * 8);
        writeln!(f)?;
        for (r, row) in self.cells.chunks(self.size).enumerate() {
            if r > 0 {
                writeln!(f, "{}", separator)?;
            }
            let cells: Vec<String> = row.iter().map(format_val).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

/// Start a fresh board of side `size` using thread-local RNG.
pub fn initialize(size: usize) -> Result<Board, EngineError> {
    let mut rng = rand::thread_rng();
    Board::initialize(size, &mut rng)
}

/// Insert a random tile using thread-local RNG.
pub fn spawn_random_tile(board: &Board) -> Board { board.with_random_tile_thread() }

/// Slide/merge `board` toward `direction` and add the merge gains to `score`.
///
/// Does not spawn; callers insert a tile afterwards when `changed` is true.
pub fn make_move(board: &Board, score: Score, direction: Move) -> MoveResult {
    let (moved, gained) = board.shift(direction);
    let changed = moved != *board;
    MoveResult { board: moved, score: score + gained, changed }
}

/// True if a move in some direction can still change the board.
pub fn has_any_move_available(board: &Board) -> bool { board.has_any_move_available() }

/// True if any tile reached `threshold`.
pub fn has_winning_tile(board: &Board, threshold: Tile) -> bool { board.has_winning_tile(threshold) }

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> Tile { if rng.gen_range(0..10) < 9 { 2 } else { 4 } }

// Cell indices of one line, nearest the target edge first.
fn line_indices(size: usize, dir: Move, line: usize) -> Vec<usize> {
    match dir {
        Move::Left => (0..size).map(|c| line * size + c).collect(),
        Move::Right => (0..size).rev().map(|c| line * size + c).collect(),
        Move::Up => (0..size).map(|r| r * size + line).collect(),
        Move::Down => (0..size).rev().map(|r| r * size + line).collect(),
    }
}

// Compress then merge a line ordered near-edge first. A merged tile is
// consumed together with its partner, so it never merges twice per move.
fn slide_line(line: &[Option<Tile>]) -> (Vec<Option<Tile>>, Score) {
    let tiles: Vec<Tile> = line.iter().flatten().copied().collect();
    let mut out = Vec::with_capacity(line.len());
    let mut gained = 0;
    let mut i = 0;
    while i < tiles.len() {
        if i + 1 < tiles.len() && tiles[i] == tiles[i + 1] {
            let merged = tiles[i] * 2;
            gained += merged;
            out.push(Some(merged));
            i += 2;
        } else {
            out.push(Some(tiles[i]));
            i += 1;
        }
    }
    out.resize(line.len(), None);
    (out, gained)
}

fn format_val(val: &Option<Tile>) -> String {
    match val {
        None => String::from("       "),
        Some(x) => format!("{:^7}", x),
    }
}
