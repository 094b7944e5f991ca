use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

use crate::config::EngineConfig;

pub type Tile = u32;
pub type Score = u64;

/// Largest accepted grid side.
pub const MAX_SIZE: usize = 64;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    /// Rows slide for Left/Right, columns for Up/Down.
    #[inline]
    fn along_rows(self) -> bool {
        matches!(self, Move::Left | Move::Right)
    }

    /// True when tiles travel toward the last index of their line.
    #[inline]
    fn toward_index_increasing(self) -> bool {
        matches!(self, Move::Right | Move::Down)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(name)
    }
}

impl FromStr for Move {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "w" => Ok(Move::Up),
            "down" | "s" => Ok(Move::Down),
            "left" | "a" => Ok(Move::Left),
            "right" | "d" => Ok(Move::Right),
            other => Err(EngineError::UnknownMove(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("grid size must be between 2 and 64, got {0}")]
    InvalidSize(usize),
    #[error("win threshold must be a power of two >= 4, got {0}")]
    InvalidWinThreshold(Tile),
    #[error("grid rows must all have the same length as the number of rows")]
    NotSquare,
    #[error("tile value {0} is not a power of two >= 2")]
    InvalidTile(Tile),
    #[error("unknown move {0:?}")]
    UnknownMove(String),
}

#[inline]
fn is_valid_tile(v: Tile) -> bool {
    v == 0 || (v >= 2 && v.is_power_of_two())
}

/// Row-major N x N grid of tile values; `0` is an empty cell.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    size: usize,
    cells: Vec<Tile>,
}

impl Grid {
    /// An all-empty grid of `size` x `size` cells.
    pub fn new(size: usize) -> Result<Self, EngineError> {
        if !(2..=MAX_SIZE).contains(&size) {
            return Err(EngineError::InvalidSize(size));
        }
        Ok(Grid { size, cells: vec![0; size * size] })
    }

    /// Build a grid from explicit rows.
    ///
    /// ```
    /// use merge_2048::engine::Grid;
    /// let g = Grid::from_rows(vec![vec![2, 0], vec![0, 4]]).unwrap();
    /// assert_eq!(g.get(1, 1), 4);
    /// assert!(Grid::from_rows(vec![vec![3, 0], vec![0, 0]]).is_err());
    /// ```
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Result<Self, EngineError> {
        let size = rows.len();
        if !(2..=MAX_SIZE).contains(&size) {
            return Err(EngineError::InvalidSize(size));
        }
        let mut cells = Vec::with_capacity(size * size);
        for row in rows {
            if row.len() != size {
                return Err(EngineError::NotSquare);
            }
            if let Some(&bad) = row.iter().find(|&&v| !is_valid_tile(v)) {
                return Err(EngineError::InvalidTile(bad));
            }
            cells.extend(row);
        }
        Ok(Grid { size, cells })
    }

    #[inline]
    pub fn size(&self) -> usize { self.size }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Tile { self.cells[row * self.size + col] }

    /// All cells, row-major.
    #[inline]
    pub fn cells(&self) -> &[Tile] { &self.cells }

    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> + '_ {
        self.cells.chunks(self.size)
    }

    /// Coordinates `(row, col)` of every empty cell, row-major.
    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == 0)
            .map(|(idx, _)| (idx / self.size, idx % self.size))
            .collect()
    }

    pub fn count_empty(&self) -> usize {
        self.cells.iter().filter(|&&v| v == 0).count()
    }

    /// Highest tile value present, 0 on an empty grid.
    pub fn highest_tile(&self) -> Tile {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Sum of all tile values.
    pub fn tile_sum(&self) -> Score {
        self.cells.iter().map(|&v| v as Score).sum()
    }

    /// Return the grid after sliding/merging in `dir` (no random insert),
    /// together with the merge score that move produced.
    pub fn shifted(&self, dir: Move) -> (Grid, Score) {
        let mut next = self.clone();
        let gained = next.slide(dir);
        (next, gained)
    }

    /// True if sliding in `dir` would change the grid.
    pub fn can_move(&self, dir: Move) -> bool {
        self.shifted(dir).0 != *self
    }

    /// True if any empty cell exists or any two neighbours are equal.
    pub fn has_moves(&self) -> bool {
        if self.cells.contains(&0) {
            return true;
        }
        let n = self.size;
        for row in 0..n {
            for col in 0..n {
                let v = self.get(row, col);
                if v.checked_mul(2).is_none() {
                    continue;
                }
                if col + 1 < n && self.get(row, col + 1) == v {
                    return true;
                }
                if row + 1 < n && self.get(row + 1, col) == v {
                    return true;
                }
            }
        }
        false
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, v: Tile) {
        self.cells[row * self.size + col] = v;
    }

    fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Cell index of position `k` (ascending) within line `line` for `dir`.
    #[inline]
    fn line_index(&self, dir: Move, line: usize, k: usize) -> usize {
        if dir.along_rows() { line * self.size + k } else { k * self.size + line }
    }

    fn slide(&mut self, dir: Move) -> Score {
        let n = self.size;
        let toward_end = dir.toward_index_increasing();
        let mut gained = 0;
        let mut line = Vec::with_capacity(n);
        for l in 0..n {
            line.clear();
            line.extend((0..n).map(|k| self.cells[self.line_index(dir, l, k)]));
            let (merged, score) = compact_and_merge_line(&line, toward_end);
            gained += score;
            for (k, v) in merged.into_iter().enumerate() {
                let idx = self.line_index(dir, l, k);
                self.cells[idx] = v;
            }
        }
        gained
    }
}

/// Compact and merge one row or column.
///
/// `line` is given in ascending index order. When `toward_index_increasing`
/// is false tiles travel toward index 0, otherwise toward the last index.
/// Returns the new line and the score produced by its merges.
///
/// ```
/// use merge_2048::engine::compact_and_merge_line;
/// assert_eq!(compact_and_merge_line(&[2, 2, 2, 0], false), (vec![4, 2, 0, 0], 4));
/// assert_eq!(compact_and_merge_line(&[2, 2, 2, 0], true), (vec![0, 0, 2, 4], 4));
/// ```
pub fn compact_and_merge_line(line: &[Tile], toward_index_increasing: bool) -> (Vec<Tile>, Score) {
    let mut travel: Vec<Tile> = if toward_index_increasing {
        line.iter().rev().copied().collect()
    } else {
        line.to_vec()
    };
    let score = merge_toward_front(&mut travel);
    if toward_index_increasing {
        travel.reverse();
    }
    (travel, score)
}

// Index 0 is the destination end. Single pass: a merged tile never merges again.
// A pair whose double would not fit in a `Tile` stays unmerged.
fn merge_toward_front(line: &mut [Tile]) -> Score {
    let tiles: Vec<Tile> = line.iter().copied().filter(|&v| v != 0).collect();
    let mut score = 0;
    let mut out = 0;
    let mut i = 0;
    while i < tiles.len() {
        let merged = match tiles.get(i + 1) {
            Some(&next) if next == tiles[i] => tiles[i].checked_mul(2),
            _ => None,
        };
        if let Some(merged) = merged {
            line[out] = merged;
            score += merged as Score;
            i += 2;
        } else {
            line[out] = tiles[i];
            i += 1;
        }
        out += 1;
    }
    line[out..].fill(0);
    score
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rows()).finish()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.highest_tile().max(2048).to_string().len() + 2;
        let rule = "-".repeat((width + 1) * self.size - 1);
        for (idx, row) in self.rows().enumerate() {
            if idx > 0 {
                writeln!(f, "{rule}")?;
            }
            let cells: Vec<String> = row.iter().map(|&v| format_val(v, width)).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

fn format_val(val: Tile, width: usize) -> String {
    match val {
        0 => " ".repeat(width),
        x => format!("{x:^width$}"),
    }
}

/// Derived status of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Won,
    Over,
}

/// A tile placed by [`BoardEngine::spawn_tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawn {
    pub row: usize,
    pub col: usize,
    pub value: Tile,
}

/// Owns one game's grid and score.
///
/// The random source is injectable so that games can be replayed from a seed.
pub struct BoardEngine<R: Rng = StdRng> {
    grid: Grid,
    score: Score,
    last_gain: Score,
    win_threshold: Tile,
    rng: R,
}

impl BoardEngine<StdRng> {
    /// Construct an entropy-seeded engine and deal the two opening tiles.
    ///
    /// ```
    /// use merge_2048::engine::BoardEngine;
    /// let engine = BoardEngine::new(4, 2048).unwrap();
    /// assert_eq!(engine.grid().count_empty(), 14);
    /// assert_eq!(engine.score(), 0);
    /// assert!(BoardEngine::new(1, 2048).is_err());
    /// ```
    pub fn new(size: usize, win_threshold: Tile) -> Result<Self, EngineError> {
        let config = EngineConfig { size, win_threshold };
        Self::with_rng(&config, StdRng::from_entropy())
    }
}

impl<R: Rng> BoardEngine<R> {
    /// Construct with a caller-supplied random source, then `reset`.
    pub fn with_rng(config: &EngineConfig, rng: R) -> Result<Self, EngineError> {
        config.validate()?;
        let mut engine = BoardEngine {
            grid: Grid::new(config.size)?,
            score: 0,
            last_gain: 0,
            win_threshold: config.win_threshold,
            rng,
        };
        engine.reset();
        Ok(engine)
    }

    /// Start from an explicit position with score 0. No tiles are spawned.
    pub fn from_grid(grid: Grid, win_threshold: Tile, rng: R) -> Result<Self, EngineError> {
        EngineConfig { size: grid.size(), win_threshold }.validate()?;
        Ok(BoardEngine { grid, score: 0, last_gain: 0, win_threshold, rng })
    }

    #[inline]
    pub fn grid(&self) -> &Grid { &self.grid }

    #[inline]
    pub fn score(&self) -> Score { self.score }

    /// Merge score produced by the most recent `apply_move`.
    #[inline]
    pub fn last_gain(&self) -> Score { self.last_gain }

    #[inline]
    pub fn size(&self) -> usize { self.grid.size() }

    #[inline]
    pub fn win_threshold(&self) -> Tile { self.win_threshold }

    /// Slide and merge every line toward `dir`. Returns whether any cell changed.
    ///
    /// Does not spawn; callers spawn only when this returns true.
    pub fn apply_move(&mut self, dir: Move) -> bool {
        let before = self.grid.clone();
        self.last_gain = self.grid.slide(dir);
        self.score += self.last_gain;
        self.grid != before
    }

    /// Place a 2 (90%) or 4 (10%) in a uniformly chosen empty cell.
    /// No-op returning `None` when the grid is full.
    pub fn spawn_tile(&mut self) -> Option<Spawn> {
        let empty = self.grid.empty_cells();
        if empty.is_empty() {
            return None;
        }
        let (row, col) = empty[self.rng.gen_range(0..empty.len())];
        let value = generate_random_tile(&mut self.rng);
        self.grid.set(row, col, value);
        Some(Spawn { row, col, value })
    }

    /// True iff any cell has reached the win threshold.
    pub fn is_won(&self) -> bool {
        self.grid.cells().iter().any(|&v| v >= self.win_threshold)
    }

    /// True iff the grid is full and no two neighbours are equal.
    pub fn is_over(&self) -> bool {
        !self.grid.has_moves()
    }

    pub fn status(&self) -> GameStatus {
        if self.is_over() {
            GameStatus::Over
        } else if self.is_won() {
            GameStatus::Won
        } else {
            GameStatus::Ongoing
        }
    }

    /// Clear the grid and score, then deal two opening tiles.
    pub fn reset(&mut self) {
        self.grid.clear();
        self.score = 0;
        self.last_gain = 0;
        self.spawn_tile();
        self.spawn_tile();
    }
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> Tile {
    if rng.gen_range(0..10) < 9 { 2 } else { 4 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_from(rows: Vec<Vec<Tile>>) -> BoardEngine<StdRng> {
        let grid = Grid::from_rows(rows).unwrap();
        BoardEngine::from_grid(grid, 2048, StdRng::seed_from_u64(7)).unwrap()
    }

    fn rows_of(engine: &BoardEngine<StdRng>) -> Vec<Vec<Tile>> {
        engine.grid().rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn it_merge_line_toward_front() {
        assert_eq!(compact_and_merge_line(&[0, 0, 0, 0], false), (vec![0, 0, 0, 0], 0));
        assert_eq!(compact_and_merge_line(&[2, 4, 2, 4], false), (vec![2, 4, 2, 4], 0));
        assert_eq!(compact_and_merge_line(&[2, 2, 4, 4], false), (vec![4, 8, 0, 0], 12));
        assert_eq!(compact_and_merge_line(&[2, 0, 0, 2], false), (vec![4, 0, 0, 0], 4));
        assert_eq!(compact_and_merge_line(&[2, 2, 2, 2], false), (vec![4, 4, 0, 0], 8));
        assert_eq!(compact_and_merge_line(&[4, 4, 8, 0], false), (vec![8, 8, 0, 0], 8));
    }

    #[test]
    fn it_merge_line_toward_end() {
        assert_eq!(compact_and_merge_line(&[0, 0, 0, 0], true), (vec![0, 0, 0, 0], 0));
        assert_eq!(compact_and_merge_line(&[2, 2, 4, 4], true), (vec![0, 0, 4, 8], 12));
        assert_eq!(compact_and_merge_line(&[32, 0, 0, 32], true), (vec![0, 0, 0, 64], 64));
        assert_eq!(compact_and_merge_line(&[0, 2, 2, 2], true), (vec![0, 0, 2, 4], 4));
    }

    #[test]
    fn three_equal_merge_only_first_pair() {
        let mut e = engine_from(vec![
            vec![2, 2, 2, 0],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 0],
        ]);
        assert!(e.apply_move(Move::Left));
        assert_eq!(e.grid().rows().next().unwrap(), &[4, 2, 0, 0]);
        assert_eq!(e.score(), 4);
    }

    #[test]
    fn test_move_left() {
        let mut e = engine_from(vec![
            vec![2, 4, 8, 16],
            vec![2, 8, 8, 4],
            vec![4, 0, 0, 4],
            vec![2, 0, 0, 4],
        ]);
        assert!(e.apply_move(Move::Left));
        assert_eq!(
            rows_of(&e),
            vec![vec![2, 4, 8, 16], vec![2, 16, 4, 0], vec![8, 0, 0, 0], vec![2, 4, 0, 0]]
        );
        assert_eq!(e.score(), 24);
        assert_eq!(e.last_gain(), 24);
    }

    #[test]
    fn test_move_right() {
        let mut e = engine_from(vec![
            vec![2, 4, 8, 16],
            vec![2, 8, 8, 4],
            vec![4, 0, 0, 4],
            vec![2, 0, 0, 4],
        ]);
        assert!(e.apply_move(Move::Right));
        assert_eq!(
            rows_of(&e),
            vec![vec![2, 4, 8, 16], vec![0, 2, 16, 4], vec![0, 0, 0, 8], vec![0, 0, 2, 4]]
        );
    }

    #[test]
    fn test_move_up() {
        let mut e = engine_from(vec![
            vec![2, 2, 4, 2],
            vec![4, 8, 0, 0],
            vec![8, 8, 0, 0],
            vec![16, 4, 4, 4],
        ]);
        assert!(e.apply_move(Move::Up));
        assert_eq!(
            rows_of(&e),
            vec![vec![2, 2, 8, 2], vec![4, 16, 0, 4], vec![8, 4, 0, 0], vec![16, 0, 0, 0]]
        );
        assert_eq!(e.score(), 24);
    }

    #[test]
    fn test_move_down() {
        let mut e = engine_from(vec![
            vec![2, 2, 4, 2],
            vec![4, 8, 0, 0],
            vec![8, 8, 0, 0],
            vec![16, 4, 4, 4],
        ]);
        assert!(e.apply_move(Move::Down));
        assert_eq!(
            rows_of(&e),
            vec![vec![2, 0, 0, 0], vec![4, 2, 0, 0], vec![8, 16, 0, 2], vec![16, 4, 8, 4]]
        );
    }

    #[test]
    fn unchanged_move_reports_false_and_keeps_grid() {
        let rows = vec![
            vec![2, 4, 0, 0],
            vec![8, 0, 0, 0],
            vec![4, 2, 8, 0],
            vec![0, 0, 0, 0],
        ];
        let mut e = engine_from(rows.clone());
        assert!(!e.apply_move(Move::Left));
        assert_eq!(rows_of(&e), rows);
        assert_eq!(e.score(), 0);
        assert!(e.apply_move(Move::Right));
    }

    // Straight port of the splice-based merge: slide toward index 0.
    fn reference_left(line: &[Tile]) -> (Vec<Tile>, Score) {
        let mut row: Vec<Tile> = line.iter().copied().filter(|&v| v != 0).collect();
        let mut score = 0;
        let mut j = 0;
        while j + 1 < row.len() {
            if row[j] == row[j + 1] {
                row[j] *= 2;
                score += row[j] as Score;
                row.remove(j + 1);
            }
            j += 1;
        }
        row.resize(line.len(), 0);
        (row, score)
    }

    fn reference_move(grid: &Grid, dir: Move) -> (Vec<Tile>, Score) {
        let n = grid.size();
        let mut cells = vec![0; n * n];
        let mut score = 0;
        for l in 0..n {
            // Positions of line `l`, listed from the destination end.
            let idx: Vec<usize> = (0..n)
                .map(|k| match dir {
                    Move::Left => l * n + k,
                    Move::Right => l * n + (n - 1 - k),
                    Move::Up => k * n + l,
                    Move::Down => (n - 1 - k) * n + l,
                })
                .collect();
            let line: Vec<Tile> = idx.iter().map(|&i| grid.cells()[i]).collect();
            let (out, s) = reference_left(&line);
            score += s;
            for (&i, v) in idx.iter().zip(out) {
                cells[i] = v;
            }
        }
        (cells, score)
    }

    #[test]
    fn merge_keeps_tile_sum_and_scores_merged_tiles() {
        let mut e = engine_from(vec![
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 0],
            vec![2, 0, 0, 2],
            vec![2, 0, 0, 0],
        ]);
        let sum_before = e.grid().tile_sum();
        assert!(e.apply_move(Move::Right));
        assert_eq!(e.grid().tile_sum(), sum_before);
        assert_eq!(e.last_gain(), 4);
        assert_eq!(e.grid().get(2, 3), 4);
    }

    #[test]
    fn random_play_matches_reference_and_keeps_tile_sum() {
        let config = EngineConfig::default();
        let mut e = BoardEngine::with_rng(&config, StdRng::seed_from_u64(11)).unwrap();
        let mut merges_seen = 0;
        for i in 0..400 {
            let dir = Move::ALL[i % 4];
            let before = e.grid().clone();
            let (expected, expected_gain) = reference_move(&before, dir);
            let score_before = e.score();
            let changed = e.apply_move(dir);
            assert_eq!(e.grid().cells(), &expected[..], "{dir} from {before:?}");
            assert_eq!(e.last_gain(), expected_gain);
            assert_eq!(e.score(), score_before + expected_gain);
            assert_eq!(e.grid().tile_sum(), before.tile_sum());
            assert_eq!(changed, e.grid() != &before);
            if expected_gain > 0 {
                merges_seen += 1;
            }
            if changed {
                let spawn = e.spawn_tile().unwrap();
                assert!(spawn.value == 2 || spawn.value == 4);
            }
            if e.is_over() {
                e.reset();
            }
        }
        assert!(merges_seen > 0);
    }

    #[test]
    fn pair_too_large_to_double_stays_put() {
        let big: Tile = 1 << 31;
        let mut e = engine_from(vec![vec![big, big], vec![0, 0]]);
        assert!(!e.apply_move(Move::Left));
        assert_eq!(rows_of(&e), vec![vec![big, big], vec![0, 0]]);
        assert_eq!(e.score(), 0);
        assert!(e.apply_move(Move::Down));
        assert_eq!(rows_of(&e), vec![vec![0, 0], vec![big, big]]);
        assert_eq!(compact_and_merge_line(&[1 << 30, 1 << 30], false), (vec![1 << 31, 0], 1 << 31));

        let stuck = engine_from(vec![vec![big, big], vec![4, 2]]);
        assert!(stuck.is_over());
    }

    #[test]
    fn spawn_picks_empty_cells_uniformly() {
        let grid = Grid::from_rows(vec![
            vec![0, 4, 0, 16],
            vec![4, 8, 16, 32],
            vec![8, 0, 32, 64],
            vec![16, 32, 64, 0],
        ])
        .unwrap();
        let mut e = BoardEngine::from_grid(grid, 2048, StdRng::seed_from_u64(17)).unwrap();
        let cells = [(0, 0), (0, 2), (2, 1), (3, 3)];
        let mut counts = [0usize; 4];
        for _ in 0..8_000 {
            let spawn = e.spawn_tile().unwrap();
            let slot = cells.iter().position(|&c| c == (spawn.row, spawn.col)).unwrap();
            counts[slot] += 1;
            e.grid.set(spawn.row, spawn.col, 0);
        }
        for count in counts {
            assert!((1_700..2_300).contains(&count), "counts = {counts:?}");
        }
    }

    #[test]
    fn spawn_fills_the_only_empty_cell() {
        for seed in 0..32 {
            let grid = Grid::from_rows(vec![
                vec![2, 4, 8, 16],
                vec![4, 8, 16, 32],
                vec![8, 0, 32, 64],
                vec![16, 32, 64, 128],
            ])
            .unwrap();
            let mut e = BoardEngine::from_grid(grid.clone(), 2048, StdRng::seed_from_u64(seed)).unwrap();
            let spawn = e.spawn_tile().unwrap();
            assert_eq!((spawn.row, spawn.col), (2, 1));
            assert!(spawn.value == 2 || spawn.value == 4);
            for (idx, (&a, &b)) in grid.cells().iter().zip(e.grid().cells()).enumerate() {
                if idx != 2 * 4 + 1 {
                    assert_eq!(a, b);
                }
            }
        }
    }

    #[test]
    fn spawn_on_full_grid_is_noop() {
        let rows = vec![vec![2, 4], vec![4, 2]];
        let mut e = engine_from(rows.clone());
        assert_eq!(e.spawn_tile(), None);
        assert_eq!(rows_of(&e), rows);
    }

    #[test]
    fn spawn_values_are_mostly_twos() {
        let mut rng = StdRng::seed_from_u64(3);
        let fours = (0..10_000).filter(|_| generate_random_tile(&mut rng) == 4).count();
        assert!((700..1300).contains(&fours), "fours = {fours}");
    }

    #[test]
    fn is_over_checks_full_grid_and_neighbours() {
        let stuck = engine_from(vec![
            vec![2, 4, 2, 4],
            vec![4, 2, 4, 2],
            vec![2, 4, 2, 4],
            vec![4, 2, 4, 2],
        ]);
        assert!(stuck.is_over());
        assert_eq!(stuck.status(), GameStatus::Over);

        let vertical_pair = engine_from(vec![
            vec![2, 4, 2, 4],
            vec![4, 2, 4, 2],
            vec![2, 4, 2, 4],
            vec![2, 8, 16, 32],
        ]);
        assert!(!vertical_pair.is_over());

        let horizontal_pair = engine_from(vec![
            vec![2, 4, 2, 4],
            vec![4, 2, 4, 2],
            vec![2, 4, 2, 4],
            vec![4, 2, 16, 16],
        ]);
        assert!(!horizontal_pair.is_over());

        let one_gap = engine_from(vec![
            vec![2, 4, 2, 4],
            vec![4, 2, 4, 2],
            vec![2, 4, 2, 4],
            vec![4, 2, 4, 0],
        ]);
        assert!(!one_gap.is_over());
    }

    #[test]
    fn is_won_at_threshold() {
        let mut e = engine_from(vec![
            vec![1024, 1024, 0, 0],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 0],
        ]);
        assert!(!e.is_won());
        assert!(e.apply_move(Move::Left));
        assert!(e.is_won());
        assert!(e.is_won());
        assert_eq!(e.status(), GameStatus::Won);
        assert_eq!(e.score(), 2048);
    }

    #[test]
    fn custom_threshold() {
        let grid = Grid::from_rows(vec![vec![64, 0], vec![0, 0]]).unwrap();
        let e = BoardEngine::from_grid(grid, 64, StdRng::seed_from_u64(1)).unwrap();
        assert!(e.is_won());
    }

    #[test]
    fn reset_deals_two_tiles() {
        let config = EngineConfig { size: 5, win_threshold: 2048 };
        let mut e = BoardEngine::with_rng(&config, StdRng::seed_from_u64(5)).unwrap();
        for _ in 0..50 {
            e.apply_move(Move::Left);
            e.reset();
            let tiles: Vec<Tile> = e.grid().cells().iter().copied().filter(|&v| v != 0).collect();
            assert_eq!(tiles.len(), 2);
            assert!(tiles.iter().all(|&v| v == 2 || v == 4));
            assert_eq!(e.score(), 0);
            assert!(!e.is_over());
            assert_eq!(e.size(), 5);
        }
    }

    #[test]
    fn reset_on_smallest_grid() {
        let config = EngineConfig { size: 2, win_threshold: 2048 };
        let e = BoardEngine::with_rng(&config, StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(e.grid().count_empty(), 2);
        assert!(!e.is_over());
    }

    #[test]
    fn construction_rejects_bad_config() {
        assert_eq!(BoardEngine::new(1, 2048).err(), Some(EngineError::InvalidSize(1)));
        assert_eq!(BoardEngine::new(0, 2048).err(), Some(EngineError::InvalidSize(0)));
        assert_eq!(BoardEngine::new(100_000, 2048).err(), Some(EngineError::InvalidSize(100_000)));
        assert_eq!(Grid::new(MAX_SIZE + 1).err(), Some(EngineError::InvalidSize(MAX_SIZE + 1)));
        assert!(Grid::new(MAX_SIZE).is_ok());
        assert_eq!(BoardEngine::new(4, 1000).err(), Some(EngineError::InvalidWinThreshold(1000)));
        assert_eq!(Grid::from_rows(vec![vec![2, 0], vec![0]]).err(), Some(EngineError::NotSquare));
        assert_eq!(Grid::from_rows(vec![vec![1, 0], vec![0, 0]]).err(), Some(EngineError::InvalidTile(1)));
    }

    #[test]
    fn parse_moves() {
        assert_eq!("W".parse::<Move>().unwrap(), Move::Up);
        assert_eq!("a".parse::<Move>().unwrap(), Move::Left);
        assert_eq!(" down ".parse::<Move>().unwrap(), Move::Down);
        assert_eq!("Right".parse::<Move>().unwrap(), Move::Right);
        assert!("x".parse::<Move>().is_err());
        for dir in Move::ALL {
            assert_eq!(dir.to_string().parse::<Move>().unwrap(), dir);
        }
    }

    #[test]
    fn grid_queries() {
        let g = Grid::from_rows(vec![vec![2, 0, 0], vec![0, 8, 0], vec![0, 0, 4]]).unwrap();
        assert_eq!(g.count_empty(), 6);
        assert_eq!(g.highest_tile(), 8);
        assert_eq!(g.tile_sum(), 14);
        assert_eq!(g.empty_cells()[0], (0, 1));
        assert!(g.can_move(Move::Left));
        assert!(g.has_moves());
        let text = g.to_string();
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains('8'));
    }
}
