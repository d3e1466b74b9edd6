// Board geometry, capture resolution and scoring for a single game
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Stone color. Black always moves first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

/// An intersection on the board. Signed so that out-of-range input can be
/// reported as `OutOfBounds` instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Supported board sizes, fixed per game at creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BoardSize {
    Nine,
    Thirteen,
    #[default]
    Nineteen,
}

impl BoardSize {
    pub fn dimension(self) -> usize {
        match self {
            BoardSize::Nine => 9,
            BoardSize::Thirteen => 13,
            BoardSize::Nineteen => 19,
        }
    }
}

impl TryFrom<u8> for BoardSize {
    type Error = BoardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            9 => Ok(BoardSize::Nine),
            13 => Ok(BoardSize::Thirteen),
            19 => Ok(BoardSize::Nineteen),
            other => Err(BoardError::UnsupportedSize(other)),
        }
    }
}

impl From<BoardSize> for u8 {
    fn from(size: BoardSize) -> Self {
        size.dimension() as u8
    }
}

impl std::fmt::Display for BoardSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = self.dimension();
        write!(f, "{}x{}", n, n)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Point ({x}, {y}) is outside the {size}x{size} board")]
    OutOfBounds { x: i32, y: i32, size: usize },
    #[error("Point ({x}, {y}) is already occupied")]
    Occupied { x: i32, y: i32 },
    #[error("Move would leave the placed stone without liberties")]
    Suicide,
    #[error("Move would repeat an earlier board position")]
    PositionRepeated,
    #[error("Unsupported board size: {0}")]
    UnsupportedSize(u8),
}

/// Stones removed by a placement, in row-major order
pub type CaptureSet = Vec<Point>;

/// A maximal 4-connected group of same-colored stones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub color: Color,
    pub stones: BTreeSet<Point>,
}

/// Per-color point totals produced by a scoring pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTotals {
    pub black: i32,
    pub white: i32,
}

impl PointTotals {
    pub fn for_color(&self, color: Color) -> i32 {
        match color {
            Color::Black => self.black,
            Color::White => self.white,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    size: BoardSize,
    cells: Vec<Option<Color>>,
    position_hash: u64,
    seen_positions: HashSet<u64>,
}

impl Board {
    pub fn new(size: BoardSize) -> Self {
        let n = size.dimension();
        let mut seen_positions = HashSet::new();
        // The empty board counts as an earlier position
        seen_positions.insert(0);

        Self {
            size,
            cells: vec![None; n * n],
            position_hash: 0,
            seen_positions,
        }
    }

    pub fn size(&self) -> BoardSize {
        self.size
    }

    pub fn position_hash(&self) -> u64 {
        self.position_hash
    }

    pub fn stone_at(&self, point: Point) -> Option<Color> {
        self.index_of(point).and_then(|index| self.cells[index])
    }

    pub fn stone_count(&self, color: Color) -> usize {
        self.cells.iter().filter(|c| **c == Some(color)).count()
    }

    /// All occupied intersections in row-major order
    pub fn stones(&self) -> Vec<(Point, Color)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| cell.map(|color| (self.point_of(index), color)))
            .collect()
    }

    /// One string per row, `.` for empty, `B` and `W` for stones
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.size.dimension())
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        None => '.',
                        Some(Color::Black) => 'B',
                        Some(Color::White) => 'W',
                    })
                    .collect()
            })
            .collect()
    }

    /// Places a stone, resolving captures, suicide and positional repetition.
    ///
    /// On any error the board is left exactly as it was before the call.
    pub fn place(&mut self, color: Color, point: Point) -> Result<CaptureSet, BoardError> {
        let index = self.index_of(point).ok_or(BoardError::OutOfBounds {
            x: point.x,
            y: point.y,
            size: self.size.dimension(),
        })?;

        if self.cells[index].is_some() {
            return Err(BoardError::Occupied {
                x: point.x,
                y: point.y,
            });
        }

        self.set(index, Some(color));

        let opponent = color.opponent();
        let mut captured: BTreeSet<usize> = BTreeSet::new();
        for neighbor in self.neighbors(index) {
            if self.cells[neighbor] != Some(opponent) || captured.contains(&neighbor) {
                continue;
            }
            let chain = self.chain_indices(neighbor);
            if self.liberty_indices(&chain).is_empty() {
                captured.extend(chain);
            }
        }
        for &stone in &captured {
            self.set(stone, None);
        }

        let own_chain = self.chain_indices(index);
        if self.liberty_indices(&own_chain).is_empty() {
            self.rollback(index, opponent, &captured);
            return Err(BoardError::Suicide);
        }

        if self.seen_positions.contains(&self.position_hash) {
            self.rollback(index, opponent, &captured);
            return Err(BoardError::PositionRepeated);
        }

        self.seen_positions.insert(self.position_hash);

        Ok(captured.into_iter().map(|i| self.point_of(i)).collect())
    }

    /// Returns the chain containing the stone at `point`, if any
    pub fn chain_at(&self, point: Point) -> Option<Chain> {
        let index = self.index_of(point)?;
        let color = self.cells[index]?;

        let stones = self
            .chain_indices(index)
            .into_iter()
            .map(|i| self.point_of(i))
            .collect();

        Some(Chain { color, stones })
    }

    /// Number of distinct empty intersections adjacent to the chain
    pub fn liberties(&self, chain: &Chain) -> usize {
        let indices: BTreeSet<usize> = chain
            .stones
            .iter()
            .filter_map(|p| self.index_of(*p))
            .collect();
        self.liberty_indices(&indices).len()
    }

    /// Area counting: stones on the board plus empty regions bordered by a
    /// single color.
    pub fn area_score(&self) -> PointTotals {
        let mut totals = self.stone_score();
        for owner in self.territory().into_iter().flatten() {
            match owner {
                Color::Black => totals.black += 1,
                Color::White => totals.white += 1,
            }
        }
        totals
    }

    /// Stones on the board only
    pub fn stone_score(&self) -> PointTotals {
        PointTotals {
            black: self.stone_count(Color::Black) as i32,
            white: self.stone_count(Color::White) as i32,
        }
    }

    /// Owner of every empty intersection, `None` for neutral points and for
    /// occupied ones.
    pub fn territory(&self) -> Vec<Option<Color>> {
        let mut ownership = vec![None; self.cells.len()];
        let mut visited = vec![false; self.cells.len()];

        for start in 0..self.cells.len() {
            if visited[start] || self.cells[start].is_some() {
                continue;
            }
            let (region, owner) = self.flood_empty_region(start, &mut visited);
            for index in region {
                ownership[index] = owner;
            }
        }

        ownership
    }

    fn flood_empty_region(&self, start: usize, visited: &mut [bool]) -> (Vec<usize>, Option<Color>) {
        let mut region = Vec::new();
        let mut borders_black = false;
        let mut borders_white = false;
        let mut stack = vec![start];

        while let Some(index) = stack.pop() {
            if visited[index] {
                continue;
            }
            visited[index] = true;
            region.push(index);

            for neighbor in self.neighbors(index) {
                match self.cells[neighbor] {
                    Some(Color::Black) => borders_black = true,
                    Some(Color::White) => borders_white = true,
                    None if !visited[neighbor] => stack.push(neighbor),
                    None => {}
                }
            }
        }

        let owner = match (borders_black, borders_white) {
            (true, false) => Some(Color::Black),
            (false, true) => Some(Color::White),
            _ => None,
        };

        (region, owner)
    }

    fn chain_indices(&self, start: usize) -> BTreeSet<usize> {
        let mut chain = BTreeSet::new();
        let Some(color) = self.cells[start] else {
            return chain;
        };

        let mut stack = vec![start];
        while let Some(index) = stack.pop() {
            if !chain.insert(index) {
                continue;
            }
            for neighbor in self.neighbors(index) {
                if self.cells[neighbor] == Some(color) && !chain.contains(&neighbor) {
                    stack.push(neighbor);
                }
            }
        }

        chain
    }

    fn liberty_indices(&self, chain: &BTreeSet<usize>) -> BTreeSet<usize> {
        chain
            .iter()
            .flat_map(|&index| self.neighbors(index))
            .filter(|&neighbor| self.cells[neighbor].is_none())
            .collect()
    }

    fn rollback(&mut self, placed: usize, captured_color: Color, captured: &BTreeSet<usize>) {
        for &stone in captured {
            self.set(stone, Some(captured_color));
        }
        self.set(placed, None);
    }

    /// Writes a cell and keeps the Zobrist hash in step
    fn set(&mut self, index: usize, value: Option<Color>) {
        if let Some(old) = self.cells[index] {
            self.position_hash ^= zobrist_key(index, old);
        }
        if let Some(new) = value {
            self.position_hash ^= zobrist_key(index, new);
        }
        self.cells[index] = value;
    }

    fn index_of(&self, point: Point) -> Option<usize> {
        let n = self.size.dimension() as i32;
        if point.x < 0 || point.y < 0 || point.x >= n || point.y >= n {
            return None;
        }
        Some((point.y * n + point.x) as usize)
    }

    fn point_of(&self, index: usize) -> Point {
        let n = self.size.dimension();
        Point::new((index % n) as i32, (index / n) as i32)
    }

    fn neighbors(&self, index: usize) -> impl Iterator<Item = usize> {
        let n = self.size.dimension();
        let x = index % n;
        let y = index / n;

        [
            (x > 0).then(|| index - 1),
            (x + 1 < n).then(|| index + 1),
            (y > 0).then(|| index - n),
            (y + 1 < n).then(|| index + n),
        ]
        .into_iter()
        .flatten()
    }
}

const ZOBRIST_SEED: u64 = 0x7465_6e67_656e_2d67;

/// Deterministic per-(intersection, color) key. splitmix64 is a bijection, so
/// distinct slots always get distinct keys.
fn zobrist_key(index: usize, color: Color) -> u64 {
    let slot = (index as u64) * 2
        + match color {
            Color::Black => 0,
            Color::White => 1,
        };
    splitmix64(ZOBRIST_SEED ^ slot)
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Builds a 9x9, 13x13 or 19x19 board from a diagram of `.`, `B` and `W`,
/// top row first; the row count picks the size.
/// Bypasses legality checks; the resulting position is marked as seen.
#[cfg(test)]
pub(crate) fn board_from_rows(rows: &[&str]) -> Board {
    let size = match rows.len() {
        9 => BoardSize::Nine,
        13 => BoardSize::Thirteen,
        19 => BoardSize::Nineteen,
        other => panic!("unsupported diagram height {}", other),
    };
    let mut board = Board::new(size);
    for (y, row) in rows.iter().enumerate() {
        for (x, cell) in row.chars().enumerate() {
            let color = match cell {
                'B' => Some(Color::Black),
                'W' => Some(Color::White),
                _ => None,
            };
            let index = y * size.dimension() + x;
            board.set(index, color);
        }
    }
    board.seen_positions.insert(board.position_hash);
    board
}
