use rand::Rng;
use std::fmt;
use std::sync::OnceLock;

/// A direction to slide/merge tiles.
///
/// The declaration order is the fixed enumeration order used everywhere
/// (legal-action lists, greedy tie-breaks, per-action value functions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    /// All four actions in enumeration order.
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// Position of this action in [`Action::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Left => 2,
            Action::Right => 3,
        }
    }

    #[inline]
    pub fn from_index(idx: usize) -> Option<Action> { Action::ALL.get(idx).copied() }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
        };
        f.write_str(name)
    }
}

/// Side length of the grid.
pub const GRID_SIZE: usize = 4;
/// Number of cells on the grid.
pub const CELLS: usize = GRID_SIZE * GRID_SIZE;
/// Probability that an inserted tile is a 2 (otherwise a 4).
pub const TWO_PROBABILITY: f64 = 0.9;
/// Largest exponent a 4-bit cell can hold (tile 32768).
pub const MAX_EXPONENT: u8 = 15;

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

type StateRaw = u64;
type Line = u16;

struct LineTables {
    toward_start: Box<[Line]>,
    toward_end: Box<[Line]>,
    reward_start: Box<[u32]>,
    reward_end: Box<[u32]>,
}

static TABLES: OnceLock<LineTables> = OnceLock::new();

/// Build the per-line slide tables. Safe to call multiple times; every
/// operation also builds them lazily on first use.
pub fn warm() {
    let _ = tables();
}

#[inline(always)]
fn tables() -> &'static LineTables { TABLES.get_or_init(create_tables) }

fn create_tables() -> LineTables {
    // Heap allocation keeps large arrays off the stack
    let mut toward_start = vec![0 as Line; LINE_TABLE_SIZE];
    let mut toward_end = vec![0 as Line; LINE_TABLE_SIZE];
    let mut reward_start = vec![0u32; LINE_TABLE_SIZE];
    let mut reward_end = vec![0u32; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let exps = line_to_exps(val as Line);

        let (moved, reward) = slide_exps_toward_start(exps);
        toward_start[val] = exps_to_line(moved);
        reward_start[val] = reward;

        let mut reversed = exps;
        reversed.reverse();
        let (mut moved, reward) = slide_exps_toward_start(reversed);
        moved.reverse();
        toward_end[val] = exps_to_line(moved);
        reward_end[val] = reward;
    }

    LineTables {
        toward_start: toward_start.into_boxed_slice(),
        toward_end: toward_end.into_boxed_slice(),
        reward_start: reward_start.into_boxed_slice(),
        reward_end: reward_end.into_boxed_slice(),
    }
}

/// Single sweep: a tile produced by a merge is not merged again.
fn slide_exps_toward_start(exps: [u8; 4]) -> ([u8; 4], u32) {
    let mut out = [0u8; 4];
    let mut reward = 0;
    let mut next = 0;
    let mut can_merge = false;
    for exp in exps.into_iter().filter(|&e| e != 0) {
        if can_merge && out[next - 1] == exp && exp < MAX_EXPONENT {
            out[next - 1] += 1;
            reward += 1u32 << out[next - 1];
            can_merge = false;
        } else {
            out[next] = exp;
            next += 1;
            can_merge = true;
        }
    }
    (out, reward)
}

fn line_to_exps(line: Line) -> [u8; 4] {
    [(line >> 12) as u8 & 0xf, (line >> 8) as u8 & 0xf, (line >> 4) as u8 & 0xf, line as u8 & 0xf]
}

fn exps_to_line(exps: [u8; 4]) -> Line {
    (exps[0] as Line) << 12 | (exps[1] as Line) << 8 | (exps[2] as Line) << 4 | exps[3] as Line
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("tile at ({row}, {col}) is {value}; expected 0 or a power of two in 2..=32768")]
    InvalidTile { row: usize, col: usize, value: u32 },
}

/// One stochastic successor of an afterstate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Successor {
    pub state: State,
    pub probability: f64,
}

/// Packed 4x4 grid: 16 4-bit exponents in a `u64`, row-major, cell 0 in
/// the highest nibble. An exponent of 0 is an empty cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct State(StateRaw);

impl State {
    /// A constant empty grid.
    pub const EMPTY: State = State(0);

    #[inline]
    pub fn from_raw(raw: StateRaw) -> Self { State(raw) }

    #[inline]
    pub fn raw(&self) -> StateRaw { self.0 }

    /// Build a state from tile values (`tiles[row][col]`).
    ///
    /// ```
    /// use ntuple_2048::engine::State;
    /// let s = State::from_tiles([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(s.tile(0, 1), 2);
    /// assert!(State::from_tiles([[3, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).is_err());
    /// ```
    pub fn from_tiles(tiles: [[u32; GRID_SIZE]; GRID_SIZE]) -> Result<Self, StateError> {
        let mut raw = 0;
        for (row, line) in tiles.iter().enumerate() {
            for (col, &value) in line.iter().enumerate() {
                if value == 0 {
                    continue;
                }
                if value < 2 || !value.is_power_of_two() || value.trailing_zeros() > MAX_EXPONENT as u32 {
                    return Err(StateError::InvalidTile { row, col, value });
                }
                raw |= (value.trailing_zeros() as StateRaw) << cell_shift(row * GRID_SIZE + col);
            }
        }
        Ok(State(raw))
    }

    /// Tile values as a `[row][col]` matrix.
    pub fn tiles(self) -> [[u32; GRID_SIZE]; GRID_SIZE] {
        let mut out = [[0; GRID_SIZE]; GRID_SIZE];
        for (row, line) in out.iter_mut().enumerate() {
            for (col, slot) in line.iter_mut().enumerate() {
                *slot = self.tile(row, col);
            }
        }
        out
    }

    /// Tile value at (row, col), 0 if empty.
    #[inline]
    pub fn tile(self, row: usize, col: usize) -> u32 { exponent_to_value(self.exponent(row * GRID_SIZE + col)) }

    /// Base-2 exponent stored at `cell` (row-major 0..16), 0 if empty.
    #[inline]
    pub fn exponent(self, cell: usize) -> u8 { ((self.0 >> cell_shift(cell)) & 0xf) as u8 }

    /// Slide/merge in place, returning the merge reward (sum of created tiles).
    /// Leaves the state untouched and returns 0 when nothing can move.
    #[inline]
    pub fn slide(&mut self, action: Action) -> u32 {
        let (next, reward) = self.shift(action);
        *self = next;
        reward
    }

    /// The state and reward resulting from a slide in `action`, without
    /// random insertion.
    ///
    /// ```
    /// use ntuple_2048::engine::{Action, State};
    /// let s = State::from_tiles([[2, 2, 4, 4], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let (after, reward) = s.shift(Action::Left);
    /// assert_eq!(after.tiles()[0], [4, 8, 0, 0]);
    /// assert_eq!(reward, 12);
    /// ```
    #[inline]
    pub fn shift(self, action: Action) -> (State, u32) {
        let t = tables();
        match action {
            Action::Left => shift_rows(self.0, &t.toward_start, &t.reward_start),
            Action::Right => shift_rows(self.0, &t.toward_end, &t.reward_end),
            Action::Up => {
                let (moved, reward) = shift_rows(transpose(self.0), &t.toward_start, &t.reward_start);
                (State(transpose(moved.0)), reward)
            }
            Action::Down => {
                let (moved, reward) = shift_rows(transpose(self.0), &t.toward_end, &t.reward_end);
                (State(transpose(moved.0)), reward)
            }
        }
    }

    /// True if sliding in `action` changes the grid.
    #[inline]
    pub fn is_legal(self, action: Action) -> bool { self.shift(action).0 != self }

    /// Legal actions in enumeration order.
    pub fn legal_actions(self) -> Vec<Action> {
        Action::ALL.into_iter().filter(|&a| self.is_legal(a)).collect()
    }

    /// Insert a 2 (90%) or 4 (10%) into a uniformly chosen empty cell.
    /// Does nothing when the grid is full.
    pub fn insert_random_tile<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let empty = self.count_empty();
        if empty == 0 {
            return;
        }
        let target = rng.gen_range(0..empty);
        let exponent = generate_random_exponent(rng);
        if let Some(cell) = self.empty_cells().nth(target) {
            self.0 |= (exponent as StateRaw) << cell_shift(cell);
        }
    }

    /// Consuming form of [`State::insert_random_tile`].
    ///
    /// ```
    /// use ntuple_2048::engine::State;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let s = State::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(s.count_empty(), 14);
    /// ```
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        self.insert_random_tile(rng);
        self
    }

    /// Highest tile value on the grid, 0 when empty.
    pub fn max_tile(self) -> u32 {
        exponent_to_value((0..CELLS).map(|cell| self.exponent(cell)).max().unwrap_or(0))
    }

    /// Sum of all tile values.
    pub fn tile_sum(self) -> u64 {
        (0..CELLS).map(|cell| exponent_to_value(self.exponent(cell)) as u64).sum()
    }

    /// Coordinates `(row, col)` of empty cells, row-major.
    pub fn empty_tiles(self) -> Vec<(usize, usize)> {
        self.empty_cells().map(|cell| (cell / GRID_SIZE, cell % GRID_SIZE)).collect()
    }

    /// Count the number of empty cells.
    #[inline]
    pub fn count_empty(self) -> usize { CELLS - count_non_empty(self.0) }

    /// Every grid reachable by one random insertion, with its probability.
    ///
    /// Probabilities sum to 1 whenever at least one cell is empty; a full
    /// grid has no successors.
    ///
    /// ```
    /// use ntuple_2048::engine::State;
    /// let s = State::from_tiles([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let next = s.next_states();
    /// assert_eq!(next.len(), 30);
    /// let total: f64 = next.iter().map(|n| n.probability).sum();
    /// assert!((total - 1.0).abs() < 1e-12);
    /// ```
    pub fn next_states(self) -> Vec<Successor> {
        let empty = self.count_empty();
        if empty == 0 {
            return Vec::new();
        }
        let cell_probability = 1.0 / empty as f64;
        let mut out = Vec::with_capacity(2 * empty);
        for cell in self.empty_cells() {
            let shift = cell_shift(cell);
            out.push(Successor { state: State(self.0 | (1 << shift)), probability: cell_probability * TWO_PROBABILITY });
            out.push(Successor { state: State(self.0 | (2 << shift)), probability: cell_probability * (1.0 - TWO_PROBABILITY) });
        }
        out
    }

    fn empty_cells(self) -> impl Iterator<Item = usize> {
        (0..CELLS).filter(move |&cell| self.exponent(cell) == 0)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State({:#018x})", self.0)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-----------------------------";
        writeln!(f, "{rule}")?;
        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                write!(f, "|{}", format_val(self.tile(row, col)))?;
            }
            writeln!(f, "|")?;
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}

impl From<StateRaw> for State { fn from(v: StateRaw) -> Self { State::from_raw(v) } }
impl From<State> for StateRaw { fn from(s: State) -> Self { s.raw() } }

#[inline(always)]
fn cell_shift(cell: usize) -> u32 { (60 - 4 * cell) as u32 }

#[inline(always)]
fn exponent_to_value(exp: u8) -> u32 {
    if exp == 0 { 0 } else { 1 << exp }
}

// Credit to Nneonneo
fn transpose(x: StateRaw) -> StateRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

fn shift_rows(raw: StateRaw, lines: &[Line], rewards: &[u32]) -> (State, u32) {
    (0..GRID_SIZE).fold((State(0), 0), |(acc, reward), row| {
        let offset = (3 - row) * 16;
        let line = ((raw >> offset) & 0xffff) as usize;
        (State(acc.0 | (lines[line] as StateRaw) << offset), reward + rewards[line])
    })
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
fn count_non_empty(raw: StateRaw) -> usize {
    let mut copy = raw;
    copy |= copy >> 1;
    copy |= copy >> 2;
    copy &= 0x1111111111111111;
    copy.count_ones() as usize
}

fn generate_random_exponent<R: Rng + ?Sized>(rng: &mut R) -> u8 { if rng.gen_bool(TWO_PROBABILITY) { 1 } else { 2 } }

fn format_val(val: u32) -> String {
    match val {
        0 => String::from("      "),
        x => format!("{x:>6}"),
    }
}
