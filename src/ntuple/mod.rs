//! N-tuple network: a linear value function over fixed groups of cells.
//!
//! `V(s) = Σ_t w_t[index(s, t)]`, with one sparse weight table per tuple.
//! A tuple's pattern index packs the tile exponents at its cells as base-100
//! digits, so equal local configurations share a weight wherever the tuple is
//! evaluated.
//!
//! Quick start
//! ```
//! use ntuple_2048::engine::State;
//! use ntuple_2048::ntuple::NTupleNetwork;
//!
//! let mut v = NTupleNetwork::standard(0.1);
//! let s = State::from_tiles([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
//! assert_eq!(v.evaluate(s), 0.0);
//! v.train(s, 10.0);
//! assert!(v.evaluate(s) > 0.0);
//! ```

use std::collections::HashMap;
use std::io;

use crate::engine::{State, CELLS};

mod weights;

/// Base of the positional pattern-index encoding.
pub const INDEX_BASE: u64 = 100;

/// Initial weight used in optimistic mode.
pub const OPTIMISTIC_WEIGHT: f64 = 10.0;

/// The reference tuple set: four rows, four columns and the nine 2x2 squares.
pub const STANDARD_TUPLES: [[usize; 4]; 17] = [
    [0, 1, 2, 3], [4, 5, 6, 7], [8, 9, 10, 11], [12, 13, 14, 15],
    [0, 4, 8, 12], [1, 5, 9, 13], [2, 6, 10, 14], [3, 7, 11, 15],
    [0, 1, 4, 5], [1, 2, 5, 6], [2, 3, 6, 7],
    [4, 5, 8, 9], [5, 6, 9, 10], [6, 7, 10, 11],
    [8, 9, 12, 13], [9, 10, 13, 14], [10, 11, 14, 15],
];

pub(crate) type WeightTable = HashMap<u64, f64, ahash::RandomState>;

/// Shape and learning rate of a network.
///
/// - `capacity`: maximum number of tuples that can be registered.
/// - `tuple_length`: number of cells every tuple must have.
/// - `alpha`: step size of [`NTupleNetwork::train`].
/// - `initial_weight`: value read for a pattern index never trained.
#[derive(Debug, Clone, PartialEq)]
pub struct NTupleConfig {
    pub capacity: usize,
    pub tuple_length: usize,
    pub alpha: f64,
    pub initial_weight: f64,
}

impl Default for NTupleConfig {
    fn default() -> Self {
        Self { capacity: STANDARD_TUPLES.len(), tuple_length: 4, alpha: 0.01, initial_weight: 0.0 }
    }
}

impl NTupleConfig {
    /// Same shape with unseen weights starting at [`OPTIMISTIC_WEIGHT`].
    pub fn optimistic(self) -> Self { Self { initial_weight: OPTIMISTIC_WEIGHT, ..self } }
}

#[derive(thiserror::Error, Debug)]
pub enum NTupleError {
    #[error("network already holds its capacity of {capacity} tuples")]
    Capacity { capacity: usize },
    #[error("tuple has {got} cells, network expects {expected}")]
    TupleLength { expected: usize, got: usize },
    #[error("cell index {0} is outside the grid")]
    CellOutOfRange(usize),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed weight file at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

#[derive(Debug, Clone)]
pub struct NTupleNetwork {
    cfg: NTupleConfig,
    tuples: Vec<Vec<usize>>,
    weights: Vec<WeightTable>,
}

impl NTupleNetwork {
    /// An empty network; register tuples with [`NTupleNetwork::add_tuple`].
    pub fn new(cfg: NTupleConfig) -> Self {
        Self { cfg, tuples: Vec::new(), weights: Vec::new() }
    }

    /// The 17 reference tuples with zero-initialized weights.
    pub fn standard(alpha: f64) -> Self { Self::standard_with(NTupleConfig { alpha, ..NTupleConfig::default() }) }

    /// The 17 reference tuples with the initial weight of `cfg`.
    pub fn standard_with(cfg: NTupleConfig) -> Self {
        let tuples: Vec<Vec<usize>> = STANDARD_TUPLES.iter().map(|t| t.to_vec()).collect();
        let weights = tuples.iter().map(|_| WeightTable::default()).collect();
        let cfg = NTupleConfig { capacity: cfg.capacity.max(tuples.len()), tuple_length: 4, ..cfg };
        Self { cfg, tuples, weights }
    }

    /// Register one tuple. Fails without changing the network when it is
    /// full, the tuple has the wrong length, or a cell is off the grid.
    pub fn add_tuple(&mut self, pattern: &[usize]) -> Result<(), NTupleError> {
        if pattern.len() != self.cfg.tuple_length {
            return Err(NTupleError::TupleLength { expected: self.cfg.tuple_length, got: pattern.len() });
        }
        if self.tuples.len() == self.cfg.capacity {
            return Err(NTupleError::Capacity { capacity: self.cfg.capacity });
        }
        if let Some(&cell) = pattern.iter().find(|&&cell| cell >= CELLS) {
            return Err(NTupleError::CellOutOfRange(cell));
        }
        self.tuples.push(pattern.to_vec());
        self.weights.push(WeightTable::default());
        Ok(())
    }

    #[inline]
    pub fn config(&self) -> &NTupleConfig { &self.cfg }

    #[inline]
    pub fn alpha(&self) -> f64 { self.cfg.alpha }

    /// Registered tuples in registration order.
    #[inline]
    pub fn tuples(&self) -> &[Vec<usize>] { &self.tuples }

    /// Number of registered tuples.
    #[inline]
    pub fn len(&self) -> usize { self.tuples.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.tuples.is_empty() }

    /// Total number of stored weights across all tables.
    pub fn entries(&self) -> usize { self.weights.iter().map(|t| t.len()).sum() }

    /// Drop every learned weight, keeping the registered tuples.
    pub fn reset(&mut self) {
        for table in &mut self.weights {
            table.clear();
        }
    }

    /// Pattern index of `state` under tuple `tuple`: the exponent at the
    /// i-th cell contributes `exp * 100^i`. `None` if there is no such tuple.
    ///
    /// ```
    /// use ntuple_2048::engine::State;
    /// use ntuple_2048::ntuple::NTupleNetwork;
    /// let v = NTupleNetwork::standard(0.01);
    /// let s = State::from_tiles([[2, 4, 8, 16], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(v.pattern_index(s, 0), Some(4_030_201));
    /// assert_eq!(v.pattern_index(s, 17), None);
    /// ```
    pub fn pattern_index(&self, state: State, tuple: usize) -> Option<u64> {
        self.tuples.get(tuple).map(|t| pattern_index(state, t))
    }

    /// Sum of the weights selected by `state`.
    pub fn evaluate(&self, state: State) -> f64 {
        self.tuples
            .iter()
            .zip(&self.weights)
            .map(|(tuple, table)| table.get(&pattern_index(state, tuple)).copied().unwrap_or(self.cfg.initial_weight))
            .sum()
    }

    /// Move every active weight by `alpha * (target - V(state))`.
    ///
    /// Returns the error measured before the update.
    pub fn train(&mut self, state: State, target: f64) -> f64 {
        let error = target - self.evaluate(state);
        let delta = self.cfg.alpha * error;
        let initial = self.cfg.initial_weight;
        for (tuple, table) in self.tuples.iter().zip(&mut self.weights) {
            *table.entry(pattern_index(state, tuple)).or_insert(initial) += delta;
        }
        error
    }
}

#[inline]
fn pattern_index(state: State, tuple: &[usize]) -> u64 {
    tuple
        .iter()
        .rev()
        .fold(0, |index, &cell| index * INDEX_BASE + state.exponent(cell) as u64)
}
