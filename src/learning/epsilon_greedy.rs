use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::engine::{Action, State};

use super::Agent;

/// Value-free baseline: the first legal action, or with probability
/// `epsilon` a uniformly random legal one. Never learns.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy<R = StdRng> {
    epsilon: f64,
    rng: R,
}

impl EpsilonGreedy<StdRng> {
    pub fn seeded(epsilon: f64, seed: u64) -> Self { Self::new(epsilon, StdRng::seed_from_u64(seed)) }
}

impl<R: Rng> EpsilonGreedy<R> {
    /// `epsilon` is clamped to `[0, 1]`; NaN counts as 0.
    pub fn new(epsilon: f64, rng: R) -> Self {
        let epsilon = if epsilon.is_nan() { 0.0 } else { epsilon.clamp(0.0, 1.0) };
        Self { epsilon, rng }
    }

    #[inline]
    pub fn epsilon(&self) -> f64 { self.epsilon }
}

impl<R: Rng> Agent for EpsilonGreedy<R> {
    fn name(&self) -> &'static str { "epsilon-greedy" }

    fn learns(&self) -> bool { false }

    fn select_action(&mut self, _state: State, actions: &[Action]) -> Action {
        if self.rng.gen_bool(self.epsilon) {
            if let Some(&a) = actions.choose(&mut self.rng) {
                return a;
            }
        }
        actions[0]
    }
}
