use std::path::Path;

use crate::engine::{Action, State};
use crate::ntuple::{NTupleError, NTupleNetwork};

use super::{greedy, Agent, LearningConfig, RewardShaping, TerminalPenalty, Transition};

/// TD(0) over afterstates.
///
/// Picks `argmax r(a) + V(after(a))` and trains the afterstate it produced
/// toward the same quantity evaluated greedily from the next state.
#[derive(Debug, Clone)]
pub struct AfterstateTd {
    value: NTupleNetwork,
    reward: RewardShaping,
    terminal_penalty: Option<TerminalPenalty>,
}

impl AfterstateTd {
    /// Standard 17-tuple network with zero-initialized weights.
    pub fn new(cfg: &LearningConfig) -> Self { Self::with_network(NTupleNetwork::standard(cfg.alpha), cfg) }

    pub fn with_network(value: NTupleNetwork, cfg: &LearningConfig) -> Self {
        Self { value, reward: cfg.reward, terminal_penalty: cfg.terminal_penalty }
    }

    #[inline]
    pub fn value(&self) -> &NTupleNetwork { &self.value }

    #[inline]
    pub fn value_mut(&mut self) -> &mut NTupleNetwork { &mut self.value }

    /// Best action in `state` with its `r + V(after)` score.
    pub fn best_action(&self, state: State, actions: &[Action]) -> Option<(Action, f64)> {
        greedy(actions, |a| {
            let (after, reward) = state.shift(a);
            self.reward.apply(reward) + self.value.evaluate(after)
        })
    }
}

impl Agent for AfterstateTd {
    fn name(&self) -> &'static str { "afterstate-td" }

    fn select_action(&mut self, state: State, actions: &[Action]) -> Action {
        self.best_action(state, actions).map_or(actions[0], |(a, _)| a)
    }

    fn learn(&mut self, t: &Transition<'_>) {
        if let Some((_, target)) = self.best_action(t.next_state, t.next_actions) {
            self.value.train(t.afterstate, target);
        } else if let Some(penalty) = self.terminal_penalty {
            if t.score < penalty.score_threshold {
                self.value.train(t.afterstate, penalty.value);
            }
        }
    }

    fn save(&self, path: &Path) -> Result<(), NTupleError> { self.value.save(path) }

    fn load(&mut self, path: &Path) -> Result<(), NTupleError> { self.value.load(path) }
}
