use std::path::Path;

use crate::engine::{Action, State};
use crate::ntuple::{NTupleError, NTupleNetwork};

use super::{greedy, Agent, LearningConfig, RewardShaping, Transition};

/// TD(0) over full states with an exact one-step expectation.
///
/// Scores each action as `r + Σ P(s' | after(a)) V(s')` over every possible
/// tile insertion, then trains the pre-move state toward `r + V(s_next)`.
#[derive(Debug, Clone)]
pub struct StateTd {
    value: NTupleNetwork,
    reward: RewardShaping,
}

impl StateTd {
    pub fn new(cfg: &LearningConfig) -> Self { Self::with_network(NTupleNetwork::standard(cfg.alpha), cfg) }

    pub fn with_network(value: NTupleNetwork, cfg: &LearningConfig) -> Self { Self { value, reward: cfg.reward } }

    #[inline]
    pub fn value(&self) -> &NTupleNetwork { &self.value }

    #[inline]
    pub fn value_mut(&mut self) -> &mut NTupleNetwork { &mut self.value }

    /// Expected value of the random insertion that follows `afterstate`.
    pub fn expected_value(&self, afterstate: State) -> f64 {
        afterstate
            .next_states()
            .iter()
            .map(|next| next.probability * self.value.evaluate(next.state))
            .sum()
    }

    pub fn best_action(&self, state: State, actions: &[Action]) -> Option<(Action, f64)> {
        greedy(actions, |a| {
            let (after, reward) = state.shift(a);
            self.reward.apply(reward) + self.expected_value(after)
        })
    }
}

impl Agent for StateTd {
    fn name(&self) -> &'static str { "state-td" }

    fn select_action(&mut self, state: State, actions: &[Action]) -> Action {
        self.best_action(state, actions).map_or(actions[0], |(a, _)| a)
    }

    fn learn(&mut self, t: &Transition<'_>) {
        if t.is_terminal() {
            return;
        }
        let target = self.reward.apply(t.reward) + self.value.evaluate(t.next_state);
        self.value.train(t.state, target);
    }

    fn save(&self, path: &Path) -> Result<(), NTupleError> { self.value.save(path) }

    fn load(&mut self, path: &Path) -> Result<(), NTupleError> { self.value.load(path) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;
    use crate::learning::play_episode;
    use crate::ntuple::NTupleConfig;

    #[test]
    fn expectation_weights_every_insertion() {
        let mut network = NTupleNetwork::new(NTupleConfig { capacity: 1, alpha: 1.0, ..NTupleConfig::default() });
        network.add_tuple(&[0, 1, 2, 3]).unwrap();
        let mut agent = StateTd::with_network(network, &LearningConfig::default());

        // top row 4, 8, 16, 32 is worth 10; everything else is untrained
        let rich = State::from_tiles([[4, 8, 16, 32], [0; 4], [0; 4], [0; 4]]).unwrap();
        agent.value_mut().train(rich, 10.0);

        // the top-left corner is the only empty cell
        let after = State::from_tiles([[0, 8, 16, 32], [2, 4, 8, 16], [4, 8, 16, 32], [8, 16, 32, 64]]).unwrap();
        assert!((agent.expected_value(after) - 0.1 * 10.0).abs() < 1e-12);
        assert_eq!(agent.expected_value(State::from_raw(0x1212_2121_1212_2121)), 0.0);
    }

    #[test]
    fn learn_trains_pre_move_state() {
        let mut agent = StateTd::new(&LearningConfig { alpha: 0.5, ..LearningConfig::default() });
        let state = State::from_tiles([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        let (afterstate, reward) = state.shift(Action::Left);
        let next_state = State::from_tiles([[4, 0, 0, 2], [0; 4], [0; 4], [0; 4]]).unwrap();
        let next_actions = next_state.legal_actions();
        agent.learn(&Transition { state, action: Action::Left, reward, afterstate, next_state, next_actions: &next_actions, score: 4 });
        assert!((agent.value().evaluate(state) - 0.5 * 4.0 * 17.0).abs() < 1e-9);
    }

    #[test]
    fn plays_a_full_game() {
        let mut agent = StateTd::new(&LearningConfig::default());
        let mut game = Game::seeded(13);
        let outcome = play_episode(&mut agent, &mut game);
        assert!(game.is_over());
        assert!(outcome.score > 0);
        assert!(agent.value().entries() > 0);
    }
}
