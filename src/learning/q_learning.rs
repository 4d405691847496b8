use std::path::{Path, PathBuf};

use crate::engine::{Action, State};
use crate::ntuple::{NTupleConfig, NTupleError, NTupleNetwork};

use super::{greedy, Agent, LearningConfig, RewardShaping, Transition};

/// One-step Q-learning with a separate n-tuple network per action.
///
/// Picks `argmax Q_a(s)` and trains `Q_taken(s)` toward
/// `r + max_{a'} Q_{a'}(s_next)`. Networks start optimistic so untried
/// actions look attractive.
#[derive(Debug, Clone)]
pub struct QLearning {
    q: [NTupleNetwork; 4],
    reward: RewardShaping,
}

impl QLearning {
    pub fn new(cfg: &LearningConfig) -> Self {
        let net = || NTupleNetwork::standard_with(NTupleConfig { alpha: cfg.alpha, ..NTupleConfig::default() }.optimistic());
        Self { q: [net(), net(), net(), net()], reward: cfg.reward }
    }

    /// Network scoring `action`.
    #[inline]
    pub fn q(&self, action: Action) -> &NTupleNetwork { &self.q[action.index()] }

    #[inline]
    pub fn q_mut(&mut self, action: Action) -> &mut NTupleNetwork { &mut self.q[action.index()] }

    pub fn best_action(&self, state: State, actions: &[Action]) -> Option<(Action, f64)> {
        greedy(actions, |a| self.q(a).evaluate(state))
    }
}

/// `agent.csv` -> `agent_up.csv`, one file per action network.
fn action_path(base: &Path, action: Action) -> PathBuf {
    let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let suffix = action.to_string().to_lowercase();
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    base.with_file_name(name)
}

impl Agent for QLearning {
    fn name(&self) -> &'static str { "q-learning" }

    fn select_action(&mut self, state: State, actions: &[Action]) -> Action {
        self.best_action(state, actions).map_or(actions[0], |(a, _)| a)
    }

    fn learn(&mut self, t: &Transition<'_>) {
        let Some((_, next_value)) = self.best_action(t.next_state, t.next_actions) else {
            return;
        };
        let target = self.reward.apply(t.reward) + next_value;
        self.q[t.action.index()].train(t.state, target);
    }

    fn save(&self, path: &Path) -> Result<(), NTupleError> {
        for action in Action::ALL {
            self.q(action).save(action_path(path, action))?;
        }
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), NTupleError> {
        let mut first_err = None;
        for action in Action::ALL {
            if let Err(e) = self.q[action.index()].load(action_path(path, action)) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => {
                // all four start over together
                self.q.iter_mut().for_each(NTupleNetwork::reset);
                Err(e)
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;
    use crate::learning::play_episode;
    use tempfile::tempdir;

    fn corner() -> State { State::from_tiles([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap() }

    #[test]
    fn untrained_agent_picks_first_legal_action() {
        let mut agent = QLearning::new(&LearningConfig::default());
        let s = corner();
        assert_eq!(agent.best_action(s, &s.legal_actions()), Some((Action::Down, 170.0)));
        assert_eq!(agent.select_action(s, &[Action::Right, Action::Down]), Action::Right);
    }

    #[test]
    fn learn_updates_only_the_taken_action() {
        let cfg = LearningConfig { alpha: 0.1, ..LearningConfig::default() };
        let mut agent = QLearning::new(&cfg);
        let state = corner();
        let (afterstate, reward) = state.shift(Action::Right);
        let next_state = State::from_tiles([[0, 0, 0, 2], [0; 4], [0, 2, 0, 0], [0; 4]]).unwrap();
        let next_actions = next_state.legal_actions();
        agent.learn(&Transition { state, action: Action::Right, reward, afterstate, next_state, next_actions: &next_actions, score: 0 });

        // target 0 + 170 equals the optimistic estimate: nothing moves
        assert_eq!(agent.q(Action::Right).evaluate(state), 170.0);
        assert_eq!(agent.q(Action::Right).entries(), 17);
        for a in [Action::Up, Action::Down, Action::Left] {
            assert_eq!(agent.q(a).entries(), 0);
        }
    }

    #[test]
    fn learn_bootstraps_from_best_next_action() {
        let cfg = LearningConfig { alpha: 0.5, ..LearningConfig::default() };
        let mut agent = QLearning::new(&cfg);
        let state = State::from_tiles([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        let (afterstate, reward) = state.shift(Action::Right);
        assert_eq!(reward, 4);
        let next_state = State::from_tiles([[0, 0, 0, 4], [0; 4], [0, 2, 0, 0], [0; 4]]).unwrap();
        let next_actions = next_state.legal_actions();
        assert!(next_actions.contains(&Action::Left));

        // LEFT is neither the taken action nor the first legal one
        agent.q_mut(Action::Left).train(next_state, 500.0);
        let best_next = agent.q(Action::Left).evaluate(next_state);
        assert!(best_next > 170.0);
        assert_eq!(agent.q(Action::Right).evaluate(next_state), 170.0);

        let before = agent.q(Action::Right).evaluate(state);
        agent.learn(&Transition { state, action: Action::Right, reward, afterstate, next_state, next_actions: &next_actions, score: 4 });
        let target = 4.0 + best_next;
        let expected = before + 0.5 * 17.0 * (target - before);
        assert!((agent.q(Action::Right).evaluate(state) - expected).abs() < 1e-6);
    }

    #[test]
    fn terminal_transition_is_ignored() {
        let mut agent = QLearning::new(&LearningConfig::default());
        let s = corner();
        agent.learn(&Transition { state: s, action: Action::Down, reward: 0, afterstate: s, next_state: s, next_actions: &[], score: 0 });
        assert!(Action::ALL.iter().all(|&a| agent.q(a).entries() == 0));
    }

    #[test]
    fn per_action_files_round_trip() {
        let mut agent = QLearning::new(&LearningConfig::default());
        let mut game = Game::seeded(17);
        play_episode(&mut agent, &mut game);

        let dir = tempdir().unwrap();
        let base = dir.path().join("q_agent.csv");
        agent.save(&base).unwrap();
        assert!(dir.path().join("q_agent_left.csv").exists());

        let mut restored = QLearning::new(&LearningConfig::default());
        restored.load(&base).unwrap();
        let s = game.state();
        for a in Action::ALL {
            assert_eq!(restored.q(a).evaluate(s), agent.q(a).evaluate(s));
        }

        std::fs::remove_file(dir.path().join("q_agent_up.csv")).unwrap();
        assert!(restored.load(&base).is_err());
        assert!(Action::ALL.iter().all(|&a| restored.q(a).entries() == 0));
    }

    #[test]
    fn action_paths() {
        assert_eq!(action_path(Path::new("agents/q.csv"), Action::Up), PathBuf::from("agents/q_up.csv"));
        assert_eq!(action_path(Path::new("q"), Action::Right), PathBuf::from("q_right"));
    }
}
