//! Game controller: one grid, a cumulative score and the RNG that drives
//! tile insertion.
//!
//! The episode ends when [`Game::actions`] is empty. Reaching [`WIN_TILE`]
//! is reported by [`Game::has_won`] but does not end the game.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::{Action, State};

/// Tile value that counts as a win.
pub const WIN_TILE: u32 = 2048;

/// What happened when an action was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Grid after the slide, before the random insertion.
    pub afterstate: State,
    /// Merge reward of the slide.
    pub reward: u32,
    /// False when the action was illegal and nothing happened.
    pub moved: bool,
}

#[derive(Debug, Clone)]
pub struct Game<R = StdRng> {
    state: State,
    score: u64,
    rng: R,
}

impl Game<StdRng> {
    /// Fresh game driven by a `StdRng` seeded with `seed`.
    ///
    /// ```
    /// use ntuple_2048::game::Game;
    /// let a = Game::seeded(5);
    /// let b = Game::seeded(5);
    /// assert_eq!(a.state(), b.state());
    /// assert_eq!(a.state().count_empty(), 14);
    /// ```
    pub fn seeded(seed: u64) -> Self { Self::new(StdRng::seed_from_u64(seed)) }
}

impl<R: Rng> Game<R> {
    /// Empty grid seeded with two random tiles, score 0.
    pub fn new(mut rng: R) -> Self {
        let state = State::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        Self { state, score: 0, rng }
    }

    /// Start from a given position with score 0.
    pub fn from_state(state: State, rng: R) -> Self { Self { state, score: 0, rng } }

    #[inline]
    pub fn score(&self) -> u64 { self.score }

    #[inline]
    pub fn max_tile(&self) -> u32 { self.state.max_tile() }

    #[inline]
    pub fn state(&self) -> State { self.state }

    /// Legal actions, in the fixed order UP, DOWN, LEFT, RIGHT.
    #[inline]
    pub fn actions(&self) -> Vec<Action> { self.state.legal_actions() }

    /// No legal action remains.
    pub fn is_over(&self) -> bool { Action::ALL.into_iter().all(|a| !self.state.is_legal(a)) }

    pub fn has_won(&self) -> bool { self.max_tile() >= WIN_TILE }

    /// Apply `action` and return its reward. See [`Game::take_action_with_afterstate`].
    #[inline]
    pub fn take_action(&mut self, action: Action) -> u32 { self.take_action_with_afterstate(action).reward }

    /// Slide, add the reward to the score, then insert a random tile.
    ///
    /// An illegal action is a no-op: reward 0, no insertion, score unchanged.
    pub fn take_action_with_afterstate(&mut self, action: Action) -> Step {
        let (afterstate, reward) = self.state.shift(action);
        if afterstate == self.state {
            return Step { afterstate, reward: 0, moved: false };
        }
        self.score += reward as u64;
        self.state = afterstate.with_random_tile(&mut self.rng);
        Step { afterstate, reward, moved: true }
    }

    /// Afterstate and reward of `action` without touching the game.
    #[inline]
    pub fn pretend_take_action(&self, action: Action) -> (State, u32) { self.state.shift(action) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_twos() -> State { State::from_tiles([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap() }

    #[test]
    fn left_merge_scenario() {
        let game = Game::from_state(two_twos(), StdRng::seed_from_u64(0));
        assert_eq!(game.actions(), vec![Action::Down, Action::Left, Action::Right]);

        let (after, reward) = game.pretend_take_action(Action::Left);
        assert_eq!(reward, 4);
        assert_eq!(after.tiles(), [[4, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let post = Game::from_state(after, StdRng::seed_from_u64(0));
        assert_eq!(post.actions(), vec![Action::Down, Action::Right]);
    }

    #[test]
    fn take_action_scores_and_inserts() {
        let mut game = Game::from_state(two_twos(), StdRng::seed_from_u64(1));
        let step = game.take_action_with_afterstate(Action::Left);
        assert!(step.moved);
        assert_eq!(step.reward, 4);
        assert_eq!(step.afterstate.tiles()[0], [4, 0, 0, 0]);
        assert_eq!(game.score(), 4);
        assert_eq!(game.state().count_empty(), 14);
        assert_eq!(game.state().tile(0, 0), 4);
    }

    #[test]
    fn illegal_action_is_a_no_op() {
        let corner = State::from_tiles([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        let mut game = Game::from_state(corner, StdRng::seed_from_u64(2));
        let step = game.take_action_with_afterstate(Action::Left);
        assert!(!step.moved);
        assert_eq!(step.reward, 0);
        assert_eq!(game.state(), corner);
        assert_eq!(game.score(), 0);
        assert_eq!(game.take_action(Action::Up), 0);
        assert_eq!(game.state(), corner);
    }

    #[test]
    fn pretend_does_not_mutate() {
        let game = Game::seeded(3);
        let before = game.state();
        for a in Action::ALL {
            let _ = game.pretend_take_action(a);
        }
        assert_eq!(game.state(), before);
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn full_board_without_merges_is_over() {
        let stuck = State::from_tiles([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]).unwrap();
        let game = Game::from_state(stuck, StdRng::seed_from_u64(4));
        assert!(game.is_over());
        assert!(game.actions().is_empty());
        assert!(!game.has_won());
    }

    #[test]
    fn reaching_win_tile_does_not_end_the_game() {
        let s = State::from_tiles([[1024, 1024, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        let mut game = Game::from_state(s, StdRng::seed_from_u64(5));
        assert_eq!(game.take_action(Action::Left), 2048);
        assert!(game.has_won());
        assert!(!game.is_over());
    }

    #[test]
    fn seeded_games_replay_identically() {
        let play = |seed| {
            let mut game = Game::seeded(seed);
            while let Some(&a) = game.actions().first() {
                game.take_action(a);
            }
            (game.score(), game.state())
        };
        assert_eq!(play(11), play(11));
    }

    #[test]
    fn score_is_sum_of_rewards() {
        let mut game = Game::seeded(12);
        let mut total = 0u64;
        while let Some(&a) = game.actions().last() {
            let before = game.score();
            total += game.take_action(a) as u64;
            assert!(game.score() >= before);
        }
        assert_eq!(game.score(), total);
        assert!(game.is_over());
    }
}
