//! Learning drivers for 2048.
//!
//! Every update rule is an [`Agent`]: `select_action` decides how candidate
//! actions are scored, `learn` decides what target the value function is
//! trained toward. One loop, [`play_episode`], drives all of them.
//!
//! - [`AfterstateTd`]: TD(0) on afterstates, scoring `r + V(after(a))`.
//! - [`StateTd`]: TD(0) on full states, scoring `r + E[V(s')]` over every
//!   random insertion.
//! - [`QLearning`]: one network per action, scoring `Q_a(s)`.
//! - [`EpsilonGreedy`]: value-free baseline.
//!
//! Quick start
//! ```
//! use ntuple_2048::game::Game;
//! use ntuple_2048::learning::{play_episode, AfterstateTd, LearningConfig};
//!
//! let mut agent = AfterstateTd::new(&LearningConfig::default());
//! let mut game = Game::seeded(7);
//! let outcome = play_episode(&mut agent, &mut game);
//! assert_eq!(outcome.score, game.score());
//! assert!(game.is_over());
//! ```

use std::path::Path;

use rand::Rng;

use crate::engine::{Action, State};
use crate::game::{Game, WIN_TILE};
use crate::ntuple::NTupleError;

mod afterstate;
mod epsilon_greedy;
mod q_learning;
mod state_value;

pub use afterstate::AfterstateTd;
pub use epsilon_greedy::EpsilonGreedy;
pub use q_learning::QLearning;
pub use state_value::StateTd;

/// How merge rewards are turned into learning signal.
///
/// - `Raw`: the merge reward as is.
/// - `Log2`: `floor(log2(reward))`, 0 for no merge. Compresses late-game
///   rewards so they do not swamp the bootstrapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewardShaping {
    #[default]
    Raw,
    Log2,
}

impl RewardShaping {
    #[inline]
    pub fn apply(self, reward: u32) -> f64 {
        match self {
            RewardShaping::Raw => reward as f64,
            RewardShaping::Log2 if reward == 0 => 0.0,
            RewardShaping::Log2 => reward.ilog2() as f64,
        }
    }
}

/// Target for the final afterstate of a game that ended below a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalPenalty {
    pub score_threshold: u64,
    pub value: f64,
}

impl Default for TerminalPenalty {
    fn default() -> Self { Self { score_threshold: 25_000, value: -50.0 } }
}

/// Knobs shared by the value-based agents.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningConfig {
    /// Step size of every weight update.
    pub alpha: f64,
    pub reward: RewardShaping,
    /// Only used by [`AfterstateTd`].
    pub terminal_penalty: Option<TerminalPenalty>,
}

impl Default for LearningConfig {
    fn default() -> Self { Self { alpha: 0.01, reward: RewardShaping::Raw, terminal_penalty: None } }
}

/// One applied move, as handed to [`Agent::learn`].
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    /// State the action was chosen in.
    pub state: State,
    pub action: Action,
    /// Raw merge reward.
    pub reward: u32,
    pub afterstate: State,
    /// State after the random insertion.
    pub next_state: State,
    /// Legal actions in `next_state`; empty when the game is over.
    pub next_actions: &'a [Action],
    /// Game score after the move.
    pub score: u64,
}

impl Transition<'_> {
    #[inline]
    pub fn is_terminal(&self) -> bool { self.next_actions.is_empty() }
}

/// A policy plus its update rule.
pub trait Agent {
    /// Short name for logs and file names.
    fn name(&self) -> &'static str;

    /// Choose one of `actions` (never empty) in `state`.
    fn select_action(&mut self, state: State, actions: &[Action]) -> Action;

    /// Update from one applied move.
    fn learn(&mut self, _transition: &Transition<'_>) {}

    /// False for agents with nothing to save or load.
    fn learns(&self) -> bool { true }

    /// Persist learned weights under `path`.
    fn save(&self, _path: &Path) -> Result<(), NTupleError> { Ok(()) }

    /// Restore learned weights from `path`.
    fn load(&mut self, _path: &Path) -> Result<(), NTupleError> { Ok(()) }
}

/// Final figures of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeOutcome {
    pub score: u64,
    pub max_tile: u32,
    pub moves: u64,
}

impl EpisodeOutcome {
    #[inline]
    pub fn won(&self) -> bool { self.max_tile >= WIN_TILE }
}

/// Play `game` to the end with `agent`, calling `learn` after every move.
pub fn play_episode<A: Agent + ?Sized, R: Rng>(agent: &mut A, game: &mut Game<R>) -> EpisodeOutcome {
    let mut actions = game.actions();
    let mut moves = 0;
    while !actions.is_empty() {
        let state = game.state();
        let action = agent.select_action(state, &actions);
        let step = game.take_action_with_afterstate(action);
        if step.moved {
            moves += 1;
        }
        let next_actions = game.actions();
        agent.learn(&Transition {
            state,
            action,
            reward: step.reward,
            afterstate: step.afterstate,
            next_state: game.state(),
            next_actions: &next_actions,
            score: game.score(),
        });
        actions = next_actions;
    }
    EpisodeOutcome { score: game.score(), max_tile: game.max_tile(), moves }
}

/// First action with the highest value, and that value.
///
/// Ties go to the earliest action in `actions`.
pub fn greedy<F: FnMut(Action) -> f64>(actions: &[Action], mut value: F) -> Option<(Action, f64)> {
    let mut best: Option<(Action, f64)> = None;
    for &action in actions {
        let v = value(action);
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((action, v));
        }
    }
    best
}
