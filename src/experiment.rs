//! Training runs: many games with one agent, and many runs side by side.

use std::path::PathBuf;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::game::Game;
use crate::learning::{
    play_episode, Agent, AfterstateTd, EpisodeOutcome, EpsilonGreedy, LearningConfig, QLearning, StateTd,
};
use crate::ntuple::NTupleError;
use crate::results::{ResultsError, ResultsFiles};

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("checkpoint save failed: {0}")]
    Weights(#[from] NTupleError),
    #[error(transparent)]
    Results(#[from] ResultsError),
}

/// Which update rule drives the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Algorithm {
    Afterstate,
    State,
    QLearning,
    EpsilonGreedy,
}

impl Algorithm {
    /// Short tag used in result file names.
    pub fn tag(self) -> &'static str {
        match self {
            Algorithm::Afterstate => "TD_AS",
            Algorithm::State => "TD_S",
            Algorithm::QLearning => "Q_S",
            Algorithm::EpsilonGreedy => "EG_S",
        }
    }
}

/// Periodic weight saves and result appends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub path: PathBuf,
    /// Save after every `interval` games; 0 saves only at the end.
    pub interval: usize,
    /// Games played since the previous checkpoint are appended here as one
    /// line.
    pub results: Option<ResultsFiles>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub algorithm: Algorithm,
    pub games: usize,
    pub learning: LearningConfig,
    /// Exploration rate of [`Algorithm::EpsilonGreedy`].
    pub epsilon: f64,
    /// Seeds every game and the exploration RNG.
    pub seed: u64,
    pub checkpoint: Option<Checkpoint>,
    /// Load the checkpoint file before the first game.
    pub resume: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Afterstate,
            games: 1_000,
            learning: LearningConfig::default(),
            epsilon: 0.1,
            seed: 0,
            checkpoint: None,
            resume: false,
        }
    }
}

/// Per-game results of one run, in play order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentResults {
    pub scores: Vec<u64>,
    pub wins: Vec<bool>,
}

impl ExperimentResults {
    pub fn push(&mut self, outcome: &EpisodeOutcome) {
        self.scores.push(outcome.score);
        self.wins.push(outcome.won());
    }

    pub fn len(&self) -> usize { self.scores.len() }

    pub fn is_empty(&self) -> bool { self.scores.is_empty() }

    pub fn mean_score(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<u64>() as f64 / self.scores.len() as f64
    }

    pub fn win_rate(&self) -> f64 {
        if self.wins.is_empty() {
            return 0.0;
        }
        self.wins.iter().filter(|&&w| w).count() as f64 / self.wins.len() as f64
    }

    pub fn best_score(&self) -> u64 { self.scores.iter().copied().max().unwrap_or(0) }

    /// Games from index `start` on.
    pub fn since(&self, start: usize) -> ExperimentResults {
        let start = start.min(self.len());
        ExperimentResults { scores: self.scores[start..].to_vec(), wins: self.wins[start..].to_vec() }
    }
}

/// Fresh agent for `cfg`.
pub fn build_agent(cfg: &ExperimentConfig) -> Box<dyn Agent + Send> {
    match cfg.algorithm {
        Algorithm::Afterstate => Box::new(AfterstateTd::new(&cfg.learning)),
        Algorithm::State => Box::new(StateTd::new(&cfg.learning)),
        Algorithm::QLearning => Box::new(QLearning::new(&cfg.learning)),
        // own stream so exploration does not shift the tile draws
        Algorithm::EpsilonGreedy => Box::new(EpsilonGreedy::seeded(cfg.epsilon, cfg.seed ^ 0x9e37_79b9_7f4a_7c15)),
    }
}

/// Play `cfg.games` games with one agent, calling `on_game(game, outcome)`
/// after each.
///
/// A checkpoint that cannot be resumed from is logged and training starts
/// from scratch; failing to write one is an error.
pub fn run_experiment<F>(cfg: &ExperimentConfig, mut on_game: F) -> Result<ExperimentResults, ExperimentError>
where
    F: FnMut(usize, &EpisodeOutcome),
{
    let mut agent = build_agent(cfg);
    if let (true, Some(cp)) = (cfg.resume, &cfg.checkpoint) {
        if !agent.learns() {
            info!("{} has no weights to resume", agent.name());
        } else {
            match agent.load(&cp.path) {
                Ok(()) => info!("resumed {} from {}", agent.name(), cp.path.display()),
                Err(e) => warn!("could not resume from {}: {e}; starting untrained", cp.path.display()),
            }
        }
    }

    info!("{}: {} games, alpha {}, seed {}", agent.name(), cfg.games, cfg.learning.alpha, cfg.seed);
    let mut seeds = StdRng::seed_from_u64(cfg.seed);
    let mut results = ExperimentResults::default();
    let mut checkpointed = 0;
    for n in 0..cfg.games {
        let mut game = Game::seeded(seeds.gen());
        let outcome = play_episode(agent.as_mut(), &mut game);
        debug!("game {n}: score {} max tile {} moves {}", outcome.score, outcome.max_tile, outcome.moves);
        results.push(&outcome);
        on_game(n, &outcome);

        if let Some(cp) = &cfg.checkpoint {
            if cp.interval > 0 && results.len() % cp.interval == 0 {
                write_checkpoint(agent.as_ref(), cp, &results, checkpointed)?;
                checkpointed = results.len();
                info!("checkpoint after {} games: mean score {:.1}", results.len(), results.mean_score());
            }
        }
    }

    if let Some(cp) = &cfg.checkpoint {
        if checkpointed < results.len() {
            write_checkpoint(agent.as_ref(), cp, &results, checkpointed)?;
        }
    }
    info!(
        "{} done: mean score {:.1}, best {}, win rate {:.3}",
        agent.name(),
        results.mean_score(),
        results.best_score(),
        results.win_rate()
    );
    Ok(results)
}

fn write_checkpoint(
    agent: &(dyn Agent + Send),
    cp: &Checkpoint,
    results: &ExperimentResults,
    since: usize,
) -> Result<(), ExperimentError> {
    if agent.learns() {
        agent.save(&cp.path)?;
    }
    if let Some(files) = &cp.results {
        files.append(&results.since(since))?;
    }
    Ok(())
}

/// Run independent experiments on the rayon pool, results in input order.
///
/// `on_game` receives the experiment's position in `cfgs`.
pub fn run_parallel<F>(cfgs: &[ExperimentConfig], on_game: F) -> Result<Vec<ExperimentResults>, ExperimentError>
where
    F: Fn(usize, usize, &EpisodeOutcome) + Sync,
{
    cfgs.par_iter()
        .enumerate()
        .map(|(i, cfg)| run_experiment(cfg, |n, outcome| on_game(i, n, outcome)))
        .collect()
}
